//! Location and via-route repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Locations list most recently visited first (`latest_time DESC`, unvisited
//!   last), then by `_id ASC`.

use crate::model::location::{Location, ViaRoute};
use crate::model::RecordId;
use crate::repo::{ensure_connection_ready, require_reference, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const LOCATION_SELECT_SQL: &str =
    "SELECT _id, a_id, loc_descr, latest_time, geo_lat, geo_lon FROM location";

const VIA_ROUTE_SELECT_SQL: &str =
    "SELECT _id, locid_from, locid_to, odo_dist, via_descr FROM via_route";

pub trait LocationRepository {
    fn insert_location(&self, location: &Location) -> RepoResult<RecordId>;
    fn update_location(&self, location: &Location) -> RepoResult<()>;
    fn get_location(&self, id: RecordId) -> RepoResult<Option<Location>>;
    fn list_locations(&self, area_id: RecordId) -> RepoResult<Vec<Location>>;
    /// Records a visit so recently used locations sort first.
    fn touch_location(&self, id: RecordId, visited_at: i64) -> RepoResult<()>;

    fn insert_via_route(&self, route: &ViaRoute) -> RepoResult<RecordId>;
    fn get_via_route(&self, id: RecordId) -> RepoResult<Option<ViaRoute>>;
    fn list_via_routes_from(&self, from_location_id: RecordId) -> RepoResult<Vec<ViaRoute>>;
}

/// SQLite-backed location repository.
pub struct SqliteLocationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LocationRepository for SqliteLocationRepository<'_> {
    fn insert_location(&self, location: &Location) -> RepoResult<RecordId> {
        location.validate()?;
        require_reference(self.conn, "geoarea", "location.a_id", location.area_id)?;
        self.conn.execute(
            "INSERT INTO location (a_id, loc_descr, latest_time, geo_lat, geo_lon)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                location.area_id,
                location.description,
                location.latest_time,
                location.latitude,
                location.longitude,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_location(&self, location: &Location) -> RepoResult<()> {
        location.validate()?;
        require_reference(self.conn, "geoarea", "location.a_id", location.area_id)?;
        let changed = self.conn.execute(
            "UPDATE location
             SET a_id = ?1, loc_descr = ?2, latest_time = ?3, geo_lat = ?4, geo_lon = ?5
             WHERE _id = ?6;",
            params![
                location.area_id,
                location.description,
                location.latest_time,
                location.latitude,
                location.longitude,
                location.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "location",
                id: location.id,
            });
        }
        Ok(())
    }

    fn get_location(&self, id: RecordId) -> RepoResult<Option<Location>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LOCATION_SELECT_SQL} WHERE _id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_location_row(row)?));
        }
        Ok(None)
    }

    fn list_locations(&self, area_id: RecordId) -> RepoResult<Vec<Location>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LOCATION_SELECT_SQL}
             WHERE a_id = ?1
             ORDER BY latest_time IS NULL ASC, latest_time DESC, _id ASC;"
        ))?;
        let mut rows = stmt.query([area_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_location_row(row)?);
        }
        Ok(items)
    }

    fn touch_location(&self, id: RecordId, visited_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE location
             SET latest_time = MAX(COALESCE(latest_time, 0), ?1)
             WHERE _id = ?2;",
            params![visited_at, id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "location",
                id,
            });
        }
        Ok(())
    }

    fn insert_via_route(&self, route: &ViaRoute) -> RepoResult<RecordId> {
        route.validate()?;
        require_reference(
            self.conn,
            "location",
            "via_route.locid_from",
            route.from_location_id,
        )?;
        require_reference(self.conn, "location", "via_route.locid_to", route.to_location_id)?;
        self.conn.execute(
            "INSERT INTO via_route (locid_from, locid_to, odo_dist, via_descr)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                route.from_location_id,
                route.to_location_id,
                route.distance,
                route.description,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_via_route(&self, id: RecordId) -> RepoResult<Option<ViaRoute>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{VIA_ROUTE_SELECT_SQL} WHERE _id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_via_route_row(row)?));
        }
        Ok(None)
    }

    fn list_via_routes_from(&self, from_location_id: RecordId) -> RepoResult<Vec<ViaRoute>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VIA_ROUTE_SELECT_SQL} WHERE locid_from = ?1 ORDER BY via_descr ASC, _id ASC;"
        ))?;
        let mut rows = stmt.query([from_location_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_via_route_row(row)?);
        }
        Ok(items)
    }
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<Location> {
    Ok(Location {
        id: row.get("_id")?,
        area_id: row.get("a_id")?,
        description: row.get("loc_descr")?,
        latest_time: row.get("latest_time")?,
        latitude: row.get("geo_lat")?,
        longitude: row.get("geo_lon")?,
    })
}

fn parse_via_route_row(row: &Row<'_>) -> RepoResult<ViaRoute> {
    Ok(ViaRoute {
        id: row.get("_id")?,
        from_location_id: row.get("locid_from")?,
        to_location_id: row.get("locid_to")?,
        distance: row.get("odo_dist")?,
        description: row.get("via_descr")?,
    })
}
