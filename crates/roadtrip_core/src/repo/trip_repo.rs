//! Trip, stop, and gas purchase repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist trips and their stops, keeping references closed on write.
//! - Answer the "current state" lookups used by settings recovery: in-progress
//!   trips, open stops, most recent trip.
//!
//! # Invariants
//! - "Most recent" ordering is `time_start DESC, _id DESC` for trips and
//!   `time_stop DESC, _id DESC` for stops.
//! - A gas row can only be written for an existing stop, and its vehicle must
//!   be the stop's trip vehicle.

use crate::model::trip::{Trip, TripLink};
use crate::model::tstop::{TStop, TStopGas, FLAG_TRIP_END};
use crate::model::RecordId;
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, require_optional_reference,
    require_reference, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const TRIP_SELECT_SQL: &str = "SELECT
    _id,
    vid,
    did,
    catid,
    aid,
    roadtrip_end_aid,
    freqtripid,
    odo_start,
    odo_end,
    time_start,
    time_end,
    passengers,
    comment
FROM trip";

const TRIP_LINK_SELECT_SQL: &str = "SELECT
    _id,
    vid,
    did,
    aid,
    roadtrip_end_aid,
    time_end IS NULL AS in_progress
FROM trip";

const TSTOP_SELECT_SQL: &str = "SELECT
    _id,
    tripid,
    locid,
    via_id,
    a_id,
    odo_total,
    odo_trip,
    time_stop,
    time_cont,
    flag_sides,
    descr,
    comment
FROM tstop";

/// Repository interface for trips and stops.
pub trait TripRepository {
    fn insert_trip(&self, trip: &Trip) -> RepoResult<RecordId>;
    fn update_trip(&self, trip: &Trip) -> RepoResult<()>;
    fn get_trip(&self, id: RecordId) -> RepoResult<Option<Trip>>;
    /// All trips of one vehicle, most recent first.
    fn list_trips_for_vehicle(&self, vehicle_id: RecordId) -> RepoResult<Vec<Trip>>;
    /// Trips of one vehicle with no `time_end`, most recent first.
    fn in_progress_trips(&self, vehicle_id: RecordId) -> RepoResult<Vec<Trip>>;
    /// Most recently started trip, optionally restricted to one vehicle.
    fn latest_trip(&self, vehicle_id: Option<RecordId>) -> RepoResult<Option<Trip>>;

    fn get_trip_link(&self, id: RecordId) -> RepoResult<Option<TripLink>>;
    /// Same order as `in_progress_trips`.
    fn in_progress_trip_links(&self, vehicle_id: RecordId) -> RepoResult<Vec<TripLink>>;
    /// Same order as `latest_trip`.
    fn latest_trip_link(&self, vehicle_id: Option<RecordId>) -> RepoResult<Option<TripLink>>;

    fn insert_tstop(&self, tstop: &TStop) -> RepoResult<RecordId>;
    fn update_tstop(&self, tstop: &TStop) -> RepoResult<()>;
    fn get_tstop(&self, id: RecordId) -> RepoResult<Option<TStop>>;
    /// Stops of one trip in driving order.
    fn list_tstops(&self, trip_id: RecordId) -> RepoResult<Vec<TStop>>;
    /// Stops of one trip with no `time_cont`, most recent first.
    fn open_tstops(&self, trip_id: RecordId) -> RepoResult<Vec<TStop>>;

    fn insert_gas(&self, gas: &TStopGas) -> RepoResult<()>;
    fn get_gas(&self, tstop_id: RecordId) -> RepoResult<Option<TStopGas>>;
}

/// SQLite-backed trip repository.
pub struct SqliteTripRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTripRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn require_trip_references(&self, trip: &Trip) -> RepoResult<()> {
        require_reference(self.conn, "vehicle", "trip.vid", trip.vehicle_id)?;
        let is_driver: Option<i64> = self
            .conn
            .query_row(
                "SELECT is_driver FROM person WHERE _id = ?1;",
                [trip.driver_id],
                |row| row.get(0),
            )
            .optional()?;
        if is_driver != Some(1) {
            return Err(RepoError::MissingReference {
                table: "person",
                column: "trip.did",
                id: trip.driver_id,
            });
        }
        require_reference(self.conn, "geoarea", "trip.aid", trip.area_id)?;
        require_optional_reference(self.conn, "tripcategory", "trip.catid", trip.category_id)?;
        require_optional_reference(
            self.conn,
            "geoarea",
            "trip.roadtrip_end_aid",
            trip.roadtrip_end_area_id,
        )?;
        require_optional_reference(self.conn, "freqtrip", "trip.freqtripid", trip.freq_trip_id)
    }

    fn require_tstop_references(&self, tstop: &TStop) -> RepoResult<()> {
        require_reference(self.conn, "trip", "tstop.tripid", tstop.trip_id)?;
        require_optional_reference(self.conn, "location", "tstop.locid", tstop.location_id)?;
        require_optional_reference(self.conn, "via_route", "tstop.via_id", tstop.via_id)?;
        require_optional_reference(self.conn, "geoarea", "tstop.a_id", tstop.area_id)
    }

    fn query_trips(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Trip>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut trips = Vec::new();
        while let Some(row) = rows.next()? {
            trips.push(parse_trip_row(row)?);
        }
        Ok(trips)
    }

    fn query_trip_links(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<TripLink>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(TripLink {
                id: row.get("_id")?,
                vehicle_id: row.get("vid")?,
                driver_id: row.get("did")?,
                area_id: row.get("aid")?,
                roadtrip_end_area_id: row.get("roadtrip_end_aid")?,
                in_progress: row.get("in_progress")?,
            })
        })?;
        let mut links = Vec::new();
        for link in rows {
            links.push(link?);
        }
        Ok(links)
    }

    fn query_tstops(&self, sql: &str, trip_id: RecordId) -> RepoResult<Vec<TStop>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([trip_id])?;
        let mut stops = Vec::new();
        while let Some(row) = rows.next()? {
            stops.push(parse_tstop_row(row)?);
        }
        Ok(stops)
    }
}

impl TripRepository for SqliteTripRepository<'_> {
    fn insert_trip(&self, trip: &Trip) -> RepoResult<RecordId> {
        trip.validate()?;
        self.require_trip_references(trip)?;

        self.conn.execute(
            "INSERT INTO trip (
                vid,
                did,
                catid,
                aid,
                roadtrip_end_aid,
                freqtripid,
                odo_start,
                odo_end,
                time_start,
                time_end,
                passengers,
                comment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                trip.vehicle_id,
                trip.driver_id,
                trip.category_id,
                trip.area_id,
                trip.roadtrip_end_area_id,
                trip.freq_trip_id,
                trip.odo_start,
                trip.odo_end,
                trip.time_start,
                trip.time_end,
                trip.passengers,
                trip.comment.as_deref(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_trip(&self, trip: &Trip) -> RepoResult<()> {
        trip.validate()?;
        self.require_trip_references(trip)?;

        let changed = self.conn.execute(
            "UPDATE trip
             SET
                vid = ?1,
                did = ?2,
                catid = ?3,
                aid = ?4,
                roadtrip_end_aid = ?5,
                freqtripid = ?6,
                odo_start = ?7,
                odo_end = ?8,
                time_start = ?9,
                time_end = ?10,
                passengers = ?11,
                comment = ?12
             WHERE _id = ?13;",
            params![
                trip.vehicle_id,
                trip.driver_id,
                trip.category_id,
                trip.area_id,
                trip.roadtrip_end_area_id,
                trip.freq_trip_id,
                trip.odo_start,
                trip.odo_end,
                trip.time_start,
                trip.time_end,
                trip.passengers,
                trip.comment.as_deref(),
                trip.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "trip",
                id: trip.id,
            });
        }
        Ok(())
    }

    fn get_trip(&self, id: RecordId) -> RepoResult<Option<Trip>> {
        Ok(self
            .query_trips(&format!("{TRIP_SELECT_SQL} WHERE _id = ?1;"), [id])?
            .into_iter()
            .next())
    }

    fn list_trips_for_vehicle(&self, vehicle_id: RecordId) -> RepoResult<Vec<Trip>> {
        self.query_trips(
            &format!("{TRIP_SELECT_SQL} WHERE vid = ?1 ORDER BY time_start DESC, _id DESC;"),
            [vehicle_id],
        )
    }

    fn in_progress_trips(&self, vehicle_id: RecordId) -> RepoResult<Vec<Trip>> {
        self.query_trips(
            &format!(
                "{TRIP_SELECT_SQL}
                 WHERE vid = ?1 AND time_end IS NULL
                 ORDER BY time_start DESC, _id DESC;"
            ),
            [vehicle_id],
        )
    }

    fn latest_trip(&self, vehicle_id: Option<RecordId>) -> RepoResult<Option<Trip>> {
        let trips = match vehicle_id {
            Some(vehicle_id) => self.query_trips(
                &format!(
                    "{TRIP_SELECT_SQL} WHERE vid = ?1 ORDER BY time_start DESC, _id DESC LIMIT 1;"
                ),
                [vehicle_id],
            )?,
            None => self.query_trips(
                &format!("{TRIP_SELECT_SQL} ORDER BY time_start DESC, _id DESC LIMIT 1;"),
                [],
            )?,
        };
        Ok(trips.into_iter().next())
    }

    fn get_trip_link(&self, id: RecordId) -> RepoResult<Option<TripLink>> {
        Ok(self
            .query_trip_links(&format!("{TRIP_LINK_SELECT_SQL} WHERE _id = ?1;"), [id])?
            .into_iter()
            .next())
    }

    fn in_progress_trip_links(&self, vehicle_id: RecordId) -> RepoResult<Vec<TripLink>> {
        self.query_trip_links(
            &format!(
                "{TRIP_LINK_SELECT_SQL}
                 WHERE vid = ?1 AND time_end IS NULL
                 ORDER BY time_start DESC, _id DESC;"
            ),
            [vehicle_id],
        )
    }

    fn latest_trip_link(&self, vehicle_id: Option<RecordId>) -> RepoResult<Option<TripLink>> {
        let links = match vehicle_id {
            Some(vehicle_id) => self.query_trip_links(
                &format!(
                    "{TRIP_LINK_SELECT_SQL} WHERE vid = ?1 ORDER BY time_start DESC, _id DESC LIMIT 1;"
                ),
                [vehicle_id],
            )?,
            None => self.query_trip_links(
                &format!("{TRIP_LINK_SELECT_SQL} ORDER BY time_start DESC, _id DESC LIMIT 1;"),
                [],
            )?,
        };
        Ok(links.into_iter().next())
    }

    fn insert_tstop(&self, tstop: &TStop) -> RepoResult<RecordId> {
        tstop.validate()?;
        self.require_tstop_references(tstop)?;

        self.conn.execute(
            "INSERT INTO tstop (
                tripid,
                locid,
                via_id,
                a_id,
                odo_total,
                odo_trip,
                time_stop,
                time_cont,
                flag_sides,
                descr,
                comment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                tstop.trip_id,
                tstop.location_id,
                tstop.via_id,
                tstop.area_id,
                tstop.odo_total,
                tstop.odo_trip,
                tstop.time_stop,
                tstop.time_cont,
                tstop.flag_sides,
                tstop.description.as_deref(),
                tstop.comment.as_deref(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_tstop(&self, tstop: &TStop) -> RepoResult<()> {
        tstop.validate()?;
        self.require_tstop_references(tstop)?;

        let changed = self.conn.execute(
            "UPDATE tstop
             SET
                tripid = ?1,
                locid = ?2,
                via_id = ?3,
                a_id = ?4,
                odo_total = ?5,
                odo_trip = ?6,
                time_stop = ?7,
                time_cont = ?8,
                flag_sides = ?9,
                descr = ?10,
                comment = ?11
             WHERE _id = ?12;",
            params![
                tstop.trip_id,
                tstop.location_id,
                tstop.via_id,
                tstop.area_id,
                tstop.odo_total,
                tstop.odo_trip,
                tstop.time_stop,
                tstop.time_cont,
                tstop.flag_sides,
                tstop.description.as_deref(),
                tstop.comment.as_deref(),
                tstop.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "tstop",
                id: tstop.id,
            });
        }
        Ok(())
    }

    fn get_tstop(&self, id: RecordId) -> RepoResult<Option<TStop>> {
        Ok(self
            .query_tstops(&format!("{TSTOP_SELECT_SQL} WHERE _id = ?1;"), id)?
            .into_iter()
            .next())
    }

    fn list_tstops(&self, trip_id: RecordId) -> RepoResult<Vec<TStop>> {
        self.query_tstops(
            &format!("{TSTOP_SELECT_SQL} WHERE tripid = ?1 ORDER BY time_stop ASC, _id ASC;"),
            trip_id,
        )
    }

    fn open_tstops(&self, trip_id: RecordId) -> RepoResult<Vec<TStop>> {
        self.query_tstops(
            &format!(
                "{TSTOP_SELECT_SQL}
                 WHERE tripid = ?1 AND time_cont IS NULL AND (flag_sides & {FLAG_TRIP_END}) = 0
                 ORDER BY time_stop DESC, _id DESC;"
            ),
            trip_id,
        )
    }

    fn insert_gas(&self, gas: &TStopGas) -> RepoResult<()> {
        gas.validate()?;
        let trip_vehicle: Option<RecordId> = self
            .conn
            .query_row(
                "SELECT t.vid
                 FROM tstop s
                 INNER JOIN trip t ON t._id = s.tripid
                 WHERE s._id = ?1;",
                [gas.tstop_id],
                |row| row.get(0),
            )
            .optional()?;
        match trip_vehicle {
            None => {
                return Err(RepoError::MissingReference {
                    table: "tstop",
                    column: "tstop_gas._id",
                    id: gas.tstop_id,
                });
            }
            Some(vehicle_id) if vehicle_id != gas.vehicle_id => {
                return Err(RepoError::InvalidData(format!(
                    "tstop_gas.vid {} does not match trip vehicle {vehicle_id}",
                    gas.vehicle_id
                )));
            }
            Some(_) => {}
        }
        require_optional_reference(
            self.conn,
            "gas_brandgrade",
            "tstop_gas.gas_brandgrade_id",
            gas.brand_grade_id,
        )?;

        self.conn.execute(
            "INSERT INTO tstop_gas (
                _id,
                vid,
                gas_brandgrade_id,
                quant,
                price_per,
                price_total,
                fillup
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                gas.tstop_id,
                gas.vehicle_id,
                gas.brand_grade_id,
                gas.quantity,
                gas.price_per,
                gas.price_total,
                bool_to_int(gas.fillup),
            ],
        )?;
        Ok(())
    }

    fn get_gas(&self, tstop_id: RecordId) -> RepoResult<Option<TStopGas>> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, vid, gas_brandgrade_id, quant, price_per, price_total, fillup
             FROM tstop_gas
             WHERE _id = ?1;",
        )?;
        let mut rows = stmt.query([tstop_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(TStopGas {
                tstop_id: row.get("_id")?,
                vehicle_id: row.get("vid")?,
                brand_grade_id: row.get("gas_brandgrade_id")?,
                quantity: row.get("quant")?,
                price_per: row.get("price_per")?,
                price_total: row.get("price_total")?,
                fillup: int_to_bool(row.get("fillup")?, "tstop_gas.fillup")?,
            }));
        }
        Ok(None)
    }
}

fn parse_trip_row(row: &Row<'_>) -> RepoResult<Trip> {
    let trip = Trip {
        id: row.get("_id")?,
        vehicle_id: row.get("vid")?,
        driver_id: row.get("did")?,
        category_id: row.get("catid")?,
        area_id: row.get("aid")?,
        roadtrip_end_area_id: row.get("roadtrip_end_aid")?,
        freq_trip_id: row.get("freqtripid")?,
        odo_start: row.get("odo_start")?,
        odo_end: row.get("odo_end")?,
        time_start: row.get("time_start")?,
        time_end: row.get("time_end")?,
        passengers: row.get("passengers")?,
        comment: row.get("comment")?,
    };
    trip.validate()
        .map_err(|err| RepoError::InvalidData(format!("trip {}: {err}", trip.id)))?;
    Ok(trip)
}

fn parse_tstop_row(row: &Row<'_>) -> RepoResult<TStop> {
    Ok(TStop {
        id: row.get("_id")?,
        trip_id: row.get("tripid")?,
        location_id: row.get("locid")?,
        via_id: row.get("via_id")?,
        area_id: row.get("a_id")?,
        odo_total: row.get("odo_total")?,
        odo_trip: row.get("odo_trip")?,
        time_stop: row.get("time_stop")?,
        time_cont: row.get("time_cont")?,
        flag_sides: row.get("flag_sides")?,
        description: row.get("descr")?,
        comment: row.get("comment")?,
    })
}
