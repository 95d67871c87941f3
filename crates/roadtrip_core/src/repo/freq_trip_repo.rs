//! Frequent trip repository contracts and SQLite implementation.

use crate::model::freq_trip::{FreqTrip, FreqTripTStop};
use crate::model::RecordId;
use crate::repo::{
    ensure_connection_ready, require_optional_reference, require_reference, RepoResult,
};
use rusqlite::{params, Connection, Row};

const FREQ_TRIP_SELECT_SQL: &str = "SELECT
    _id,
    a_id,
    start_locid,
    end_locid,
    end_via_id,
    roadtrip_end_aid,
    catid,
    end_odo_trip,
    descr,
    typ_timeofday
FROM freqtrip";

pub trait FreqTripRepository {
    fn insert_freq_trip(&self, freq_trip: &FreqTrip) -> RepoResult<RecordId>;
    fn get_freq_trip(&self, id: RecordId) -> RepoResult<Option<FreqTrip>>;
    /// Frequent trips starting in one geoarea, by description.
    fn list_freq_trips(&self, area_id: RecordId) -> RepoResult<Vec<FreqTrip>>;
    fn insert_freq_trip_tstop(&self, tstop: &FreqTripTStop) -> RepoResult<RecordId>;
    /// Intermediate stops of one frequent trip, by trip odometer.
    fn list_freq_trip_tstops(&self, freq_trip_id: RecordId) -> RepoResult<Vec<FreqTripTStop>>;
}

pub struct SqliteFreqTripRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFreqTripRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl FreqTripRepository for SqliteFreqTripRepository<'_> {
    fn insert_freq_trip(&self, freq_trip: &FreqTrip) -> RepoResult<RecordId> {
        freq_trip.validate()?;
        require_reference(self.conn, "geoarea", "freqtrip.a_id", freq_trip.area_id)?;
        require_reference(
            self.conn,
            "location",
            "freqtrip.start_locid",
            freq_trip.start_location_id,
        )?;
        require_reference(
            self.conn,
            "location",
            "freqtrip.end_locid",
            freq_trip.end_location_id,
        )?;
        require_optional_reference(
            self.conn,
            "via_route",
            "freqtrip.end_via_id",
            freq_trip.end_via_id,
        )?;
        require_optional_reference(
            self.conn,
            "geoarea",
            "freqtrip.roadtrip_end_aid",
            freq_trip.roadtrip_end_area_id,
        )?;
        require_optional_reference(
            self.conn,
            "tripcategory",
            "freqtrip.catid",
            freq_trip.category_id,
        )?;

        self.conn.execute(
            "INSERT INTO freqtrip (
                a_id,
                start_locid,
                end_locid,
                end_via_id,
                roadtrip_end_aid,
                catid,
                end_odo_trip,
                descr,
                typ_timeofday
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                freq_trip.area_id,
                freq_trip.start_location_id,
                freq_trip.end_location_id,
                freq_trip.end_via_id,
                freq_trip.roadtrip_end_area_id,
                freq_trip.category_id,
                freq_trip.end_odo_trip,
                freq_trip.description,
                freq_trip.typical_time_of_day,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_freq_trip(&self, id: RecordId) -> RepoResult<Option<FreqTrip>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FREQ_TRIP_SELECT_SQL} WHERE _id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_freq_trip_row(row)?));
        }
        Ok(None)
    }

    fn list_freq_trips(&self, area_id: RecordId) -> RepoResult<Vec<FreqTrip>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FREQ_TRIP_SELECT_SQL} WHERE a_id = ?1 ORDER BY descr ASC, _id ASC;"
        ))?;
        let mut rows = stmt.query([area_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_freq_trip_row(row)?);
        }
        Ok(items)
    }

    fn insert_freq_trip_tstop(&self, tstop: &FreqTripTStop) -> RepoResult<RecordId> {
        tstop.validate()?;
        require_reference(
            self.conn,
            "freqtrip",
            "freqtrip_tstop.freqtripid",
            tstop.freq_trip_id,
        )?;
        require_reference(self.conn, "location", "freqtrip_tstop.locid", tstop.location_id)?;
        require_optional_reference(self.conn, "via_route", "freqtrip_tstop.viaid", tstop.via_id)?;

        self.conn.execute(
            "INSERT INTO freqtrip_tstop (freqtripid, locid, viaid, odo_trip)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                tstop.freq_trip_id,
                tstop.location_id,
                tstop.via_id,
                tstop.odo_trip,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_freq_trip_tstops(&self, freq_trip_id: RecordId) -> RepoResult<Vec<FreqTripTStop>> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, freqtripid, locid, viaid, odo_trip
             FROM freqtrip_tstop
             WHERE freqtripid = ?1
             ORDER BY odo_trip ASC, _id ASC;",
        )?;
        let mut rows = stmt.query([freq_trip_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(FreqTripTStop {
                id: row.get("_id")?,
                freq_trip_id: row.get("freqtripid")?,
                location_id: row.get("locid")?,
                via_id: row.get("viaid")?,
                odo_trip: row.get("odo_trip")?,
            });
        }
        Ok(items)
    }
}

fn parse_freq_trip_row(row: &Row<'_>) -> RepoResult<FreqTrip> {
    Ok(FreqTrip {
        id: row.get("_id")?,
        area_id: row.get("a_id")?,
        start_location_id: row.get("start_locid")?,
        end_location_id: row.get("end_locid")?,
        end_via_id: row.get("end_via_id")?,
        roadtrip_end_area_id: row.get("roadtrip_end_aid")?,
        category_id: row.get("catid")?,
        end_odo_trip: row.get("end_odo_trip")?,
        description: row.get("descr")?,
        typical_time_of_day: row.get("typ_timeofday")?,
    })
}
