#![allow(dead_code)]

use roadtrip_core::db::open_db_in_memory;
use roadtrip_core::model::geo_area::GeoArea;
use roadtrip_core::model::location::Location;
use roadtrip_core::model::person::Person;
use roadtrip_core::model::settings::SettingKey;
use roadtrip_core::model::trip::Trip;
use roadtrip_core::model::tstop::TStop;
use roadtrip_core::model::vehicle::{Vehicle, VehicleMake};
use roadtrip_core::model::RecordId;
use roadtrip_core::repo::location_repo::{LocationRepository, SqliteLocationRepository};
use roadtrip_core::repo::master_repo::{MasterDataRepository, SqliteMasterDataRepository};
use roadtrip_core::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use roadtrip_core::repo::trip_repo::{SqliteTripRepository, TripRepository};
use rusqlite::Connection;

pub const T0: i64 = 1_700_000_000;

/// One area, one driver, one make and one vehicle.
pub struct Fixture {
    pub conn: Connection,
    pub area: RecordId,
    pub driver: RecordId,
    pub make: RecordId,
    pub vehicle: RecordId,
}

pub fn seeded() -> Fixture {
    let conn = open_db_in_memory().unwrap();
    let area = add_area(&conn, "Home");
    let driver = add_driver(&conn, "Alex");
    let make = add_make(&conn, "Subaru");
    let vehicle = add_vehicle(&conn, "Wagon", driver, make, 1_000);
    Fixture {
        conn,
        area,
        driver,
        make,
        vehicle,
    }
}

pub fn add_area(conn: &Connection, name: &str) -> RecordId {
    master(conn).insert_geo_area(&GeoArea::new(name)).unwrap()
}

pub fn add_driver(conn: &Connection, name: &str) -> RecordId {
    master(conn).insert_person(&Person::driver(name)).unwrap()
}

pub fn add_passenger(conn: &Connection, name: &str) -> RecordId {
    master(conn).insert_person(&Person::passenger(name)).unwrap()
}

pub fn add_make(conn: &Connection, name: &str) -> RecordId {
    master(conn)
        .insert_vehicle_make(&VehicleMake::new(name))
        .unwrap()
}

pub fn add_vehicle(
    conn: &Connection,
    nickname: &str,
    driver: RecordId,
    make: RecordId,
    odo: i64,
) -> RecordId {
    master(conn)
        .insert_vehicle(&Vehicle::new(nickname, driver, make, odo))
        .unwrap()
}

pub fn add_location(conn: &Connection, area: RecordId, description: &str) -> RecordId {
    SqliteLocationRepository::try_new(conn)
        .unwrap()
        .insert_location(&Location::new(area, description))
        .unwrap()
}

/// Inserts an in-progress trip directly, bypassing the trip service.
pub fn add_trip(
    conn: &Connection,
    vehicle: RecordId,
    driver: RecordId,
    area: RecordId,
    time_start: i64,
) -> RecordId {
    SqliteTripRepository::try_new(conn)
        .unwrap()
        .insert_trip(&Trip::new(vehicle, driver, area, 1_000, time_start))
        .unwrap()
}

pub fn finish_trip(conn: &Connection, trip_id: RecordId, time_end: i64) {
    let trips = SqliteTripRepository::try_new(conn).unwrap();
    let mut trip = trips.get_trip(trip_id).unwrap().unwrap();
    trip.time_end = Some(time_end);
    trip.odo_end = Some(trip.odo_start + 10);
    trips.update_trip(&trip).unwrap();
}

pub fn add_tstop(conn: &Connection, trip_id: RecordId, time_stop: i64) -> RecordId {
    SqliteTripRepository::try_new(conn)
        .unwrap()
        .insert_tstop(&TStop::new(trip_id, time_stop))
        .unwrap()
}

pub fn set_setting(conn: &Connection, key: SettingKey, value: Option<RecordId>) {
    SqliteSettingsRepository::try_new(conn)
        .unwrap()
        .set_setting(key, value)
        .unwrap();
}

pub fn setting(conn: &Connection, key: SettingKey) -> Option<RecordId> {
    SqliteSettingsRepository::try_new(conn)
        .unwrap()
        .get_setting(key)
        .unwrap()
}

fn master(conn: &Connection) -> SqliteMasterDataRepository<'_> {
    SqliteMasterDataRepository::try_new(conn).unwrap()
}
