mod common;

use common::{
    add_area, add_driver, add_passenger, add_trip, add_tstop, add_vehicle, finish_trip, seeded,
    set_setting, setting, T0,
};
use roadtrip_core::db::open_db_in_memory;
use roadtrip_core::model::settings::{SettingKey, VehSettings};
use roadtrip_core::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use roadtrip_core::model::vehicle::Vehicle;
use roadtrip_core::repo::master_repo::{MasterDataRepository, SqliteMasterDataRepository};
use roadtrip_core::service::settings_service::{
    Recovery, RecoveredSetting, SettingsLevel, SettingsService,
};

#[test]
fn empty_logbook_is_missing_geoarea() {
    let conn = open_db_in_memory().unwrap();
    let service = SettingsService::try_new(&conn).unwrap();

    let check = service.check_settings(SettingsLevel::Vehicle).unwrap();
    assert_eq!(check.missing, Some(SettingsLevel::GeoArea));
    assert_eq!(check.failure_code(), 1);
    assert!(check.recovered.is_empty());
}

#[test]
fn single_candidates_are_recovered_unambiguously_and_persisted() {
    let fixture = seeded();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Vehicle).unwrap();
    assert!(check.is_ok());
    assert!(check.persisted);
    assert!(!check.any_guessed());
    assert_eq!(
        check.recovered,
        vec![
            RecoveredSetting {
                key: SettingKey::CurrentArea,
                value: fixture.area,
                recovery: Recovery::Unambiguous,
                source: "only_geoarea",
            },
            RecoveredSetting {
                key: SettingKey::CurrentDriver,
                value: fixture.driver,
                recovery: Recovery::Unambiguous,
                source: "only_driver",
            },
            RecoveredSetting {
                key: SettingKey::CurrentVehicle,
                value: fixture.vehicle,
                recovery: Recovery::Unambiguous,
                source: "only_vehicle",
            },
        ]
    );
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentArea), Some(fixture.area));
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentVehicle), Some(fixture.vehicle));

    let again = service.check_settings(SettingsLevel::Vehicle).unwrap();
    assert!(again.is_ok());
    assert!(again.recovered.is_empty());
}

#[test]
fn area_of_most_recent_trip_is_guessed_among_several() {
    let fixture = seeded();
    let cabin = add_area(&fixture.conn, "Cabin");
    add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    add_trip(&fixture.conn, fixture.vehicle, fixture.driver, cabin, T0 + 100);
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::GeoArea).unwrap();
    assert!(check.any_guessed());
    assert_eq!(check.recovered[0].key, SettingKey::CurrentArea);
    assert_eq!(check.recovered[0].value, cabin);
    assert_eq!(check.recovered[0].source, "latest_trip");
}

#[test]
fn lowest_id_area_is_guessed_without_trips() {
    let fixture = seeded();
    add_area(&fixture.conn, "Cabin");
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::GeoArea).unwrap();
    assert_eq!(check.recovered[0].value, fixture.area);
    assert_eq!(check.recovered[0].recovery, Recovery::Guessed);
    assert_eq!(check.recovered[0].source, "lowest_id");
}

#[test]
fn stale_area_is_replaced() {
    let fixture = seeded();
    set_setting(&fixture.conn, SettingKey::CurrentArea, Some(fixture.area + 40));
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::GeoArea).unwrap();
    assert!(check.is_ok());
    assert!(check.cleared.is_empty());
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentArea), Some(fixture.area));
}

#[test]
fn passenger_is_not_accepted_as_current_driver() {
    let fixture = seeded();
    let passenger = add_passenger(&fixture.conn, "Pat");
    set_setting(&fixture.conn, SettingKey::CurrentArea, Some(fixture.area));
    set_setting(&fixture.conn, SettingKey::CurrentDriver, Some(passenger));
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Driver).unwrap();
    assert!(check.is_ok());
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentDriver), Some(fixture.driver));
}

#[test]
fn vehicle_default_driver_wins_among_several_drivers() {
    let fixture = seeded();
    add_driver(&fixture.conn, "Blake");
    set_setting(&fixture.conn, SettingKey::CurrentArea, Some(fixture.area));
    set_setting(&fixture.conn, SettingKey::CurrentVehicle, Some(fixture.vehicle));
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Driver).unwrap();
    assert_eq!(check.recovered.len(), 1);
    assert_eq!(check.recovered[0].value, fixture.driver);
    assert_eq!(check.recovered[0].recovery, Recovery::Unambiguous);
    assert_eq!(check.recovered[0].source, "vehicle_default_driver");
}

#[test]
fn only_active_vehicle_is_unambiguous() {
    let fixture = seeded();
    let master = SqliteMasterDataRepository::try_new(&fixture.conn).unwrap();
    let mut retired = Vehicle::new("Old van", fixture.driver, fixture.make, 0);
    retired.is_active = false;
    master.insert_vehicle(&retired).unwrap();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Vehicle).unwrap();
    let vehicle = check
        .recovered
        .iter()
        .find(|item| item.key == SettingKey::CurrentVehicle)
        .unwrap();
    assert_eq!(vehicle.value, fixture.vehicle);
    assert_eq!(vehicle.source, "only_active_vehicle");
    assert_eq!(vehicle.recovery, Recovery::Unambiguous);
}

#[test]
fn checking_stops_at_the_first_missing_level() {
    let conn = open_db_in_memory().unwrap();
    add_area(&conn, "Home");
    add_passenger(&conn, "Pat");
    let service = SettingsService::try_new(&conn).unwrap();

    let check = service.check_settings(SettingsLevel::TStopRequired).unwrap();
    assert_eq!(check.missing, Some(SettingsLevel::Driver));
    assert_eq!(check.recovered.len(), 1);
    assert_eq!(check.recovered[0].key, SettingKey::CurrentArea);
    assert_eq!(setting(&conn, SettingKey::CurrentArea), Some(1));
}

#[test]
fn trip_of_another_vehicle_is_replaced_and_its_stop_cleared() {
    let fixture = seeded();
    let other = add_vehicle(&fixture.conn, "Truck", fixture.driver, fixture.make, 0);
    let foreign_trip = add_trip(&fixture.conn, other, fixture.driver, fixture.area, T0);
    let foreign_stop = add_tstop(&fixture.conn, foreign_trip, T0 + 5);
    let own_trip = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    set_setting(&fixture.conn, SettingKey::CurrentVehicle, Some(fixture.vehicle));
    set_setting(&fixture.conn, SettingKey::CurrentTrip, Some(foreign_trip));
    set_setting(&fixture.conn, SettingKey::CurrentTStop, Some(foreign_stop));
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Trip).unwrap();
    assert!(check.is_ok());
    assert_eq!(check.cleared, vec![SettingKey::CurrentTStop]);
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentTrip), Some(own_trip));
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentTStop), None);
}

#[test]
fn stop_of_an_earlier_trip_is_cleared_when_current_trip_is_valid() {
    let fixture = seeded();
    let earlier = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    let earlier_stop = add_tstop(&fixture.conn, earlier, T0 + 5);
    finish_trip(&fixture.conn, earlier, T0 + 50);
    let current = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0 + 100);
    set_setting(&fixture.conn, SettingKey::CurrentVehicle, Some(fixture.vehicle));
    set_setting(&fixture.conn, SettingKey::CurrentTrip, Some(current));
    set_setting(&fixture.conn, SettingKey::CurrentTStop, Some(earlier_stop));
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Trip).unwrap();
    assert!(check.is_ok());
    assert_eq!(check.cleared, vec![SettingKey::CurrentTStop]);
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentTrip), Some(current));
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentTStop), None);
}

#[test]
fn single_in_progress_trip_is_unambiguous_and_latest_is_guessed_among_several() {
    let fixture = seeded();
    let first = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    set_setting(&fixture.conn, SettingKey::CurrentVehicle, Some(fixture.vehicle));
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Trip).unwrap();
    let trip = check.recovered.last().unwrap();
    assert_eq!(trip.key, SettingKey::CurrentTrip);
    assert_eq!(trip.value, first);
    assert_eq!(trip.recovery, Recovery::Unambiguous);
    assert_eq!(trip.source, "only_in_progress_trip");

    let second = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0 + 60);
    set_setting(&fixture.conn, SettingKey::CurrentTrip, None);

    let check = service.check_settings(SettingsLevel::Trip).unwrap();
    assert_eq!(
        check.recovered,
        vec![RecoveredSetting {
            key: SettingKey::CurrentTrip,
            value: second,
            recovery: Recovery::Guessed,
            source: "latest_in_progress_trip",
        }]
    );
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentTrip), Some(second));
}

#[test]
fn vehicle_without_trip_in_progress_is_missing_trip() {
    let fixture = seeded();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::TStopOptional).unwrap();
    assert_eq!(check.missing, Some(SettingsLevel::Trip));
    assert_eq!(check.failure_code(), 4);
}

#[test]
fn optional_stop_may_be_absent_but_required_stop_may_not() {
    let fixture = seeded();
    add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let optional = service.check_settings(SettingsLevel::TStopOptional).unwrap();
    assert!(optional.is_ok());

    let required = service.check_settings(SettingsLevel::TStopRequired).unwrap();
    assert_eq!(required.missing, Some(SettingsLevel::TStopRequired));
    assert_eq!(required.failure_code(), 6);
}

#[test]
fn latest_open_stop_is_guessed_when_several_are_open() {
    let fixture = seeded();
    let trip = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    add_tstop(&fixture.conn, trip, T0 + 10);
    let latest = add_tstop(&fixture.conn, trip, T0 + 20);
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::TStopRequired).unwrap();
    assert!(check.is_ok());
    let stop = check.recovered.last().unwrap();
    assert_eq!(stop.key, SettingKey::CurrentTStop);
    assert_eq!(stop.value, latest);
    assert_eq!(stop.recovery, Recovery::Guessed);
}

#[test]
fn inspection_reports_without_writing() {
    let fixture = seeded();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.inspect_settings(SettingsLevel::Vehicle).unwrap();
    assert!(check.is_ok());
    assert!(!check.persisted);
    assert_eq!(check.recovered.len(), 3);
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentArea), None);
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentVehicle), None);
}

#[test]
fn level_names_parse() {
    assert_eq!(
        SettingsLevel::parse("TSTOP_required"),
        Some(SettingsLevel::TStopRequired)
    );
    assert_eq!(SettingsLevel::parse("area"), None);
    assert_eq!(SettingsLevel::Trip.key(), SettingKey::CurrentTrip);
}

#[test]
fn check_serializes_keys_by_db_name() {
    let fixture = seeded();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.inspect_settings(SettingsLevel::GeoArea).unwrap();
    let json = serde_json::to_value(&check).unwrap();
    assert_eq!(json["requested"], "geoarea");
    assert_eq!(json["missing"], serde_json::Value::Null);
    assert_eq!(json["recovered"][0]["key"], "CURRENT_AREA");
    assert_eq!(json["recovered"][0]["recovery"], "unambiguous");
}

#[test]
fn saved_area_of_current_vehicle_is_unambiguous() {
    let fixture = seeded();
    let cabin = add_area(&fixture.conn, "Cabin");
    set_setting(&fixture.conn, SettingKey::CurrentVehicle, Some(fixture.vehicle));
    let mut saved = VehSettings::empty(fixture.vehicle);
    saved.area_id = Some(cabin);
    SqliteSettingsRepository::try_new(&fixture.conn)
        .unwrap()
        .save_veh_settings(&saved)
        .unwrap();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::GeoArea).unwrap();
    assert_eq!(
        check.recovered,
        vec![RecoveredSetting {
            key: SettingKey::CurrentArea,
            value: cabin,
            recovery: Recovery::Unambiguous,
            source: "vehicle_saved_area",
        }]
    );
}

#[test]
fn saved_driver_of_current_vehicle_beats_its_default_driver() {
    let fixture = seeded();
    let blake = add_driver(&fixture.conn, "Blake");
    set_setting(&fixture.conn, SettingKey::CurrentArea, Some(fixture.area));
    set_setting(&fixture.conn, SettingKey::CurrentVehicle, Some(fixture.vehicle));
    let mut saved = VehSettings::empty(fixture.vehicle);
    saved.driver_id = Some(blake);
    SqliteSettingsRepository::try_new(&fixture.conn)
        .unwrap()
        .save_veh_settings(&saved)
        .unwrap();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Driver).unwrap();
    assert_eq!(check.recovered.len(), 1);
    assert_eq!(check.recovered[0].value, blake);
    assert_eq!(check.recovered[0].recovery, Recovery::Unambiguous);
    assert_eq!(check.recovered[0].source, "vehicle_saved_driver");
}

#[test]
fn driver_of_most_recent_trip_is_guessed_without_current_vehicle() {
    let fixture = seeded();
    let blake = add_driver(&fixture.conn, "Blake");
    add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    add_trip(&fixture.conn, fixture.vehicle, blake, fixture.area, T0 + 100);
    set_setting(&fixture.conn, SettingKey::CurrentArea, Some(fixture.area));
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Driver).unwrap();
    assert_eq!(
        check.recovered,
        vec![RecoveredSetting {
            key: SettingKey::CurrentDriver,
            value: blake,
            recovery: Recovery::Guessed,
            source: "latest_trip",
        }]
    );
}

#[test]
fn trip_row_with_inconsistent_odometer_does_not_block_recovery() {
    let fixture = seeded();
    add_area(&fixture.conn, "Cabin");
    add_driver(&fixture.conn, "Blake");
    let trip = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    fixture
        .conn
        .execute("UPDATE trip SET odo_end = 5 WHERE _id = ?1;", [trip])
        .unwrap();
    let service = SettingsService::try_new(&fixture.conn).unwrap();

    let check = service.check_settings(SettingsLevel::Trip).unwrap();
    assert!(check.is_ok());
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentArea), Some(fixture.area));
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentDriver), Some(fixture.driver));
    assert_eq!(setting(&fixture.conn, SettingKey::CurrentTrip), Some(trip));
}
