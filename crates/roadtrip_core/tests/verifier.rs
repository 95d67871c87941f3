mod common;

use common::{add_location, add_passenger, add_trip, add_tstop, add_vehicle, seeded, T0};
use roadtrip_core::verify::{
    RdbVerifier, VerifyIssue, VerifyLevel, VerifyReport, MAX_ISSUE_SAMPLES,
};
use rusqlite::Connection;

fn verify(conn: &Connection, level: VerifyLevel) -> VerifyReport {
    RdbVerifier::new(conn).verify(level).unwrap()
}

#[test]
fn consistent_logbook_passes_every_level() {
    let fixture = seeded();
    let trip = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    add_tstop(&fixture.conn, trip, T0 + 60);

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert!(report.is_ok());
    assert_eq!(report.failure_code(), 0);
    assert_eq!(report.passed, VerifyLevel::ALL.to_vec());
    assert_eq!(report.issue_count, 0);
}

#[test]
fn missing_table_fails_physical_level_and_stops() {
    let fixture = seeded();
    fixture.conn.execute_batch("DROP TABLE freqtrip_tstop;").unwrap();

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(report.failed_level, Some(VerifyLevel::Physical));
    assert_eq!(report.failure_code(), 1);
    assert!(report.passed.is_empty());
    assert_eq!(
        report.issues,
        vec![VerifyIssue::MissingTable {
            table: "freqtrip_tstop"
        }]
    );
}

#[test]
fn stale_schema_version_is_reported() {
    let fixture = seeded();
    fixture.conn.execute_batch("PRAGMA user_version = 1;").unwrap();

    let report = verify(&fixture.conn, VerifyLevel::Physical);
    assert_eq!(
        report.issues,
        vec![VerifyIssue::SchemaVersion {
            found: 1,
            expected: 2
        }]
    );
}

#[test]
fn vehicle_driven_by_passenger_fails_master_level() {
    let fixture = seeded();
    let passenger = add_passenger(&fixture.conn, "Pat");
    fixture
        .conn
        .execute(
            "UPDATE vehicle SET driverid = ?1 WHERE _id = ?2;",
            [passenger, fixture.vehicle],
        )
        .unwrap();

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(report.failed_level, Some(VerifyLevel::MasterData));
    assert_eq!(report.failure_code(), 2);
    assert_eq!(report.passed, vec![VerifyLevel::Physical]);
    assert_eq!(
        report.issues,
        vec![VerifyIssue::DanglingReference {
            table: "vehicle",
            row_id: fixture.vehicle,
            column: "driverid",
            target_table: "person",
            target_id: Some(passenger),
        }]
    );
}

#[test]
fn veh_settings_of_deleted_vehicle_fails_master_level() {
    let fixture = seeded();
    fixture
        .conn
        .execute_batch(
            "INSERT INTO veh_settings (vid, sname, ivalue) VALUES (40, 'CURRENT_AREA', 1);
             INSERT INTO veh_settings (vid, sname, ivalue) VALUES (40, 'CURRENT_DRIVER', 1);",
        )
        .unwrap();

    let report = verify(&fixture.conn, VerifyLevel::MasterData);
    assert_eq!(report.failure_code(), 2);
    assert_eq!(report.issue_count, 1);
    assert!(matches!(
        report.issues[0],
        VerifyIssue::DanglingReference {
            table: "veh_settings",
            row_id: 40,
            target_id: Some(40),
            ..
        }
    ));
}

#[test]
fn dangling_trip_vehicle_fails_transactional_level_only() {
    let fixture = seeded();
    fixture
        .conn
        .execute(
            "INSERT INTO trip (vid, did, aid, odo_start, time_start) VALUES (999, ?1, ?2, 0, ?3);",
            [fixture.driver, fixture.area, T0],
        )
        .unwrap();

    let master = verify(&fixture.conn, VerifyLevel::MasterData);
    assert!(master.is_ok());

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(report.failure_code(), 3);
    assert_eq!(
        report.passed,
        vec![VerifyLevel::Physical, VerifyLevel::MasterData]
    );
    assert!(matches!(
        report.issues[0],
        VerifyIssue::DanglingReference {
            table: "trip",
            column: "vid",
            target_table: "vehicle",
            target_id: Some(999),
            ..
        }
    ));
}

#[test]
fn last_trip_pointer_is_checked() {
    let fixture = seeded();
    fixture
        .conn
        .execute(
            "UPDATE vehicle SET last_tripid = 55 WHERE _id = ?1;",
            [fixture.vehicle],
        )
        .unwrap();

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(report.failed_level, Some(VerifyLevel::TransactionalData));
    assert!(report.issues.iter().any(|issue| matches!(
        issue,
        VerifyIssue::DanglingReference {
            table: "vehicle",
            column: "last_tripid",
            target_id: Some(55),
            ..
        }
    )));
}

#[test]
fn gas_recorded_against_another_vehicle_is_reported() {
    let fixture = seeded();
    let truck = add_vehicle(&fixture.conn, "Truck", fixture.driver, fixture.make, 0);
    let trip = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    let stop = add_tstop(&fixture.conn, trip, T0 + 60);
    fixture
        .conn
        .execute(
            "INSERT INTO tstop_gas (_id, vid, quant, price_per, price_total, fillup)
             VALUES (?1, ?2, 1000, 100, 1000, 0);",
            [stop, truck],
        )
        .unwrap();

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(
        report.issues,
        vec![VerifyIssue::GasVehicleMismatch {
            tstop_id: stop,
            gas_vehicle_id: truck,
            trip_vehicle_id: fixture.vehicle,
        }]
    );
}

#[test]
fn issue_samples_are_capped_but_counted() {
    let fixture = seeded();
    let tx = fixture.conn.unchecked_transaction().unwrap();
    for index in 0..150 {
        tx.execute(
            "INSERT INTO location (a_id, loc_descr) VALUES (?1, 'lost');",
            [1_000 + index],
        )
        .unwrap();
    }
    tx.commit().unwrap();

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(report.issue_count, 150);
    assert_eq!(report.issues.len(), MAX_ISSUE_SAMPLES);
    assert_eq!(report.issues[0].to_string().split(':').next(), Some("location row 1"));
}

#[test]
fn report_serializes_with_tagged_issues() {
    let fixture = seeded();
    fixture
        .conn
        .execute(
            "UPDATE vehicle SET makeid = 12 WHERE _id = ?1;",
            [fixture.vehicle],
        )
        .unwrap();

    let report = verify(&fixture.conn, VerifyLevel::MasterData);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["failed_level"], "master");
    assert_eq!(json["issue_count"], 1);
    assert_eq!(json["issues"][0]["kind"], "dangling_reference");
    assert_eq!(json["issues"][0]["target_table"], "vehiclemake");
    assert_eq!(json["issues"][0]["target_id"], 12);
}

#[test]
fn null_in_required_reference_is_reported_without_target() {
    let fixture = seeded();
    fixture
        .conn
        .execute_batch(
            "DROP TABLE via_route;
             CREATE TABLE via_route (
                 _id INTEGER PRIMARY KEY AUTOINCREMENT,
                 locid_from INTEGER,
                 locid_to INTEGER,
                 odo_dist INTEGER,
                 via_descr TEXT
             );",
        )
        .unwrap();
    let home = add_location(&fixture.conn, fixture.area, "Home");
    fixture
        .conn
        .execute(
            "INSERT INTO via_route (locid_from, locid_to, via_descr) VALUES (?1, NULL, 'Ridge');",
            [home],
        )
        .unwrap();

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(report.failed_level, Some(VerifyLevel::TransactionalData));
    assert_eq!(report.issue_count, 1);
    assert_eq!(
        report.issues,
        vec![VerifyIssue::DanglingReference {
            table: "via_route",
            row_id: 1,
            column: "locid_to",
            target_table: "location",
            target_id: None,
        }]
    );
    assert_eq!(
        report.issues[0].to_string(),
        "via_route row 1: required locid_to reference to location is null"
    );
}

#[test]
fn non_integer_reference_value_is_reported_instead_of_failing() {
    let fixture = seeded();
    let trip = add_trip(&fixture.conn, fixture.vehicle, fixture.driver, fixture.area, T0);
    fixture
        .conn
        .execute("UPDATE trip SET catid = 'commute' WHERE _id = ?1;", [trip])
        .unwrap();

    let report = verify(&fixture.conn, VerifyLevel::TransactionalData);
    assert_eq!(report.failure_code(), 3);
    assert_eq!(
        report.issues,
        vec![VerifyIssue::MalformedReference {
            table: "trip",
            row_id: trip,
            column: "catid",
            value: "text 'commute'".to_string(),
        }]
    );
}
