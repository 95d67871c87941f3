use roadtrip_core::db::migrations::{latest_version, required_tables};
use roadtrip_core::db::{open_db, open_db_in_memory, open_db_read_only, table_exists, DbError};
use rusqlite::Connection;

#[test]
fn in_memory_database_has_every_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in required_tables() {
        assert!(table_exists(&conn, table).unwrap(), "missing table {table}");
    }
}

#[test]
fn reopening_a_file_database_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roadtrip.db");

    let first = open_db(&path).unwrap();
    first
        .execute("INSERT INTO geoarea (aname) VALUES ('Home');", [])
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    let areas: i64 = second
        .query_row("SELECT COUNT(*) FROM geoarea;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(areas, 1);
}

#[test]
fn version_one_database_is_upgraded_with_veh_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE settings (sname TEXT PRIMARY KEY, ivalue INTEGER);
         INSERT INTO settings (sname, ivalue) VALUES ('CURRENT_AREA', 4);
         PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);

    let upgraded = open_db(&path).unwrap();
    assert_eq!(schema_version(&upgraded), latest_version());
    assert!(table_exists(&upgraded, "veh_settings").unwrap());
    let area: i64 = upgraded
        .query_row(
            "SELECT ivalue FROM settings WHERE sname = 'CURRENT_AREA';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(area, 4);
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn read_only_open_does_not_migrate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE geoarea (_id INTEGER PRIMARY KEY, aname TEXT);")
        .unwrap();

    let conn = open_db_read_only(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
    assert!(!table_exists(&conn, "trip").unwrap());
    assert!(conn
        .execute("INSERT INTO geoarea (aname) VALUES ('x');", [])
        .is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}
