use super::{VerifyIssue, VerifyLevel, VerifyReport, VerifyResult, MAX_ISSUE_SAMPLES};
use crate::db::migrations::{current_user_version, latest_version, required_tables};
use crate::db::table_exists;
use crate::model::RecordId;
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Id set a reference column must resolve into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Rows(&'static str),
    /// Persons flagged `is_driver`.
    Drivers,
}

impl Target {
    fn table(self) -> &'static str {
        match self {
            Self::Rows(table) => table,
            Self::Drivers => "person",
        }
    }

    fn id_sql(self) -> String {
        match self {
            Self::Rows(table) => format!("SELECT _id FROM {table};"),
            Self::Drivers => "SELECT _id FROM person WHERE is_driver = 1;".to_string(),
        }
    }
}

/// `table.column` must name a row of `target`.
#[derive(Debug, Clone, Copy)]
struct Reference {
    table: &'static str,
    id_column: &'static str,
    column: &'static str,
    target: Target,
    required: bool,
}

const fn required(table: &'static str, column: &'static str, target: Target) -> Reference {
    Reference {
        table,
        id_column: "_id",
        column,
        target,
        required: true,
    }
}

const fn optional(table: &'static str, column: &'static str, target: Target) -> Reference {
    Reference {
        table,
        id_column: "_id",
        column,
        target,
        required: false,
    }
}

const MASTER_TARGETS: [Target; 7] = [
    Target::Rows("geoarea"),
    Target::Rows("person"),
    Target::Drivers,
    Target::Rows("vehiclemake"),
    Target::Rows("vehicle"),
    Target::Rows("gas_brandgrade"),
    Target::Rows("tripcategory"),
];

const MASTER_REFERENCES: [Reference; 3] = [
    required("vehicle", "driverid", Target::Drivers),
    required("vehicle", "makeid", Target::Rows("vehiclemake")),
    Reference {
        table: "veh_settings",
        id_column: "vid",
        column: "vid",
        target: Target::Rows("vehicle"),
        required: true,
    },
];

const TRANSACTIONAL_REFERENCES: [Reference; 26] = [
    required("location", "a_id", Target::Rows("geoarea")),
    required("via_route", "locid_from", Target::Rows("location")),
    required("via_route", "locid_to", Target::Rows("location")),
    required("trip", "vid", Target::Rows("vehicle")),
    required("trip", "did", Target::Drivers),
    optional("trip", "catid", Target::Rows("tripcategory")),
    required("trip", "aid", Target::Rows("geoarea")),
    optional("trip", "roadtrip_end_aid", Target::Rows("geoarea")),
    optional("trip", "freqtripid", Target::Rows("freqtrip")),
    required("tstop", "tripid", Target::Rows("trip")),
    optional("tstop", "locid", Target::Rows("location")),
    optional("tstop", "via_id", Target::Rows("via_route")),
    optional("tstop", "a_id", Target::Rows("geoarea")),
    required("tstop_gas", "_id", Target::Rows("tstop")),
    required("tstop_gas", "vid", Target::Rows("vehicle")),
    optional("tstop_gas", "gas_brandgrade_id", Target::Rows("gas_brandgrade")),
    required("freqtrip", "a_id", Target::Rows("geoarea")),
    required("freqtrip", "start_locid", Target::Rows("location")),
    required("freqtrip", "end_locid", Target::Rows("location")),
    optional("freqtrip", "end_via_id", Target::Rows("via_route")),
    optional("freqtrip", "roadtrip_end_aid", Target::Rows("geoarea")),
    optional("freqtrip", "catid", Target::Rows("tripcategory")),
    required("freqtrip_tstop", "freqtripid", Target::Rows("freqtrip")),
    required("freqtrip_tstop", "locid", Target::Rows("location")),
    optional("freqtrip_tstop", "viaid", Target::Rows("via_route")),
    optional("vehicle", "last_tripid", Target::Rows("trip")),
];

const GAS_VEHICLE_MISMATCH_SQL: &str = "SELECT g._id, g.vid, t.vid
FROM tstop_gas g
INNER JOIN tstop s ON s._id = g._id
INNER JOIN trip t ON t._id = s.tripid
WHERE g.vid <> t.vid
ORDER BY g._id ASC;";

#[derive(Debug, Default)]
struct IssueSink {
    samples: Vec<VerifyIssue>,
    count: usize,
}

impl IssueSink {
    fn push(&mut self, issue: VerifyIssue) {
        self.count += 1;
        if self.samples.len() < MAX_ISSUE_SAMPLES {
            self.samples.push(issue);
        }
    }
}

/// Level-by-level verifier over one connection.
///
/// Id sets of referenced tables are loaded once per `verify` call and shared
/// by the master and transactional levels.
pub struct RdbVerifier<'conn> {
    conn: &'conn Connection,
    id_cache: HashMap<Target, HashSet<RecordId>>,
}

impl<'conn> RdbVerifier<'conn> {
    /// Does not require a migrated schema; a stale schema is reported by the
    /// physical level instead.
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            id_cache: HashMap::new(),
        }
    }

    /// Runs every level up to `level`, stopping at the first failing one.
    pub fn verify(&mut self, level: VerifyLevel) -> VerifyResult<VerifyReport> {
        self.id_cache.clear();
        let mut report = VerifyReport {
            requested: level,
            passed: Vec::new(),
            failed_level: None,
            issues: Vec::new(),
            issue_count: 0,
        };

        for step in VerifyLevel::ALL.into_iter().filter(|step| *step <= level) {
            let mut sink = IssueSink::default();
            match step {
                VerifyLevel::Physical => self.check_physical(&mut sink)?,
                VerifyLevel::MasterData => self.check_master_data(&mut sink)?,
                VerifyLevel::TransactionalData => self.check_transactional_data(&mut sink)?,
            }
            if sink.count > 0 {
                warn!(
                    "event=verify module=verify status=failed requested={} level={} issues={}",
                    level, step, sink.count
                );
                report.failed_level = Some(step);
                report.issues = sink.samples;
                report.issue_count = sink.count;
                return Ok(report);
            }
            report.passed.push(step);
        }

        info!(
            "event=verify module=verify status=ok requested={} cached_tables={}",
            level,
            self.id_cache.len()
        );
        Ok(report)
    }

    fn check_physical(&self, sink: &mut IssueSink) -> VerifyResult<()> {
        let mut stmt = self.conn.prepare("PRAGMA integrity_check;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for message in rows {
            let message = message?;
            if message != "ok" {
                sink.push(VerifyIssue::Integrity { message });
            }
        }

        let found = current_user_version(self.conn)?;
        let expected = latest_version();
        if found != expected {
            sink.push(VerifyIssue::SchemaVersion { found, expected });
        }

        for &table in required_tables() {
            if !table_exists(self.conn, table)? {
                sink.push(VerifyIssue::MissingTable { table });
            }
        }
        Ok(())
    }

    fn check_master_data(&mut self, sink: &mut IssueSink) -> VerifyResult<()> {
        for target in MASTER_TARGETS {
            self.ids(target)?;
        }
        self.check_references(&MASTER_REFERENCES, sink)
    }

    fn check_transactional_data(&mut self, sink: &mut IssueSink) -> VerifyResult<()> {
        self.check_references(&TRANSACTIONAL_REFERENCES, sink)?;

        let mut stmt = self.conn.prepare(GAS_VEHICLE_MISMATCH_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok(VerifyIssue::GasVehicleMismatch {
                tstop_id: row.get(0)?,
                gas_vehicle_id: row.get(1)?,
                trip_vehicle_id: row.get(2)?,
            })
        })?;
        for issue in rows {
            sink.push(issue?);
        }
        Ok(())
    }

    fn check_references(
        &mut self,
        references: &[Reference],
        sink: &mut IssueSink,
    ) -> VerifyResult<()> {
        for reference in references {
            let rows = load_reference_column(self.conn, reference)?;
            let ids = self.ids(reference.target)?;
            for (row_id, value) in rows {
                let target_id = match value {
                    Value::Null if !reference.required => continue,
                    Value::Null => None,
                    Value::Integer(id) if ids.contains(&id) => continue,
                    Value::Integer(id) => Some(id),
                    other => {
                        sink.push(VerifyIssue::MalformedReference {
                            table: reference.table,
                            row_id,
                            column: reference.column,
                            value: describe_value(&other),
                        });
                        continue;
                    }
                };
                sink.push(VerifyIssue::DanglingReference {
                    table: reference.table,
                    row_id,
                    column: reference.column,
                    target_table: reference.target.table(),
                    target_id,
                });
            }
        }
        Ok(())
    }

    fn ids(&mut self, target: Target) -> VerifyResult<&HashSet<RecordId>> {
        let ids = match self.id_cache.entry(target) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(load_ids(self.conn, target)?),
        };
        Ok(ids)
    }
}

fn load_ids(conn: &Connection, target: Target) -> VerifyResult<HashSet<RecordId>> {
    let mut stmt = conn.prepare(&target.id_sql())?;
    let rows = stmt.query_map([], |row| row.get::<_, RecordId>(0))?;
    let mut ids = HashSet::new();
    for id in rows {
        ids.insert(id?);
    }
    Ok(ids)
}

/// Row keys that are not integers read as 0; the value column is read raw.
fn load_reference_column(
    conn: &Connection,
    reference: &Reference,
) -> VerifyResult<Vec<(RecordId, Value)>> {
    let sql = format!(
        "SELECT DISTINCT CAST({id} AS INTEGER), {column} FROM {table} ORDER BY 1 ASC, 2 ASC;",
        id = reference.id_column,
        column = reference.column,
        table = reference.table
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => format!("real {value}"),
        Value::Text(value) => format!("text '{value}'"),
        Value::Blob(value) => format!("blob of {} bytes", value.len()),
    }
}
