//! Structural and referential verification of a logbook database.
//!
//! # Responsibility
//! - Report physical damage, schema drift, and dangling references.
//! - Map the first failing level to a stable numeric failure code.
//!
//! # Invariants
//! - Verification is read-only.
//! - Levels run in increasing order and stop at the first failing level.
//! - At most `MAX_ISSUE_SAMPLES` issues are kept; `issue_count` is exact.

use crate::db::DbError;
use crate::model::RecordId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod rdb_verifier;

pub use rdb_verifier::RdbVerifier;

/// Upper bound of issues kept in one report.
pub const MAX_ISSUE_SAMPLES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyLevel {
    /// SQLite integrity, schema version, required tables.
    Physical = 1,
    /// Reference closure among master tables.
    #[serde(rename = "master")]
    MasterData = 2,
    /// Reference closure of trip-log tables against master data.
    #[serde(rename = "transactional")]
    TransactionalData = 3,
}

impl VerifyLevel {
    pub const ALL: [VerifyLevel; 3] = [
        VerifyLevel::Physical,
        VerifyLevel::MasterData,
        VerifyLevel::TransactionalData,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::MasterData => "master",
            Self::TransactionalData => "transactional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

impl Display for VerifyLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifyIssue {
    /// A row returned by `PRAGMA integrity_check` other than `ok`.
    Integrity { message: String },
    SchemaVersion { found: u32, expected: u32 },
    MissingTable { table: &'static str },
    /// `table.column` of row `row_id` names a row absent from `target_table`.
    DanglingReference {
        table: &'static str,
        row_id: RecordId,
        column: &'static str,
        target_table: &'static str,
        /// `None` when a required reference is NULL.
        target_id: Option<RecordId>,
    },
    /// `table.column` of row `row_id` holds a value that is not an id.
    MalformedReference {
        table: &'static str,
        row_id: RecordId,
        column: &'static str,
        value: String,
    },
    /// A gas purchase recorded against another vehicle than its trip's.
    GasVehicleMismatch {
        tstop_id: RecordId,
        gas_vehicle_id: RecordId,
        trip_vehicle_id: RecordId,
    },
}

impl Display for VerifyIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integrity { message } => write!(f, "integrity_check: {message}"),
            Self::SchemaVersion { found, expected } => {
                write!(f, "schema version {found}, expected {expected}")
            }
            Self::MissingTable { table } => write!(f, "missing table {table}"),
            Self::DanglingReference {
                table,
                row_id,
                column,
                target_table,
                target_id: Some(target_id),
            } => write!(
                f,
                "{table} row {row_id}: {column} references missing {target_table} row {target_id}"
            ),
            Self::DanglingReference {
                table,
                row_id,
                column,
                target_table,
                target_id: None,
            } => write!(
                f,
                "{table} row {row_id}: required {column} reference to {target_table} is null"
            ),
            Self::MalformedReference {
                table,
                row_id,
                column,
                value,
            } => write!(f, "{table} row {row_id}: {column} holds non-id value {value}"),
            Self::GasVehicleMismatch {
                tstop_id,
                gas_vehicle_id,
                trip_vehicle_id,
            } => write!(
                f,
                "tstop_gas row {tstop_id}: vehicle {gas_vehicle_id} differs from trip vehicle {trip_vehicle_id}"
            ),
        }
    }
}

/// Outcome of `RdbVerifier::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub requested: VerifyLevel,
    /// Levels that ran and passed.
    pub passed: Vec<VerifyLevel>,
    pub failed_level: Option<VerifyLevel>,
    /// Sampled issues of the failed level.
    pub issues: Vec<VerifyIssue>,
    /// Total issues found, including those not sampled.
    pub issue_count: usize,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.failed_level.is_none()
    }

    /// `0` on success, otherwise the failed level's number.
    pub fn failure_code(&self) -> u8 {
        self.failed_level.map_or(0, VerifyLevel::code)
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(Debug)]
pub enum VerifyError {
    Db(DbError),
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "verification query failed: {err}"),
        }
    }
}

impl Error for VerifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for VerifyError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for VerifyError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
