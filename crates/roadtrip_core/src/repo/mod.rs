//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-area data access contracts over the logbook tables.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths call the record's `validate()` before SQL mutations.
//! - Write paths reject references to rows that do not exist.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories only accept connections at the latest schema version.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::{ModelValidationError, RecordId};
use rusqlite::{Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod freq_trip_repo;
pub mod location_repo;
pub mod master_repo;
pub mod settings_repo;
pub mod trip_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every logbook table.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    NotFound {
        table: &'static str,
        id: RecordId,
    },
    /// A written record's `column` points at a `table` row that does not exist.
    MissingReference {
        table: &'static str,
        column: &'static str,
        id: RecordId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { table, id } => write!(f, "{table} row not found: {id}"),
            Self::MissingReference { table, column, id } => {
                write!(f, "{column} references missing {table} row {id}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Returns whether `table` has a row with `_id = id`.
pub(crate) fn row_exists(conn: &Connection, table: &'static str, id: RecordId) -> RepoResult<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE _id = ?1;"),
            [id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Fails with `MissingReference` unless `table` has a row with `_id = id`.
pub(crate) fn require_reference(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    id: RecordId,
) -> RepoResult<()> {
    if !row_exists(conn, table, id)? {
        return Err(RepoError::MissingReference { table, column, id });
    }
    Ok(())
}

/// Same as `require_reference`, skipping absent optional references.
pub(crate) fn require_optional_reference(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    id: Option<RecordId>,
) -> RepoResult<()> {
    match id {
        Some(id) => require_reference(conn, table, column, id),
        None => Ok(()),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
