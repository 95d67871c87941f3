//! Record-per-table domain model for the trip logbook.
//!
//! # Responsibility
//! - Define one plain struct per persisted row shape.
//! - Validate field-level invariants before persistence.
//!
//! # Invariants
//! - Every persisted record is identified by a positive `RecordId`.
//! - A record with `id == NEW_RECORD_ID` has not been inserted yet.
//! - Optional references are `None`, never a sentinel id.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod freq_trip;
pub mod geo_area;
pub mod location;
pub mod person;
pub mod settings;
pub mod trip;
pub mod tstop;
pub mod vehicle;

/// SQLite row id of any logbook record.
pub type RecordId = i64;

/// Id carried by records that were built in memory but not inserted yet.
pub const NEW_RECORD_ID: RecordId = 0;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Field-level validation failures for logbook records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Required text is empty after whitespace normalization.
    BlankField {
        record: &'static str,
        field: &'static str,
    },
    /// Ending odometer is below the starting odometer.
    OdometerOrder {
        record: &'static str,
        start: i64,
        end: i64,
    },
    /// Ending time is before the starting time.
    TimeOrder {
        record: &'static str,
        start: i64,
        end: i64,
    },
    /// Quantity or amount is negative.
    NegativeValue {
        record: &'static str,
        field: &'static str,
        value: i64,
    },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField { record, field } => {
                write!(f, "{record}.{field} must not be blank")
            }
            Self::OdometerOrder { record, start, end } => write!(
                f,
                "{record} ending odometer {end} is below starting odometer {start}"
            ),
            Self::TimeOrder { record, start, end } => {
                write!(f, "{record} ending time {end} is before starting time {start}")
            }
            Self::NegativeValue {
                record,
                field,
                value,
            } => write!(f, "{record}.{field} must not be negative, got {value}"),
        }
    }
}

impl Error for ModelValidationError {}

/// Collapses whitespace runs and trims user-entered text.
pub fn normalize_text(value: &str) -> String {
    WHITESPACE_RE.replace_all(value, " ").trim().to_string()
}

pub(crate) fn require_text(
    record: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if normalize_text(value).is_empty() {
        return Err(ModelValidationError::BlankField { record, field });
    }
    Ok(())
}

pub(crate) fn require_non_negative(
    record: &'static str,
    field: &'static str,
    value: i64,
) -> Result<(), ModelValidationError> {
    if value < 0 {
        return Err(ModelValidationError::NegativeValue {
            record,
            field,
            value,
        });
    }
    Ok(())
}
