//! Person master record (drivers and passengers).

use super::{normalize_text, require_text, ModelValidationError, RecordId, NEW_RECORD_ID};
use serde::{Deserialize, Serialize};

/// Someone who can ride along, and optionally drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: RecordId,
    pub name: String,
    /// Only drivers can be referenced by `trip.did` and `vehicle.driverid`.
    pub is_driver: bool,
    /// Inactive people stay referenced by history but are hidden from pickers.
    pub is_active: bool,
    pub comment: Option<String>,
}

impl Person {
    /// Creates an active driver.
    pub fn driver(name: impl Into<String>) -> Self {
        Self {
            id: NEW_RECORD_ID,
            name: normalize_text(&name.into()),
            is_driver: true,
            is_active: true,
            comment: None,
        }
    }

    /// Creates an active non-driving passenger.
    pub fn passenger(name: impl Into<String>) -> Self {
        Self {
            is_driver: false,
            ..Self::driver(name)
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("person", "name", &self.name)
    }
}
