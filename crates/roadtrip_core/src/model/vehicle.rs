//! Vehicle and vehicle make master records.
//!
//! # Invariants
//! - `odo_curr` never drops below `odo_orig`.
//! - `driver_id` names the vehicle's default driver.

use super::{normalize_text, require_text, ModelValidationError, RecordId, NEW_RECORD_ID};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleMake {
    pub id: RecordId,
    pub name: String,
}

impl VehicleMake {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEW_RECORD_ID,
            name: normalize_text(&name.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("vehiclemake", "name", &self.name)
    }
}

/// A vehicle whose trips are logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: RecordId,
    pub nickname: String,
    /// Default driver, used when no trip says otherwise.
    pub driver_id: RecordId,
    pub make_id: RecordId,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub vin: Option<String>,
    pub plate: Option<String>,
    /// Odometer when the vehicle was added to the logbook.
    pub odo_orig: i64,
    /// Latest known odometer.
    pub odo_curr: i64,
    /// Most recently completed trip.
    pub last_trip_id: Option<RecordId>,
    pub is_active: bool,
    pub comment: Option<String>,
}

impl Vehicle {
    pub fn new(
        nickname: impl Into<String>,
        driver_id: RecordId,
        make_id: RecordId,
        odo_orig: i64,
    ) -> Self {
        Self {
            id: NEW_RECORD_ID,
            nickname: normalize_text(&nickname.into()),
            driver_id,
            make_id,
            model: None,
            year: None,
            vin: None,
            plate: None,
            odo_orig,
            odo_curr: odo_orig,
            last_trip_id: None,
            is_active: true,
            comment: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("vehicle", "nickname", &self.nickname)?;
        if self.odo_curr < self.odo_orig {
            return Err(ModelValidationError::OdometerOrder {
                record: "vehicle",
                start: self.odo_orig,
                end: self.odo_curr,
            });
        }
        Ok(())
    }
}
