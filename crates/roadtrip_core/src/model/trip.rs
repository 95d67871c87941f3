//! Trip and trip category records.
//!
//! # Invariants
//! - A trip without `time_end` is in progress.
//! - `odo_end >= odo_start` and `time_end >= time_start` when set.
//! - A roadtrip ends in a different geoarea (`roadtrip_end_area_id`).

use super::{normalize_text, require_text, ModelValidationError, RecordId, NEW_RECORD_ID};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripCategory {
    pub id: RecordId,
    pub name: String,
}

impl TripCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEW_RECORD_ID,
            name: normalize_text(&name.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("tripcategory", "name", &self.name)
    }
}

/// One drive of one vehicle, from start to (eventually) end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: RecordId,
    pub vehicle_id: RecordId,
    pub driver_id: RecordId,
    pub category_id: Option<RecordId>,
    /// Starting geoarea.
    pub area_id: RecordId,
    pub roadtrip_end_area_id: Option<RecordId>,
    /// Frequent trip this trip was started from, if any.
    pub freq_trip_id: Option<RecordId>,
    pub odo_start: i64,
    pub odo_end: Option<i64>,
    /// Unix seconds.
    pub time_start: i64,
    pub time_end: Option<i64>,
    pub passengers: Option<i32>,
    pub comment: Option<String>,
}

impl Trip {
    pub fn new(
        vehicle_id: RecordId,
        driver_id: RecordId,
        area_id: RecordId,
        odo_start: i64,
        time_start: i64,
    ) -> Self {
        Self {
            id: NEW_RECORD_ID,
            vehicle_id,
            driver_id,
            category_id: None,
            area_id,
            roadtrip_end_area_id: None,
            freq_trip_id: None,
            odo_start,
            odo_end: None,
            time_start,
            time_end: None,
            passengers: None,
            comment: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.time_end.is_none()
    }

    pub fn is_roadtrip(&self) -> bool {
        self.roadtrip_end_area_id.is_some()
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if let Some(odo_end) = self.odo_end {
            if odo_end < self.odo_start {
                return Err(ModelValidationError::OdometerOrder {
                    record: "trip",
                    start: self.odo_start,
                    end: odo_end,
                });
            }
        }
        if let Some(time_end) = self.time_end {
            if time_end < self.time_start {
                return Err(ModelValidationError::TimeOrder {
                    record: "trip",
                    start: self.time_start,
                    end: time_end,
                });
            }
        }
        Ok(())
    }
}

/// Pointer columns of one trip, read without record validation.
///
/// Settings recovery works on these so that a trip row with inconsistent
/// odometer or time values does not block unrelated lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripLink {
    pub id: RecordId,
    pub vehicle_id: RecordId,
    pub driver_id: RecordId,
    pub area_id: RecordId,
    pub roadtrip_end_area_id: Option<RecordId>,
    pub in_progress: bool,
}

#[cfg(test)]
mod tests {
    use super::Trip;
    use crate::model::ModelValidationError;

    #[test]
    fn new_trip_is_in_progress() {
        let trip = Trip::new(1, 1, 1, 100, 1_700_000_000);
        assert!(trip.is_in_progress());
        assert!(!trip.is_roadtrip());
    }

    #[test]
    fn end_time_before_start_is_rejected() {
        let mut trip = Trip::new(1, 1, 1, 100, 1_700_000_000);
        trip.time_end = Some(1_699_999_999);
        assert!(matches!(
            trip.validate(),
            Err(ModelValidationError::TimeOrder { .. })
        ));
    }

    #[test]
    fn end_odometer_below_start_is_rejected() {
        let mut trip = Trip::new(1, 1, 1, 100, 1_700_000_000);
        trip.odo_end = Some(99);
        assert!(matches!(
            trip.validate(),
            Err(ModelValidationError::OdometerOrder { .. })
        ));
    }
}
