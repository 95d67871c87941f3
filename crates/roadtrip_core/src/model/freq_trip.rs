//! Frequent trip templates.

use super::{
    normalize_text, require_non_negative, require_text, ModelValidationError, RecordId,
    NEW_RECORD_ID,
};
use serde::{Deserialize, Serialize};

/// A commonly driven trip, used to prefill new trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreqTrip {
    pub id: RecordId,
    pub area_id: RecordId,
    pub start_location_id: RecordId,
    pub end_location_id: RecordId,
    pub end_via_id: Option<RecordId>,
    pub roadtrip_end_area_id: Option<RecordId>,
    pub category_id: Option<RecordId>,
    pub end_odo_trip: i64,
    pub description: String,
    /// Minutes after local midnight.
    pub typical_time_of_day: Option<i32>,
}

impl FreqTrip {
    pub fn new(
        area_id: RecordId,
        start_location_id: RecordId,
        end_location_id: RecordId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: NEW_RECORD_ID,
            area_id,
            start_location_id,
            end_location_id,
            end_via_id: None,
            roadtrip_end_area_id: None,
            category_id: None,
            end_odo_trip: 0,
            description: normalize_text(&description.into()),
            typical_time_of_day: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("freqtrip", "description", &self.description)?;
        require_non_negative("freqtrip", "end_odo_trip", self.end_odo_trip)
    }
}

/// One intermediate stop of a frequent trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreqTripTStop {
    pub id: RecordId,
    pub freq_trip_id: RecordId,
    pub location_id: RecordId,
    pub via_id: Option<RecordId>,
    pub odo_trip: i64,
}

impl FreqTripTStop {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_negative("freqtrip_tstop", "odo_trip", self.odo_trip)
    }
}
