//! Locations within a geoarea and via-routes between them.

use super::{normalize_text, require_text, ModelValidationError, RecordId, NEW_RECORD_ID};
use serde::{Deserialize, Serialize};

/// A named place, scoped to one geoarea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: RecordId,
    pub area_id: RecordId,
    pub description: String,
    /// Unix seconds of the latest stop here; drives recency ordering.
    pub latest_time: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(area_id: RecordId, description: impl Into<String>) -> Self {
        Self {
            id: NEW_RECORD_ID,
            area_id,
            description: normalize_text(&description.into()),
            latest_time: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("location", "description", &self.description)
    }
}

/// A described road between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaRoute {
    pub id: RecordId,
    pub from_location_id: RecordId,
    pub to_location_id: RecordId,
    /// Typical trip-odometer distance, in tenths.
    pub distance: Option<i64>,
    pub description: String,
}

impl ViaRoute {
    pub fn new(
        from_location_id: RecordId,
        to_location_id: RecordId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: NEW_RECORD_ID,
            from_location_id,
            to_location_id,
            distance: None,
            description: normalize_text(&description.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("via_route", "description", &self.description)?;
        if let Some(distance) = self.distance {
            super::require_non_negative("via_route", "distance", distance)?;
        }
        Ok(())
    }
}
