//! Geographic area master record.

use super::{normalize_text, require_text, ModelValidationError, RecordId, NEW_RECORD_ID};
use serde::{Deserialize, Serialize};

/// A named geographic region vehicles operate within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoArea {
    pub id: RecordId,
    pub name: String,
}

impl GeoArea {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEW_RECORD_ID,
            name: normalize_text(&name.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("geoarea", "name", &self.name)
    }
}
