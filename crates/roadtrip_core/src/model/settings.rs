//! Setting keys and the per-vehicle settings snapshot.
//!
//! # Invariants
//! - `CURRENT_VEHICLE` is global only; every other key is vehicle-scoped and
//!   can be saved into `veh_settings` for a vehicle.
//! - A key stored with a NULL value is equivalent to an absent key.

use super::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Current-state pointer names, as stored in `settings.sname`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingKey {
    CurrentVehicle,
    CurrentArea,
    CurrentDriver,
    CurrentTrip,
    #[serde(rename = "CURRENT_TSTOP")]
    CurrentTStop,
    PrevLocation,
    #[serde(rename = "CURRENT_FREQTRIP")]
    CurrentFreqTrip,
}

impl SettingKey {
    /// Keys copied into and out of `veh_settings` on vehicle change.
    pub const VEHICLE_SCOPED: [SettingKey; 6] = [
        SettingKey::CurrentArea,
        SettingKey::CurrentDriver,
        SettingKey::CurrentTrip,
        SettingKey::CurrentTStop,
        SettingKey::PrevLocation,
        SettingKey::CurrentFreqTrip,
    ];

    pub fn as_db_name(self) -> &'static str {
        match self {
            Self::CurrentVehicle => "CURRENT_VEHICLE",
            Self::CurrentArea => "CURRENT_AREA",
            Self::CurrentDriver => "CURRENT_DRIVER",
            Self::CurrentTrip => "CURRENT_TRIP",
            Self::CurrentTStop => "CURRENT_TSTOP",
            Self::PrevLocation => "PREV_LOCATION",
            Self::CurrentFreqTrip => "CURRENT_FREQTRIP",
        }
    }

    pub fn from_db_name(value: &str) -> Option<Self> {
        match value {
            "CURRENT_VEHICLE" => Some(Self::CurrentVehicle),
            "CURRENT_AREA" => Some(Self::CurrentArea),
            "CURRENT_DRIVER" => Some(Self::CurrentDriver),
            "CURRENT_TRIP" => Some(Self::CurrentTrip),
            "CURRENT_TSTOP" => Some(Self::CurrentTStop),
            "PREV_LOCATION" => Some(Self::PrevLocation),
            "CURRENT_FREQTRIP" => Some(Self::CurrentFreqTrip),
            _ => None,
        }
    }

    pub fn is_vehicle_scoped(self) -> bool {
        self != Self::CurrentVehicle
    }
}

impl Display for SettingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_name())
    }
}

/// Current-state pointers belonging to one vehicle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehSettings {
    pub vehicle_id: RecordId,
    pub area_id: Option<RecordId>,
    pub driver_id: Option<RecordId>,
    pub trip_id: Option<RecordId>,
    pub tstop_id: Option<RecordId>,
    pub prev_location_id: Option<RecordId>,
    pub freq_trip_id: Option<RecordId>,
}

impl VehSettings {
    pub fn empty(vehicle_id: RecordId) -> Self {
        Self {
            vehicle_id,
            ..Self::default()
        }
    }

    /// Returns the pointer stored under a vehicle-scoped key.
    ///
    /// `CURRENT_VEHICLE` maps to the owning vehicle id.
    pub fn get(&self, key: SettingKey) -> Option<RecordId> {
        match key {
            SettingKey::CurrentVehicle => Some(self.vehicle_id),
            SettingKey::CurrentArea => self.area_id,
            SettingKey::CurrentDriver => self.driver_id,
            SettingKey::CurrentTrip => self.trip_id,
            SettingKey::CurrentTStop => self.tstop_id,
            SettingKey::PrevLocation => self.prev_location_id,
            SettingKey::CurrentFreqTrip => self.freq_trip_id,
        }
    }

    /// Stores a pointer under a vehicle-scoped key; `CURRENT_VEHICLE` is ignored.
    pub fn set(&mut self, key: SettingKey, value: Option<RecordId>) {
        match key {
            SettingKey::CurrentVehicle => {}
            SettingKey::CurrentArea => self.area_id = value,
            SettingKey::CurrentDriver => self.driver_id = value,
            SettingKey::CurrentTrip => self.trip_id = value,
            SettingKey::CurrentTStop => self.tstop_id = value,
            SettingKey::PrevLocation => self.prev_location_id = value,
            SettingKey::CurrentFreqTrip => self.freq_trip_id = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        SettingKey::VEHICLE_SCOPED
            .iter()
            .all(|key| self.get(*key).is_none())
    }
}
