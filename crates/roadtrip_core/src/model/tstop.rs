//! Trip stop, gas purchase, and gas brand/grade records.
//!
//! # Invariants
//! - A stop without `time_cont` has not been continued from yet ("open").
//! - `time_cont >= time_stop` when both are set.
//! - A `TStopGas` shares its id with the stop it belongs to.

use super::{
    normalize_text, require_non_negative, require_text, ModelValidationError, RecordId,
    NEW_RECORD_ID,
};
use serde::{Deserialize, Serialize};

/// `flag_sides` bit: the stop includes a gas purchase.
pub const FLAG_GAS: i32 = 0x01;
/// `flag_sides` bit: the stop ended the trip.
pub const FLAG_TRIP_END: i32 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasBrandGrade {
    pub id: RecordId,
    pub name: String,
}

impl GasBrandGrade {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEW_RECORD_ID,
            name: normalize_text(&name.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("gas_brandgrade", "name", &self.name)
    }
}

/// A stop event within a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TStop {
    pub id: RecordId,
    pub trip_id: RecordId,
    pub location_id: Option<RecordId>,
    /// Route taken to reach this stop.
    pub via_id: Option<RecordId>,
    /// Set on roadtrips, where stops can be outside the trip's starting area.
    pub area_id: Option<RecordId>,
    pub odo_total: Option<i64>,
    pub odo_trip: Option<i64>,
    /// Unix seconds of arrival.
    pub time_stop: Option<i64>,
    /// Unix seconds of departure.
    pub time_cont: Option<i64>,
    pub flag_sides: i32,
    pub description: Option<String>,
    pub comment: Option<String>,
}

impl TStop {
    pub fn new(trip_id: RecordId, time_stop: i64) -> Self {
        Self {
            id: NEW_RECORD_ID,
            trip_id,
            location_id: None,
            via_id: None,
            area_id: None,
            odo_total: None,
            odo_trip: None,
            time_stop: Some(time_stop),
            time_cont: None,
            flag_sides: 0,
            description: None,
            comment: None,
        }
    }

    /// Not yet continued from; a trip-end stop is never open.
    pub fn is_open(&self) -> bool {
        self.time_cont.is_none() && self.flag_sides & FLAG_TRIP_END == 0
    }

    pub fn has_gas(&self) -> bool {
        self.flag_sides & FLAG_GAS != 0
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if let (Some(stop), Some(cont)) = (self.time_stop, self.time_cont) {
            if cont < stop {
                return Err(ModelValidationError::TimeOrder {
                    record: "tstop",
                    start: stop,
                    end: cont,
                });
            }
        }
        if let Some(odo_total) = self.odo_total {
            require_non_negative("tstop", "odo_total", odo_total)?;
        }
        if let Some(odo_trip) = self.odo_trip {
            require_non_negative("tstop", "odo_trip", odo_trip)?;
        }
        Ok(())
    }
}

/// Gas purchased at one stop.
///
/// Amounts are integers in the smallest display unit (thousandths of a unit
/// of fuel, cents or tenths of a cent for prices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TStopGas {
    pub tstop_id: RecordId,
    /// Denormalized from the stop's trip, checked by the verifier.
    pub vehicle_id: RecordId,
    pub brand_grade_id: Option<RecordId>,
    pub quantity: i64,
    pub price_per: i64,
    pub price_total: i64,
    pub fillup: bool,
}

impl TStopGas {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_negative("tstop_gas", "quant", self.quantity)?;
        require_non_negative("tstop_gas", "price_per", self.price_per)?;
        require_non_negative("tstop_gas", "price_total", self.price_total)
    }
}

#[cfg(test)]
mod tests {
    use super::{TStop, TStopGas, FLAG_GAS, FLAG_TRIP_END};
    use crate::model::ModelValidationError;

    #[test]
    fn new_stop_is_open_without_gas() {
        let stop = TStop::new(3, 1_700_000_000);
        assert!(stop.is_open());
        assert!(!stop.has_gas());
    }

    #[test]
    fn gas_flag_is_reported() {
        let mut stop = TStop::new(3, 1_700_000_000);
        stop.flag_sides |= FLAG_GAS;
        assert!(stop.has_gas());
    }

    #[test]
    fn trip_end_stop_is_never_open() {
        let mut stop = TStop::new(3, 1_700_000_000);
        stop.flag_sides = FLAG_TRIP_END;
        assert!(!stop.is_open());
    }

    #[test]
    fn continue_before_stop_is_rejected() {
        let mut stop = TStop::new(3, 1_700_000_000);
        stop.time_cont = Some(1_600_000_000);
        assert!(matches!(
            stop.validate(),
            Err(ModelValidationError::TimeOrder { .. })
        ));
    }

    #[test]
    fn negative_gas_quantity_is_rejected() {
        let gas = TStopGas {
            tstop_id: 1,
            vehicle_id: 1,
            brand_grade_id: None,
            quantity: -5,
            price_per: 0,
            price_total: 0,
            fillup: false,
        };
        assert!(matches!(
            gas.validate(),
            Err(ModelValidationError::NegativeValue { field: "quant", .. })
        ));
    }
}
