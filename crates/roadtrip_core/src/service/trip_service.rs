//! Trip lifecycle use-cases.
//!
//! # Responsibility
//! - Begin, stop, continue and end trips of the current vehicle.
//! - Keep current-state settings and vehicle odometer in step with trip rows.
//!
//! # Invariants
//! - A vehicle has at most one in-progress trip started through this service.
//! - A trip has at most one open stop; it must be continued before the next
//!   stop or the trip end.
//! - Every operation commits its rows and settings in one transaction.

use crate::model::settings::SettingKey;
use crate::model::trip::Trip;
use crate::model::tstop::{TStop, TStopGas, FLAG_GAS, FLAG_TRIP_END};
use crate::model::vehicle::Vehicle;
use crate::model::RecordId;
use crate::repo::location_repo::{LocationRepository, SqliteLocationRepository};
use crate::repo::master_repo::{MasterDataRepository, SqliteMasterDataRepository};
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use crate::repo::trip_repo::{SqliteTripRepository, TripRepository};
use crate::repo::{ensure_connection_ready, RepoError};
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TripServiceResult<T> = Result<T, TripServiceError>;

#[derive(Debug)]
pub enum TripServiceError {
    NoCurrentVehicle,
    NoCurrentTrip,
    NoCurrentStop,
    /// No driver given, current, or set as the vehicle default.
    MissingDriver,
    MissingArea,
    TripAlreadyInProgress { vehicle_id: RecordId, trip_id: RecordId },
    StopAlreadyOpen(RecordId),
    OdometerBehind { current: i64, given: i64 },
    Repo(RepoError),
}

impl Display for TripServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCurrentVehicle => write!(f, "no current vehicle is set"),
            Self::NoCurrentTrip => write!(f, "no trip is in progress"),
            Self::NoCurrentStop => write!(f, "the current trip has no open stop"),
            Self::MissingDriver => write!(f, "no driver available for the trip"),
            Self::MissingArea => write!(f, "no geoarea available for the trip"),
            Self::TripAlreadyInProgress {
                vehicle_id,
                trip_id,
            } => write!(f, "vehicle {vehicle_id} already has trip {trip_id} in progress"),
            Self::StopAlreadyOpen(id) => write!(f, "stop {id} has not been continued from"),
            Self::OdometerBehind { current, given } => {
                write!(f, "odometer {given} is behind current reading {current}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TripServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TripServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for TripServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Input for starting a trip; unset fields fall back to current settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeginTrip {
    pub time_start: i64,
    pub driver_id: Option<RecordId>,
    pub area_id: Option<RecordId>,
    /// Defaults to the vehicle's current odometer.
    pub odo_start: Option<i64>,
    pub category_id: Option<RecordId>,
    pub freq_trip_id: Option<RecordId>,
    pub roadtrip_end_area_id: Option<RecordId>,
    pub passengers: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPurchase {
    pub brand_grade_id: Option<RecordId>,
    pub quantity: i64,
    pub price_per: i64,
    pub price_total: i64,
    pub fillup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopAt {
    pub time_stop: i64,
    pub odo_total: Option<i64>,
    pub location_id: Option<RecordId>,
    pub via_id: Option<RecordId>,
    pub area_id: Option<RecordId>,
    pub description: Option<String>,
    pub gas: Option<GasPurchase>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndTrip {
    pub time_end: i64,
    pub odo_end: i64,
    pub location_id: Option<RecordId>,
    pub description: Option<String>,
}

/// Trip lifecycle service over one migrated connection.
pub struct TripService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TripService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> TripServiceResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Starts a trip for the current vehicle.
    pub fn begin_trip(&self, request: &BeginTrip) -> TripServiceResult<Trip> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let trip = {
            let ctx = Context::new(&tx)?;
            let vehicle = ctx.current_vehicle()?;
            if let Some(open) = ctx.trips.in_progress_trips(vehicle.id)?.first() {
                return Err(TripServiceError::TripAlreadyInProgress {
                    vehicle_id: vehicle.id,
                    trip_id: open.id,
                });
            }

            let driver_id = match request.driver_id {
                Some(id) => id,
                None => ctx.current_driver(&vehicle)?,
            };
            let area_id = request
                .area_id
                .or(ctx.settings.get_setting(SettingKey::CurrentArea)?)
                .ok_or(TripServiceError::MissingArea)?;
            let odo_start = request.odo_start.unwrap_or(vehicle.odo_curr);
            if odo_start < vehicle.odo_curr {
                return Err(TripServiceError::OdometerBehind {
                    current: vehicle.odo_curr,
                    given: odo_start,
                });
            }

            let mut trip = Trip::new(vehicle.id, driver_id, area_id, odo_start, request.time_start);
            trip.category_id = request.category_id;
            trip.freq_trip_id = request.freq_trip_id;
            trip.roadtrip_end_area_id = request.roadtrip_end_area_id;
            trip.passengers = request.passengers;
            trip.comment = request.comment.clone();
            trip.id = ctx.trips.insert_trip(&trip)?;

            ctx.settings.set_setting(SettingKey::CurrentTrip, Some(trip.id))?;
            ctx.settings.set_setting(SettingKey::CurrentArea, Some(area_id))?;
            ctx.settings.set_setting(SettingKey::CurrentDriver, Some(driver_id))?;
            ctx.settings.set_setting(SettingKey::CurrentTStop, None)?;
            ctx.settings
                .set_setting(SettingKey::CurrentFreqTrip, request.freq_trip_id)?;
            trip
        };
        tx.commit()?;

        info!(
            "event=trip_begin module=trip status=ok trip_id={} vehicle_id={} odo_start={}",
            trip.id, trip.vehicle_id, trip.odo_start
        );
        Ok(trip)
    }

    /// Records an open stop on the current trip, with an optional gas purchase.
    pub fn stop_at(&self, request: &StopAt) -> TripServiceResult<TStop> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let tstop = {
            let ctx = Context::new(&tx)?;
            let trip = ctx.current_trip()?;
            if let Some(open) = ctx.trips.open_tstops(trip.id)?.first() {
                return Err(TripServiceError::StopAlreadyOpen(open.id));
            }
            if let Some(odo_total) = request.odo_total {
                ctx.require_odometer(&trip, odo_total)?;
            }

            let mut tstop = TStop::new(trip.id, request.time_stop);
            tstop.location_id = request.location_id;
            tstop.via_id = request.via_id;
            tstop.area_id = request.area_id;
            tstop.odo_total = request.odo_total;
            tstop.odo_trip = request.odo_total.map(|odo| odo - trip.odo_start);
            tstop.description = request.description.clone();
            if request.gas.is_some() {
                tstop.flag_sides |= FLAG_GAS;
            }
            tstop.id = ctx.trips.insert_tstop(&tstop)?;

            if let Some(gas) = request.gas {
                ctx.trips.insert_gas(&TStopGas {
                    tstop_id: tstop.id,
                    vehicle_id: trip.vehicle_id,
                    brand_grade_id: gas.brand_grade_id,
                    quantity: gas.quantity,
                    price_per: gas.price_per,
                    price_total: gas.price_total,
                    fillup: gas.fillup,
                })?;
            }
            if let Some(location_id) = tstop.location_id {
                ctx.locations.touch_location(location_id, request.time_stop)?;
            }
            if let Some(odo_total) = tstop.odo_total {
                ctx.advance_odometer(trip.vehicle_id, odo_total, None)?;
            }

            ctx.settings.set_setting(SettingKey::CurrentTStop, Some(tstop.id))?;
            tstop
        };
        tx.commit()?;

        info!(
            "event=trip_stop module=trip status=ok trip_id={} tstop_id={} gas={}",
            tstop.trip_id,
            tstop.id,
            tstop.has_gas()
        );
        Ok(tstop)
    }

    /// Leaves the current stop and resumes the trip.
    pub fn continue_from_stop(&self, time_cont: i64) -> TripServiceResult<TStop> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let tstop = {
            let ctx = Context::new(&tx)?;
            let trip = ctx.current_trip()?;
            let mut tstop = ctx
                .settings
                .get_setting(SettingKey::CurrentTStop)?
                .map(|id| ctx.trips.get_tstop(id))
                .transpose()?
                .flatten()
                .filter(|tstop| tstop.trip_id == trip.id && tstop.is_open())
                .ok_or(TripServiceError::NoCurrentStop)?;

            tstop.time_cont = Some(time_cont);
            ctx.trips.update_tstop(&tstop)?;
            ctx.settings.set_setting(SettingKey::CurrentTStop, None)?;
            if tstop.location_id.is_some() {
                ctx.settings
                    .set_setting(SettingKey::PrevLocation, tstop.location_id)?;
            }
            tstop
        };
        tx.commit()?;

        info!(
            "event=trip_continue module=trip status=ok trip_id={} tstop_id={}",
            tstop.trip_id, tstop.id
        );
        Ok(tstop)
    }

    /// Ends the current trip with a final stop at `request.location_id`.
    pub fn end_trip(&self, request: &EndTrip) -> TripServiceResult<Trip> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let trip = {
            let ctx = Context::new(&tx)?;
            let mut trip = ctx.current_trip()?;
            if let Some(open) = ctx.trips.open_tstops(trip.id)?.first() {
                return Err(TripServiceError::StopAlreadyOpen(open.id));
            }
            ctx.require_odometer(&trip, request.odo_end)?;

            trip.odo_end = Some(request.odo_end);
            trip.time_end = Some(request.time_end);
            ctx.trips.update_trip(&trip)?;

            let mut last_stop = TStop::new(trip.id, request.time_end);
            last_stop.location_id = request.location_id;
            last_stop.area_id = trip.roadtrip_end_area_id;
            last_stop.odo_total = Some(request.odo_end);
            last_stop.odo_trip = Some(request.odo_end - trip.odo_start);
            last_stop.description = request.description.clone();
            last_stop.flag_sides = FLAG_TRIP_END;
            ctx.trips.insert_tstop(&last_stop)?;

            if let Some(location_id) = request.location_id {
                ctx.locations.touch_location(location_id, request.time_end)?;
            }
            ctx.advance_odometer(trip.vehicle_id, request.odo_end, Some(trip.id))?;

            ctx.settings.set_setting(SettingKey::CurrentTrip, None)?;
            ctx.settings.set_setting(SettingKey::CurrentTStop, None)?;
            ctx.settings.set_setting(SettingKey::CurrentFreqTrip, None)?;
            if request.location_id.is_some() {
                ctx.settings
                    .set_setting(SettingKey::PrevLocation, request.location_id)?;
            }
            if let Some(end_area) = trip.roadtrip_end_area_id {
                ctx.settings.set_setting(SettingKey::CurrentArea, Some(end_area))?;
            }
            trip
        };
        tx.commit()?;

        info!(
            "event=trip_end module=trip status=ok trip_id={} vehicle_id={} distance={}",
            trip.id,
            trip.vehicle_id,
            request.odo_end - trip.odo_start
        );
        Ok(trip)
    }
}

/// Repositories bound to one open transaction.
struct Context<'a> {
    master: SqliteMasterDataRepository<'a>,
    trips: SqliteTripRepository<'a>,
    locations: SqliteLocationRepository<'a>,
    settings: SqliteSettingsRepository<'a>,
}

impl<'a> Context<'a> {
    fn new(conn: &'a Connection) -> TripServiceResult<Self> {
        Ok(Self {
            master: SqliteMasterDataRepository::try_new(conn)?,
            trips: SqliteTripRepository::try_new(conn)?,
            locations: SqliteLocationRepository::try_new(conn)?,
            settings: SqliteSettingsRepository::try_new(conn)?,
        })
    }

    fn current_vehicle(&self) -> TripServiceResult<Vehicle> {
        match self.settings.get_setting(SettingKey::CurrentVehicle)? {
            Some(id) => self
                .master
                .get_vehicle(id)?
                .ok_or(TripServiceError::NoCurrentVehicle),
            None => Err(TripServiceError::NoCurrentVehicle),
        }
    }

    /// Current driver when valid, else the vehicle's default driver.
    fn current_driver(&self, vehicle: &Vehicle) -> TripServiceResult<RecordId> {
        let candidates = self
            .settings
            .get_setting(SettingKey::CurrentDriver)?
            .into_iter()
            .chain([vehicle.driver_id]);
        for id in candidates {
            if matches!(self.master.get_person(id)?, Some(person) if person.is_driver) {
                return Ok(id);
            }
        }
        Err(TripServiceError::MissingDriver)
    }

    fn current_trip(&self) -> TripServiceResult<Trip> {
        let vehicle = self.current_vehicle()?;
        match self.settings.get_setting(SettingKey::CurrentTrip)? {
            Some(id) => self
                .trips
                .get_trip(id)?
                .filter(|trip| trip.vehicle_id == vehicle.id && trip.is_in_progress())
                .ok_or(TripServiceError::NoCurrentTrip),
            None => Err(TripServiceError::NoCurrentTrip),
        }
    }

    /// Rejects a reading below the trip start or the vehicle's `odo_curr`.
    fn require_odometer(&self, trip: &Trip, odometer: i64) -> TripServiceResult<()> {
        let odo_curr = self
            .master
            .get_vehicle(trip.vehicle_id)?
            .map_or(trip.odo_start, |vehicle| vehicle.odo_curr);
        let current = odo_curr.max(trip.odo_start);
        if odometer < current {
            return Err(TripServiceError::OdometerBehind {
                current,
                given: odometer,
            });
        }
        Ok(())
    }

    /// Moves `odo_curr` forward (never back) and optionally records the trip.
    fn advance_odometer(
        &self,
        vehicle_id: RecordId,
        odometer: i64,
        finished_trip: Option<RecordId>,
    ) -> TripServiceResult<()> {
        let mut vehicle = self
            .master
            .get_vehicle(vehicle_id)?
            .ok_or(RepoError::NotFound {
                table: "vehicle",
                id: vehicle_id,
            })?;
        let before = (vehicle.odo_curr, vehicle.last_trip_id);
        vehicle.odo_curr = vehicle.odo_curr.max(odometer);
        if finished_trip.is_some() {
            vehicle.last_trip_id = finished_trip;
        }
        if (vehicle.odo_curr, vehicle.last_trip_id) != before {
            self.master.update_vehicle(&vehicle)?;
        }
        Ok(())
    }
}
