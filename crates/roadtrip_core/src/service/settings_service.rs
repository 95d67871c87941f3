//! Current-state settings consistency, recovery, and vehicle switching.
//!
//! # Responsibility
//! - Locate each current-state pointer up to a requested `SettingsLevel`.
//! - Recover missing or stale pointers from related tables, flagging every
//!   recovery as unambiguous or guessed.
//! - Switch the current vehicle, saving and restoring per-vehicle settings.
//!
//! # Invariants
//! - Levels are checked in increasing order; checking stops at the first
//!   level that cannot be resolved, which is reported as missing.
//! - Every value written by recovery appears in `SettingsCheck::recovered`.
//! - Persisted changes are applied in one immediate transaction.

use crate::model::settings::{SettingKey, VehSettings};
use crate::model::trip::TripLink;
use crate::model::vehicle::Vehicle;
use crate::model::RecordId;
use crate::repo::master_repo::{MasterDataRepository, SqliteMasterDataRepository};
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use crate::repo::trip_repo::{SqliteTripRepository, TripRepository};
use crate::repo::{ensure_connection_ready, row_exists, RepoError, RepoResult};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How much current state a caller needs, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsLevel {
    #[serde(rename = "geoarea")]
    GeoArea = 1,
    Driver = 2,
    Vehicle = 3,
    Trip = 4,
    /// A current stop is validated if present but not required.
    #[serde(rename = "tstop_optional")]
    TStopOptional = 5,
    #[serde(rename = "tstop_required")]
    TStopRequired = 6,
}

impl SettingsLevel {
    pub const ALL: [SettingsLevel; 6] = [
        SettingsLevel::GeoArea,
        SettingsLevel::Driver,
        SettingsLevel::Vehicle,
        SettingsLevel::Trip,
        SettingsLevel::TStopOptional,
        SettingsLevel::TStopRequired,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Setting key resolved at this level.
    pub fn key(self) -> SettingKey {
        match self {
            Self::GeoArea => SettingKey::CurrentArea,
            Self::Driver => SettingKey::CurrentDriver,
            Self::Vehicle => SettingKey::CurrentVehicle,
            Self::Trip => SettingKey::CurrentTrip,
            Self::TStopOptional | Self::TStopRequired => SettingKey::CurrentTStop,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeoArea => "geoarea",
            Self::Driver => "driver",
            Self::Vehicle => "vehicle",
            Self::Trip => "trip",
            Self::TStopOptional => "tstop_optional",
            Self::TStopRequired => "tstop_required",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

/// Confidence of one recovered setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Only one candidate existed, or a related record named it directly.
    Unambiguous,
    /// Several candidates existed and a heuristic picked one.
    Guessed,
}

/// One pointer filled in by recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveredSetting {
    pub key: SettingKey,
    pub value: RecordId,
    pub recovery: Recovery,
    /// Short tag naming where the value came from, e.g. `latest_trip`.
    pub source: &'static str,
}

/// Outcome of one settings check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsCheck {
    pub requested: SettingsLevel,
    /// Lowest level that could not be resolved.
    pub missing: Option<SettingsLevel>,
    pub recovered: Vec<RecoveredSetting>,
    /// Stale pointers removed without a replacement.
    pub cleared: Vec<SettingKey>,
    /// Whether recovered and cleared values were written back.
    pub persisted: bool,
}

impl SettingsCheck {
    pub fn is_ok(&self) -> bool {
        self.missing.is_none()
    }

    pub fn any_guessed(&self) -> bool {
        self.recovered
            .iter()
            .any(|item| item.recovery == Recovery::Guessed)
    }

    /// `0` when every requested level resolved, else the missing level's code.
    pub fn failure_code(&self) -> u8 {
        self.missing.map_or(0, SettingsLevel::code)
    }
}

/// Result of switching the current vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleChange {
    pub previous_vehicle_id: Option<RecordId>,
    /// Active pointers after the switch.
    pub settings: VehSettings,
    /// Keys filled in from related tables instead of saved VehSettings.
    pub derived: Vec<SettingKey>,
    /// Saved VehSettings keys discarded because they no longer resolve.
    pub dropped: Vec<SettingKey>,
}

#[derive(Debug)]
pub enum SettingsError {
    VehicleNotFound(RecordId),
    Repo(RepoError),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VehicleNotFound(id) => write!(f, "vehicle not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::VehicleNotFound(_) => None,
        }
    }
}

impl From<RepoError> for SettingsError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for SettingsError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Settings use-case service over one migrated connection.
pub struct SettingsService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SettingsService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> Result<Self, SettingsError> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Checks settings up to `level` and writes recovered values back.
    pub fn check_settings(&self, level: SettingsLevel) -> Result<SettingsCheck, SettingsError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = {
            let check = SettingsChecker::load(&tx)?.run(level)?;
            check.write_back(&tx)?;
            check.outcome(true)
        };
        tx.commit()?;
        log_check(&outcome);
        Ok(outcome)
    }

    /// Same as `check_settings` but leaves the database untouched.
    pub fn inspect_settings(&self, level: SettingsLevel) -> Result<SettingsCheck, SettingsError> {
        let check = SettingsChecker::load(self.conn)?.run(level)?;
        let outcome = check.outcome(false);
        log_check(&outcome);
        Ok(outcome)
    }

    /// Makes `vehicle_id` the current vehicle.
    ///
    /// The outgoing vehicle's active pointers are saved as its VehSettings;
    /// the incoming vehicle's saved pointers are validated, and missing ones
    /// are derived from its trips and default driver.
    pub fn change_current_vehicle(
        &self,
        vehicle_id: RecordId,
    ) -> Result<VehicleChange, SettingsError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let master = SqliteMasterDataRepository::try_new(&tx)?;
        let trips = SqliteTripRepository::try_new(&tx)?;
        let settings = SqliteSettingsRepository::try_new(&tx)?;

        let vehicle = master
            .get_vehicle(vehicle_id)?
            .ok_or(SettingsError::VehicleNotFound(vehicle_id))?;
        let previous_vehicle_id = settings.get_setting(SettingKey::CurrentVehicle)?;

        if previous_vehicle_id == Some(vehicle_id) {
            let active = settings.load_active(vehicle_id)?;
            tx.commit()?;
            return Ok(VehicleChange {
                previous_vehicle_id,
                settings: active,
                derived: Vec::new(),
                dropped: Vec::new(),
            });
        }

        let current_area = settings.get_setting(SettingKey::CurrentArea)?;
        if let Some(previous_id) = previous_vehicle_id {
            if master.get_vehicle(previous_id)?.is_some() {
                let outgoing = settings.load_active(previous_id)?;
                settings.save_veh_settings(&outgoing)?;
            }
        }

        let saved = settings.load_veh_settings(vehicle_id)?;
        let (mut next, dropped) = validate_saved(&tx, &master, &trips, &saved)?;
        let derived = derive_missing(&tx, &master, &trips, &vehicle, current_area, &mut next)?;

        settings.store_active(&next)?;
        settings.set_setting(SettingKey::CurrentVehicle, Some(vehicle_id))?;
        tx.commit()?;

        info!(
            "event=vehicle_change module=settings status=ok from_vehicle={} to_vehicle={} derived={} dropped={}",
            previous_vehicle_id.map_or_else(|| "none".to_string(), |id| id.to_string()),
            vehicle_id,
            derived.len(),
            dropped.len()
        );
        Ok(VehicleChange {
            previous_vehicle_id,
            settings: next,
            derived,
            dropped,
        })
    }
}

fn log_check(check: &SettingsCheck) {
    for item in check
        .recovered
        .iter()
        .filter(|item| item.recovery == Recovery::Guessed)
    {
        warn!(
            "event=settings_recover module=settings status=guessed key={} value={} source={}",
            item.key, item.value, item.source
        );
    }
    info!(
        "event=settings_check module=settings status={} level={} missing={} recovered={} cleared={} persisted={}",
        if check.is_ok() { "ok" } else { "missing" },
        check.requested.as_str(),
        check.missing.map_or("none", SettingsLevel::as_str),
        check.recovered.len(),
        check.cleared.len(),
        check.persisted
    );
}

/// Working copy of the global settings while one check runs.
struct SettingsChecker<'a> {
    master: SqliteMasterDataRepository<'a>,
    trips: SqliteTripRepository<'a>,
    settings: SqliteSettingsRepository<'a>,
    original: BTreeMap<SettingKey, Option<RecordId>>,
    state: BTreeMap<SettingKey, Option<RecordId>>,
    requested: Option<SettingsLevel>,
    missing: Option<SettingsLevel>,
    recovered: Vec<RecoveredSetting>,
    cleared: Vec<SettingKey>,
}

impl<'a> SettingsChecker<'a> {
    fn load(conn: &'a Connection) -> RepoResult<Self> {
        let settings = SqliteSettingsRepository::try_new(conn)?;
        let mut state = BTreeMap::new();
        for key in [SettingKey::CurrentVehicle]
            .into_iter()
            .chain(SettingKey::VEHICLE_SCOPED)
        {
            state.insert(key, settings.get_setting(key)?);
        }
        Ok(Self {
            master: SqliteMasterDataRepository::try_new(conn)?,
            trips: SqliteTripRepository::try_new(conn)?,
            settings,
            original: state.clone(),
            state,
            requested: None,
            missing: None,
            recovered: Vec::new(),
            cleared: Vec::new(),
        })
    }

    fn run(mut self, level: SettingsLevel) -> RepoResult<Self> {
        self.requested = Some(level);
        for step in SettingsLevel::ALL.into_iter().filter(|step| *step <= level) {
            let resolved = match step {
                SettingsLevel::GeoArea => self.check_area()?,
                SettingsLevel::Driver => self.check_driver()?,
                SettingsLevel::Vehicle => self.check_vehicle()?,
                SettingsLevel::Trip => self.check_trip()?,
                SettingsLevel::TStopOptional => self.check_tstop(false)?,
                SettingsLevel::TStopRequired => self.check_tstop(true)?,
            };
            if !resolved {
                self.missing = Some(step);
                break;
            }
        }
        Ok(self)
    }

    fn outcome(&self, persisted: bool) -> SettingsCheck {
        SettingsCheck {
            requested: self.requested.unwrap_or(SettingsLevel::GeoArea),
            missing: self.missing,
            recovered: self.recovered.clone(),
            cleared: self.cleared.clone(),
            persisted,
        }
    }

    fn write_back(&self, conn: &Connection) -> RepoResult<()> {
        let settings = SqliteSettingsRepository::try_new(conn)?;
        for (key, value) in &self.state {
            if self.original.get(key) != Some(value) {
                settings.set_setting(*key, *value)?;
            }
        }
        Ok(())
    }

    fn value(&self, key: SettingKey) -> Option<RecordId> {
        self.state.get(&key).copied().flatten()
    }

    fn clear(&mut self, key: SettingKey) {
        if self.value(key).is_some() {
            self.state.insert(key, None);
            if !self.cleared.contains(&key) {
                self.cleared.push(key);
            }
        }
    }

    fn recover(
        &mut self,
        key: SettingKey,
        value: RecordId,
        recovery: Recovery,
        source: &'static str,
    ) -> bool {
        self.state.insert(key, Some(value));
        self.cleared.retain(|cleared| *cleared != key);
        self.recovered.push(RecoveredSetting {
            key,
            value,
            recovery,
            source,
        });
        true
    }

    fn current_vehicle(&self) -> RepoResult<Option<Vehicle>> {
        match self.value(SettingKey::CurrentVehicle) {
            Some(id) => self.master.get_vehicle(id),
            None => Ok(None),
        }
    }

    fn check_area(&mut self) -> RepoResult<bool> {
        let key = SettingKey::CurrentArea;
        if let Some(id) = self.value(key) {
            if self.master.get_geo_area(id)?.is_some() {
                return Ok(true);
            }
            self.clear(key);
        }

        if let Some(vehicle) = self.current_vehicle()? {
            if let Some(area_id) = self.settings.load_veh_settings(vehicle.id)?.area_id {
                if self.master.get_geo_area(area_id)?.is_some() {
                    return Ok(self.recover(key, area_id, Recovery::Unambiguous, "vehicle_saved_area"));
                }
            }
        }

        let areas = self.master.list_geo_areas()?;
        match areas.as_slice() {
            [] => Ok(false),
            [only] => Ok(self.recover(key, only.id, Recovery::Unambiguous, "only_geoarea")),
            [lowest, ..] => {
                let latest_area = self.trips.latest_trip_link(None)?.map(|trip| trip.area_id);
                match latest_area.filter(|id| areas.iter().any(|area| area.id == *id)) {
                    Some(id) => Ok(self.recover(key, id, Recovery::Guessed, "latest_trip")),
                    None => Ok(self.recover(key, lowest.id, Recovery::Guessed, "lowest_id")),
                }
            }
        }
    }

    fn check_driver(&mut self) -> RepoResult<bool> {
        let key = SettingKey::CurrentDriver;
        if let Some(id) = self.value(key) {
            if matches!(self.master.get_person(id)?, Some(person) if person.is_driver) {
                return Ok(true);
            }
            self.clear(key);
        }

        let drivers = self.master.list_people(true)?;
        let is_driver = |id: RecordId| drivers.iter().any(|person| person.id == id);
        if drivers.is_empty() {
            return Ok(false);
        }
        if drivers.len() == 1 {
            return Ok(self.recover(key, drivers[0].id, Recovery::Unambiguous, "only_driver"));
        }

        if let Some(vehicle) = self.current_vehicle()? {
            let saved = self.settings.load_veh_settings(vehicle.id)?.driver_id;
            if let Some(id) = saved.filter(|id| is_driver(*id)) {
                return Ok(self.recover(key, id, Recovery::Unambiguous, "vehicle_saved_driver"));
            }
            if is_driver(vehicle.driver_id) {
                return Ok(self.recover(
                    key,
                    vehicle.driver_id,
                    Recovery::Unambiguous,
                    "vehicle_default_driver",
                ));
            }
        }

        let latest_driver = self.trips.latest_trip_link(None)?.map(|trip| trip.driver_id);
        match latest_driver.filter(|id| is_driver(*id)) {
            Some(id) => Ok(self.recover(key, id, Recovery::Guessed, "latest_trip")),
            None => Ok(self.recover(key, drivers[0].id, Recovery::Guessed, "lowest_id")),
        }
    }

    fn check_vehicle(&mut self) -> RepoResult<bool> {
        let key = SettingKey::CurrentVehicle;
        if self.current_vehicle()?.is_some() {
            return Ok(true);
        }
        self.clear(key);

        let vehicles = self.master.list_vehicles(false)?;
        let active: Vec<&Vehicle> = vehicles.iter().filter(|vehicle| vehicle.is_active).collect();
        match (vehicles.as_slice(), active.as_slice()) {
            ([], _) => Ok(false),
            ([only], _) => Ok(self.recover(key, only.id, Recovery::Unambiguous, "only_vehicle")),
            (_, [only_active]) => Ok(self.recover(
                key,
                only_active.id,
                Recovery::Unambiguous,
                "only_active_vehicle",
            )),
            ([lowest, ..], _) => {
                let latest_vehicle = self
                    .trips
                    .latest_trip_link(None)?
                    .map(|trip| trip.vehicle_id);
                if let Some(id) =
                    latest_vehicle.filter(|id| vehicles.iter().any(|vehicle| vehicle.id == *id))
                {
                    return Ok(self.recover(key, id, Recovery::Guessed, "latest_trip"));
                }
                let fallback = active.first().map_or(lowest.id, |vehicle| vehicle.id);
                Ok(self.recover(key, fallback, Recovery::Guessed, "lowest_id"))
            }
        }
    }

    fn check_trip(&mut self) -> RepoResult<bool> {
        let key = SettingKey::CurrentTrip;
        let Some(vehicle_id) = self.value(SettingKey::CurrentVehicle) else {
            return Ok(false);
        };

        if let Some(id) = self.value(key) {
            let current = self
                .trips
                .get_trip_link(id)?
                .filter(|trip| trip.vehicle_id == vehicle_id && trip.in_progress);
            if let Some(trip) = current {
                self.drop_foreign_tstop(Some(&trip))?;
                return Ok(true);
            }
            self.clear(key);
        }

        let in_progress = self.trips.in_progress_trip_links(vehicle_id)?;
        let resolved = match in_progress.as_slice() {
            [] => false,
            [only] => self.recover(key, only.id, Recovery::Unambiguous, "only_in_progress_trip"),
            [latest, ..] => self.recover(key, latest.id, Recovery::Guessed, "latest_in_progress_trip"),
        };
        self.drop_foreign_tstop(in_progress.first().filter(|_| resolved))?;
        Ok(resolved)
    }

    /// Clears `CURRENT_TSTOP` when it does not belong to the (new) current trip.
    fn drop_foreign_tstop(&mut self, trip: Option<&TripLink>) -> RepoResult<()> {
        let Some(tstop_id) = self.value(SettingKey::CurrentTStop) else {
            return Ok(());
        };
        let belongs = match trip {
            Some(trip) => self
                .trips
                .get_tstop(tstop_id)?
                .is_some_and(|tstop| tstop.trip_id == trip.id),
            None => false,
        };
        if !belongs {
            self.clear(SettingKey::CurrentTStop);
        }
        Ok(())
    }

    fn check_tstop(&mut self, required: bool) -> RepoResult<bool> {
        let key = SettingKey::CurrentTStop;
        let Some(trip_id) = self.value(SettingKey::CurrentTrip) else {
            return Ok(!required);
        };

        if let Some(id) = self.value(key) {
            let valid = self
                .trips
                .get_tstop(id)?
                .is_some_and(|tstop| tstop.trip_id == trip_id && tstop.is_open());
            if valid {
                return Ok(true);
            }
            self.clear(key);
        }

        let open = self.trips.open_tstops(trip_id)?;
        match open.as_slice() {
            [] => Ok(!required),
            [only] => Ok(self.recover(key, only.id, Recovery::Unambiguous, "only_open_tstop")),
            [latest, ..] => Ok(self.recover(key, latest.id, Recovery::Guessed, "latest_open_tstop")),
        }
    }
}

/// Keeps the saved pointers that still resolve for the incoming vehicle.
fn validate_saved(
    conn: &Connection,
    master: &SqliteMasterDataRepository<'_>,
    trips: &SqliteTripRepository<'_>,
    saved: &VehSettings,
) -> RepoResult<(VehSettings, Vec<SettingKey>)> {
    let mut next = VehSettings::empty(saved.vehicle_id);
    let mut dropped = Vec::new();

    for key in SettingKey::VEHICLE_SCOPED {
        let Some(id) = saved.get(key) else {
            continue;
        };
        let valid = match key {
            SettingKey::CurrentVehicle => false,
            SettingKey::CurrentArea => master.get_geo_area(id)?.is_some(),
            SettingKey::CurrentDriver => {
                matches!(master.get_person(id)?, Some(person) if person.is_driver)
            }
            SettingKey::CurrentTrip => trips
                .get_trip_link(id)?
                .is_some_and(|trip| trip.vehicle_id == saved.vehicle_id && trip.in_progress),
            SettingKey::CurrentTStop => match next.trip_id {
                Some(trip_id) => trips
                    .get_tstop(id)?
                    .is_some_and(|tstop| tstop.trip_id == trip_id && tstop.is_open()),
                None => false,
            },
            SettingKey::PrevLocation => row_exists(conn, "location", id)?,
            SettingKey::CurrentFreqTrip => row_exists(conn, "freqtrip", id)?,
        };
        if valid {
            next.set(key, Some(id));
        } else {
            dropped.push(key);
        }
    }

    Ok((next, dropped))
}

/// Fills trip, stop, driver and area pointers the saved settings lacked.
fn derive_missing(
    conn: &Connection,
    master: &SqliteMasterDataRepository<'_>,
    trips: &SqliteTripRepository<'_>,
    vehicle: &Vehicle,
    current_area: Option<RecordId>,
    next: &mut VehSettings,
) -> RepoResult<Vec<SettingKey>> {
    let mut derived = Vec::new();

    if next.trip_id.is_none() {
        if let Some(trip) = trips.in_progress_trip_links(vehicle.id)?.into_iter().next() {
            next.trip_id = Some(trip.id);
            derived.push(SettingKey::CurrentTrip);
        }
    }
    let trip = match next.trip_id {
        Some(trip_id) => trips.get_trip_link(trip_id)?,
        None => None,
    };

    if let (Some(trip), None) = (trip.as_ref(), next.tstop_id) {
        if let Some(tstop) = trips.open_tstops(trip.id)?.into_iter().next() {
            next.tstop_id = Some(tstop.id);
            derived.push(SettingKey::CurrentTStop);
        }
    }

    if next.driver_id.is_none() {
        let candidates = trip
            .as_ref()
            .map(|trip| trip.driver_id)
            .into_iter()
            .chain([vehicle.driver_id]);
        for candidate in candidates {
            if matches!(master.get_person(candidate)?, Some(person) if person.is_driver) {
                next.driver_id = Some(candidate);
                derived.push(SettingKey::CurrentDriver);
                break;
            }
        }
    }

    if next.area_id.is_none() {
        let mut candidates = Vec::new();
        match trip.as_ref() {
            Some(trip) => candidates.push(trip.area_id),
            None => {
                if let Some(latest) = trips.latest_trip_link(Some(vehicle.id))? {
                    candidates.extend(latest.roadtrip_end_area_id);
                    candidates.push(latest.area_id);
                }
            }
        }
        candidates.extend(current_area);
        for area_id in candidates {
            if row_exists(conn, "geoarea", area_id)? {
                next.area_id = Some(area_id);
                derived.push(SettingKey::CurrentArea);
                break;
            }
        }
    }

    Ok(derived)
}
