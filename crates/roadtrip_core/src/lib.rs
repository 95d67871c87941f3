//! Core trip logbook: schema, records, repositories, settings recovery and
//! referential verification over a single SQLite database.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod verify;

pub use db::{open_db, open_db_in_memory, open_db_read_only, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::settings::{SettingKey, VehSettings};
pub use model::{ModelValidationError, RecordId};
pub use repo::{RepoError, RepoResult};
pub use service::settings_service::{
    Recovery, RecoveredSetting, SettingsCheck, SettingsError, SettingsLevel, SettingsService,
    VehicleChange,
};
pub use service::trip_service::{
    BeginTrip, EndTrip, GasPurchase, StopAt, TripService, TripServiceError,
};
pub use verify::{RdbVerifier, VerifyIssue, VerifyLevel, VerifyReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Schema version this build migrates databases to.
pub fn schema_version() -> u32 {
    db::migrations::latest_version()
}
