//! Command-line maintenance tool for a RoadTrip logbook database.
//!
//! Every command prints one JSON document on stdout. `verify` and
//! `check-settings` exit with the failed level's code (0 when clean);
//! operational errors exit with `EXIT_ERROR`.

use clap::{Parser, Subcommand};
use log::error;
use roadtrip_core::{
    core_version, default_log_level, init_logging, open_db, open_db_read_only, schema_version,
    RdbVerifier, SettingsLevel, SettingsService, VerifyLevel,
};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;

const EXIT_ERROR: i32 = 100;

#[derive(Parser)]
#[command(name = "roadtrip")]
#[command(about = "Inspect and repair a RoadTrip logbook database", long_about = None)]
struct Cli {
    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check integrity and reference closure without modifying the file
    Verify {
        #[arg(long)]
        db: PathBuf,
        /// physical|master|transactional
        #[arg(long, default_value = "transactional", value_parser = parse_verify_level)]
        level: VerifyLevel,
    },
    /// Check current-state settings and recover missing pointers
    CheckSettings {
        #[arg(long)]
        db: PathBuf,
        /// geoarea|driver|vehicle|trip|tstop_optional|tstop_required
        #[arg(long, default_value = "vehicle", value_parser = parse_settings_level)]
        level: SettingsLevel,
        /// Report what would be recovered without writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Switch the current vehicle, saving and restoring per-vehicle settings
    ChangeVehicle {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        vehicle: i64,
    },
    /// Print core and schema versions
    Version,
}

fn parse_verify_level(value: &str) -> Result<VerifyLevel, String> {
    VerifyLevel::parse(value).ok_or_else(|| format!("unknown verify level `{value}`"))
}

fn parse_settings_level(value: &str) -> Result<SettingsLevel, String> {
    SettingsLevel::parse(value).ok_or_else(|| format!("unknown settings level `{value}`"))
}

#[derive(Serialize)]
struct VersionInfo {
    core_version: &'static str,
    schema_version: u32,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("event=cli_failed module=cli status=error error={err}");
            eprintln!("error: {err}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32, Box<dyn Error>> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir)?;
    }

    match cli.command {
        Commands::Verify { db, level } => {
            let conn = open_db_read_only(&db)?;
            let report = RdbVerifier::new(&conn).verify(level)?;
            print_json(&report)?;
            Ok(i32::from(report.failure_code()))
        }
        Commands::CheckSettings { db, level, dry_run } => {
            let conn = open_db(&db)?;
            let service = SettingsService::try_new(&conn)?;
            let check = if dry_run {
                service.inspect_settings(level)?
            } else {
                service.check_settings(level)?
            };
            print_json(&check)?;
            Ok(i32::from(check.failure_code()))
        }
        Commands::ChangeVehicle { db, vehicle } => {
            let conn = open_db(&db)?;
            let change = SettingsService::try_new(&conn)?.change_current_vehicle(vehicle)?;
            print_json(&change)?;
            Ok(0)
        }
        Commands::Version => {
            print_json(&VersionInfo {
                core_version: core_version(),
                schema_version: schema_version(),
            })?;
            Ok(0)
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
