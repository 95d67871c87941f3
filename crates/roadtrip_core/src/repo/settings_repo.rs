//! Global settings and per-vehicle settings persistence.
//!
//! # Responsibility
//! - Read and write current-state pointers in `settings`.
//! - Save and load `VehSettings` snapshots as `veh_settings` key/value rows.
//!
//! # Invariants
//! - Clearing a pointer deletes its row; NULL and absent are equivalent.
//! - A saved snapshot fully replaces the vehicle's previous rows.
//! - `CURRENT_VEHICLE` is never stored per vehicle.

use crate::model::settings::{SettingKey, VehSettings};
use crate::model::RecordId;
use crate::repo::{ensure_connection_ready, require_reference, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

pub trait SettingsRepository {
    fn get_setting(&self, key: SettingKey) -> RepoResult<Option<RecordId>>;
    /// Stores a pointer; `None` clears it.
    fn set_setting(&self, key: SettingKey, value: Option<RecordId>) -> RepoResult<()>;
    /// Reads the active vehicle-scoped pointers as a snapshot of `vehicle_id`.
    fn load_active(&self, vehicle_id: RecordId) -> RepoResult<VehSettings>;
    /// Writes every vehicle-scoped pointer of `settings` as the active state.
    fn store_active(&self, settings: &VehSettings) -> RepoResult<()>;

    fn load_veh_settings(&self, vehicle_id: RecordId) -> RepoResult<VehSettings>;
    fn save_veh_settings(&self, settings: &VehSettings) -> RepoResult<()>;
    fn clear_veh_settings(&self, vehicle_id: RecordId) -> RepoResult<()>;
}

pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get_setting(&self, key: SettingKey) -> RepoResult<Option<RecordId>> {
        let value = self
            .conn
            .query_row(
                "SELECT ivalue FROM settings WHERE sname = ?1;",
                [key.as_db_name()],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn set_setting(&self, key: SettingKey, value: Option<RecordId>) -> RepoResult<()> {
        match value {
            Some(value) => {
                self.conn.execute(
                    "INSERT INTO settings (sname, ivalue) VALUES (?1, ?2)
                     ON CONFLICT(sname) DO UPDATE SET ivalue = excluded.ivalue;",
                    params![key.as_db_name(), value],
                )?;
            }
            None => {
                self.conn.execute(
                    "DELETE FROM settings WHERE sname = ?1;",
                    [key.as_db_name()],
                )?;
            }
        }
        Ok(())
    }

    fn load_active(&self, vehicle_id: RecordId) -> RepoResult<VehSettings> {
        let mut settings = VehSettings::empty(vehicle_id);
        for key in SettingKey::VEHICLE_SCOPED {
            settings.set(key, self.get_setting(key)?);
        }
        Ok(settings)
    }

    fn store_active(&self, settings: &VehSettings) -> RepoResult<()> {
        for key in SettingKey::VEHICLE_SCOPED {
            self.set_setting(key, settings.get(key))?;
        }
        Ok(())
    }

    fn load_veh_settings(&self, vehicle_id: RecordId) -> RepoResult<VehSettings> {
        let mut stmt = self.conn.prepare(
            "SELECT sname, ivalue FROM veh_settings WHERE vid = ?1 ORDER BY sname ASC;",
        )?;
        let mut rows = stmt.query([vehicle_id])?;
        let mut settings = VehSettings::empty(vehicle_id);
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let key = SettingKey::from_db_name(&name)
                .filter(|key| key.is_vehicle_scoped())
                .ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid setting name `{name}` in veh_settings.sname for vehicle {vehicle_id}"
                    ))
                })?;
            settings.set(key, row.get::<_, Option<i64>>(1)?);
        }
        Ok(settings)
    }

    fn save_veh_settings(&self, settings: &VehSettings) -> RepoResult<()> {
        require_reference(self.conn, "vehicle", "veh_settings.vid", settings.vehicle_id)?;
        self.clear_veh_settings(settings.vehicle_id)?;
        let mut stmt = self
            .conn
            .prepare("INSERT INTO veh_settings (vid, sname, ivalue) VALUES (?1, ?2, ?3);")?;
        for key in SettingKey::VEHICLE_SCOPED {
            if let Some(value) = settings.get(key) {
                stmt.execute(params![settings.vehicle_id, key.as_db_name(), value])?;
            }
        }
        Ok(())
    }

    fn clear_veh_settings(&self, vehicle_id: RecordId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM veh_settings WHERE vid = ?1;", [vehicle_id])?;
        Ok(())
    }
}
