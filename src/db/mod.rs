use crate::errors::{AppError, AppResult};
use crate::models::AppSettings;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Bumped whenever a persisted namespace changes shape incompatibly.
pub const STATE_VERSION: i64 = 1;

pub const CAMPAIGN_KEY: &str = "command-center:campaign";
pub const CRM_KEY: &str = "command-center:crm";
pub const ONBOARDING_KEY: &str = "command-center:onboarding";

/// Result of reading one persisted namespace.
#[derive(Debug)]
pub enum StoredState<T> {
    Missing,
    Loaded(T),
    /// Present but unreadable: bad JSON, wrong shape, or an old version.
    Invalid(String),
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connection(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    pub fn load_state<T: DeserializeOwned>(&self, key: &str) -> AppResult<StoredState<T>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT version, value_json FROM kv_state WHERE key = ?1",
                [key],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((version, raw)) = row else {
            return Ok(StoredState::Missing);
        };
        if version != STATE_VERSION {
            return Ok(StoredState::Invalid(format!(
                "stored version {} does not match {}",
                version, STATE_VERSION
            )));
        }
        Ok(match serde_json::from_str::<T>(&raw) {
            Ok(value) => StoredState::Loaded(value),
            Err(error) => StoredState::Invalid(error.to_string()),
        })
    }

    pub fn save_state<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let raw = serde_json::to_string(value)?;
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO kv_state (key, version, value_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
               version = excluded.version,
               value_json = excluded.value_json,
               updated_at = excluded.updated_at",
            params![key, STATE_VERSION, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn write_raw_state(&self, key: &str, version: i64, raw: &str) -> AppResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_state (key, version, value_json, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![key, version, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> AppResult<()> {
        self.connection()?.execute_batch(sql)?;
        Ok(())
    }

    /// Reads the app settings row. An unreadable row is reported and replaced
    /// by defaults rather than failing startup.
    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.connection()?;
        let raw = conn
            .query_row("SELECT value_json FROM settings WHERE key = 'app'", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        let settings = match raw.map(|raw| serde_json::from_str::<AppSettings>(&raw)) {
            Some(Ok(settings)) => settings,
            Some(Err(error)) => {
                tracing::warn!(error = %error, "stored settings unreadable, using defaults");
                AppSettings::default()
            }
            None => AppSettings::default(),
        };
        Ok(settings.normalized())
    }

    /// Merges a partial JSON update into the stored settings, clamps every
    /// field and writes the result back.
    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let mut merged = serde_json::to_value(self.get_settings()?)?;
        merge_json(&mut merged, update);
        let settings = serde_json::from_value::<AppSettings>(merged)
            .map_err(|error| AppError::Invalid(format!("settings update rejected: {}", error)))?
            .normalized();
        self.write_settings(&settings, true)?;
        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        self.write_settings(&AppSettings::default(), false)
    }

    fn write_settings(&self, settings: &AppSettings, replace: bool) -> AppResult<()> {
        let sql = if replace {
            "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at"
        } else {
            "INSERT OR IGNORE INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)"
        };
        let raw = serde_json::to_string(settings)?;
        self.connection()?
            .execute(sql, params![raw, Utc::now().to_rfc3339()])?;
        Ok(())
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
