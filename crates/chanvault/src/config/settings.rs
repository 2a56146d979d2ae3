//! Runtime settings read from environment variables.

use std::fmt;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::db::{database_file, default_database_dir};
use crate::error::ConfigError;
use crate::sanitize::{redact_phone, redact_secret};

/// Local name of the persisted platform session.
pub const SESSION_NAME: &str = "telegram_session";

/// Channel list read by batch runs when `CHANNELS_FILE` is unset.
pub const DEFAULT_CHANNELS_FILE: &str = "canalles.txt";

const DEFAULT_DB_NAME: &str = "telegram";

pub struct Settings {
    pub api_id: i32,
    pub api_hash: SecretString,
    pub phone_number: Option<String>,
    /// Channel synced when no other is selected.
    pub channel_name: Option<String>,
    /// Directory holding the database files.
    pub database_uri: String,
    pub db_name: String,
    pub downloads_dir: PathBuf,
    /// Base that stored media paths are relative to.
    pub storage_root: PathBuf,
    /// Root of the desktop exports read by the export source.
    pub export_dir: PathBuf,
    pub channels_file: PathBuf,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_id = get("API_ID").ok_or(ConfigError::MissingVar("API_ID"))?;
        let api_id = raw_id.parse::<i32>().map_err(|e| ConfigError::InvalidVar {
            name: "API_ID",
            reason: e.to_string(),
        })?;
        let api_hash = get("API_HASH")
            .map(SecretString::from)
            .ok_or(ConfigError::MissingVar("API_HASH"))?;

        let cwd = std::env::current_dir().map_err(ConfigError::WorkingDirectory)?;

        let database_uri = match get("DATABASE_URI") {
            Some(uri) => uri,
            None => default_database_dir()
                .unwrap_or_else(|| cwd.join("data"))
                .to_string_lossy()
                .into_owned(),
        };

        Ok(Self {
            api_id,
            api_hash,
            phone_number: get("PHONE_NUMBER"),
            channel_name: get("CHANNEL_NAME"),
            database_uri,
            db_name: get("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            downloads_dir: get("DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.join("downloads")),
            storage_root: get("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.clone()),
            export_dir: get("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.join("exports")),
            channels_file: get("CHANNELS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNELS_FILE)),
        })
    }

    /// Path of the database file.
    pub fn database_path(&self) -> PathBuf {
        database_file(&self.database_uri, &self.db_name)
    }

    /// Path of the persisted platform session, next to the database.
    pub fn session_path(&self) -> PathBuf {
        self.database_path()
            .with_file_name(format!("{}.session", SESSION_NAME))
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_id", &self.api_id)
            .field("api_hash", &redact_secret(self.api_hash.expose_secret()))
            .field(
                "phone_number",
                &self.phone_number.as_deref().map(redact_phone),
            )
            .field("channel_name", &self.channel_name)
            .field("database", &self.database_path())
            .field("downloads_dir", &self.downloads_dir)
            .field("storage_root", &self.storage_root)
            .field("export_dir", &self.export_dir)
            .field("channels_file", &self.channels_file)
            .finish()
    }
}
