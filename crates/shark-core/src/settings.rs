//! Engine settings, their environment overrides and validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Database file name (without extension) used when none is configured.
pub const DEFAULT_DATABASE_NAME: &str = "database";

/// Extension appended to database names.
pub const DATABASE_EXTENSION: &str = "db";

pub const ENV_DATABASE_LOCATION: &str = "SHARK_DATABASE_LOCATION";
pub const ENV_DATABASE_NAME: &str = "SHARK_DATABASE_NAME";
pub const ENV_JOURNAL_MODE: &str = "SHARK_JOURNAL_MODE";
pub const ENV_EPOCH_DATES: &str = "SHARK_EPOCH_DATES";

/// `SQLite` journaling mode applied when a database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Truncate,
    Memory,
    Off,
}

impl JournalMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Memory => "MEMORY",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JournalMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WAL" => Ok(Self::Wal),
            "DELETE" => Ok(Self::Delete),
            "TRUNCATE" => Ok(Self::Truncate),
            "MEMORY" => Ok(Self::Memory),
            "OFF" => Ok(Self::Off),
            _ => Err(SettingsError::InvalidJournalMode(s.to_string())),
        }
    }
}

/// Engine settings.
///
/// All fields have defaults so partial configuration files deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding database files. `None` resolves to the user data dir.
    pub database_location: Option<PathBuf>,

    /// Name of the database opened by default, without extension.
    pub default_database_name: String,

    pub journal_mode: JournalMode,

    /// Store timestamps as epoch seconds instead of RFC 3339 text.
    pub use_epoch_dates: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            database_location: None,
            default_database_name: DEFAULT_DATABASE_NAME.to_string(),
            journal_mode: JournalMode::Wal,
            use_epoch_dates: false,
        }
    }

    /// Defaults overridden by the `SHARK_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Self::with_defaults();

        if let Some(location) = lookup(ENV_DATABASE_LOCATION).filter(|s| !s.trim().is_empty()) {
            settings.database_location = Some(PathBuf::from(location));
        }
        if let Some(name) = lookup(ENV_DATABASE_NAME) {
            settings.default_database_name = name;
        }
        if let Some(mode) = lookup(ENV_JOURNAL_MODE) {
            settings.journal_mode = mode.parse()?;
        }
        if let Some(flag) = lookup(ENV_EPOCH_DATES) {
            settings.use_epoch_dates = parse_flag(ENV_EPOCH_DATES, &flag)?;
        }

        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Directory that holds the database files.
    pub fn resolved_location(&self) -> Result<PathBuf, SettingsError> {
        match &self.database_location {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join("shark"))
                .ok_or(SettingsError::NoDataDir),
        }
    }

    /// Full path of the database called `name`.
    pub fn database_path(&self, name: &str) -> Result<PathBuf, SettingsError> {
        validate_database_name(name)?;
        Ok(self
            .resolved_location()?
            .join(format!("{name}.{DATABASE_EXTENSION}")))
    }

    /// Full path of the default database.
    pub fn default_database_path(&self) -> Result<PathBuf, SettingsError> {
        self.database_path(&self.default_database_name)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidFlag {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn validate_database_name(name: &str) -> Result<(), SettingsError> {
    if name.trim().is_empty() {
        return Err(SettingsError::EmptyDatabaseName);
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(SettingsError::InvalidDatabaseName(name.to_string()));
    }
    Ok(())
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Database name cannot be empty")]
    EmptyDatabaseName,

    #[error("Database name must not contain path separators, got '{0}'")]
    InvalidDatabaseName(String),

    #[error("Unknown journal mode '{0}'")]
    InvalidJournalMode(String),

    #[error("Invalid boolean for {key}: '{value}'")]
    InvalidFlag { key: String, value: String },

    #[error("Cannot determine system data directory")]
    NoDataDir,
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    validate_database_name(&settings.default_database_name)
}
