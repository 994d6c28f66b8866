// ⚙️ Settings - Everything a run needs, passed down explicitly
//
// Loaded from an optional TOML file, then overridden by CLI flags in main.
// `ParseOptions` is the part the parser sees; it travels from the batch
// runner to the statement parser to the duplicate resolver.

use crate::deduplication::DuplicatePolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// PARSE OPTIONS
// ============================================================================

/// What to do with transaction lines whose date or amount cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineFailurePolicy {
    /// Drop the line, log it and list it in the file's diagnostics
    #[default]
    Skip,

    /// Fail the whole file
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub duplicate_policy: DuplicatePolicy,
    pub line_failures: LineFailurePolicy,
}

// ============================================================================
// DATABASE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// Embedded file database `<name>.db`
    #[default]
    Sqlite,

    /// Networked MariaDB / MySQL server
    Mariadb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub kind: DatabaseKind,
    pub name: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            kind: DatabaseKind::Sqlite,
            name: "teller".to_string(),
            host: None,
            port: None,
            username: None,
            password: None,
        }
    }
}

/// Fully specified MariaDB connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MariaDbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl DatabaseSettings {
    pub fn sqlite_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.db", self.name))
    }

    /// All four credentials are required; nothing is defaulted
    pub fn mariadb(&self) -> Result<MariaDbConfig, ConfigError> {
        Ok(MariaDbConfig {
            host: self
                .host
                .clone()
                .ok_or(ConfigError::MissingCredential("a host (--db-host)"))?,
            port: self
                .port
                .ok_or(ConfigError::MissingCredential("a port (--db-port)"))?,
            username: self
                .username
                .clone()
                .ok_or(ConfigError::MissingCredential("a username (--db-username)"))?,
            password: self
                .password
                .clone()
                .ok_or(ConfigError::MissingCredential("a password (--db-password)"))?,
            database: self.name.clone(),
        })
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Root directory searched recursively for `*.pdf`
    pub directory: PathBuf,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            directory: PathBuf::from("statements"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scan: ScanSettings,
    pub parse: ParseOptions,
    pub database: DatabaseSettings,
}

impl Settings {
    pub fn from_toml(source: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source, path)
    }

    /// Defaults when no file is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Settings::default()),
        }
    }
}
