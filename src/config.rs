//! Process-wide settings loaded from TOML.
//!
//! ```toml
//! default_connection = "primary"
//! log_statements = true
//!
//! [connections.primary]
//! uri = "bolt://localhost:7687"
//! user = "neo4j"
//! ```
//!
//! Connection profiles are plain data for application resolvers; this crate
//! never opens connections itself.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "GRM_CONFIG";

/// Connection name used when neither the builder nor the model picks one.
pub const DEFAULT_CONNECTION: &str = "default";

/// Crate-wide settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Connection used by models and builders that do not name one.
    pub default_connection: String,
    /// Logs every rendered statement at `info` instead of `debug`.
    pub log_statements: bool,
    /// Connection profiles keyed by connection name.
    pub connections: BTreeMap<String, ConnectionProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_connection: DEFAULT_CONNECTION.to_owned(),
            log_statements: false,
            connections: BTreeMap::new(),
        }
    }
}

/// Where and how an application resolver should connect.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ConnectionProfile {
    /// Driver URI.
    pub uri: String,
    /// Optional user name.
    #[serde(default)]
    pub user: Option<String>,
    /// Optional database name.
    #[serde(default)]
    pub database: Option<String>,
}

impl Settings {
    /// Loads settings from `explicit`, `$GRM_CONFIG`, or the user config directory.
    ///
    /// A missing file yields the defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        match path {
            Some(path) if path.exists() => Self::read_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses settings from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents, "<inline>")
    }

    /// Returns the profile registered for `name`.
    pub fn connection(&self, name: &str) -> Option<&ConnectionProfile> {
        self.connections.get(name)
    }

    /// Makes these settings the process-wide settings.
    pub fn install(self) {
        debug!(
            default_connection = %self.default_connection,
            log_statements = self.log_statements,
            "settings installed"
        );
        *slot().write() = Arc::new(self);
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    fn parse(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                origin: origin.to_owned(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.connections.is_empty() && !self.connections.contains_key(&self.default_connection)
        {
            return Err(ConfigError::UnknownDefaultConnection {
                name: self.default_connection.clone(),
            });
        }
        Ok(())
    }
}

static SETTINGS: OnceLock<RwLock<Arc<Settings>>> = OnceLock::new();

fn slot() -> &'static RwLock<Arc<Settings>> {
    SETTINGS.get_or_init(|| RwLock::new(Arc::new(Settings::default())))
}

/// Returns the process-wide settings.
pub fn settings() -> Arc<Settings> {
    Arc::clone(&slot().read())
}

/// Default settings file location.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir().map(|base| base.join("grm").join("grm.toml"))
}

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The settings file is not valid TOML for [`Settings`].
    #[error("failed to parse settings {origin}: {source}")]
    Parse {
        /// File path or `<inline>`.
        origin: String,
        /// Underlying parse error.
        source: toml::de::Error,
    },
    /// `default_connection` does not name a declared profile.
    #[error("default connection '{name}' has no profile")]
    UnknownDefaultConnection {
        /// The missing connection name.
        name: String,
    },
}
