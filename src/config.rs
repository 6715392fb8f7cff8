//! Configuration management for db-cell.
//!
//! Handles loading configuration from TOML files: execution settings and
//! named connection sections usable with `--section NAME` or `[NAME]`.

use crate::error::{CellError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure for db-cell.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Execution and result settings.
    #[serde(default)]
    pub settings: Settings,

    /// Named connection sections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// Settings consulted on every command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Fetch-time row bound. Zero or negative means unbounded.
    pub autolimit: i64,

    /// Number of rows shown when rendering a table. Zero means unbounded.
    pub displaylimit: usize,

    /// Run statements in autocommit mode.
    pub autocommit: bool,

    /// Report the number of rows affected by DML.
    pub feedback: bool,

    /// Return columnar frames instead of result sets.
    pub autoframe: bool,

    /// Bind each result column to a variable named after it.
    pub column_local_vars: bool,

    /// List open connections when a command names none.
    pub displaycon: bool,

    /// Rewrite recognised driver errors into short usage errors.
    pub short_errors: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autolimit: 0,
            displaylimit: 10,
            autocommit: true,
            feedback: true,
            autoframe: false,
            column_local_vars: false,
            displaycon: true,
            short_errors: true,
        }
    }
}

impl Settings {
    /// Returns the fetch-time row bound, if one is configured.
    pub fn fetch_limit(&self) -> Option<usize> {
        if self.autolimit > 0 {
            Some(self.autolimit as usize)
        } else {
            None
        }
    }
}

/// A named connection section.
///
/// Either `url` is given, or the DSN-style fields are assembled into a URL.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,

    /// Driver name / URL scheme (e.g. `postgresql`, `sqlite`).
    pub drivername: Option<String>,

    /// Database host.
    pub host: Option<String>,

    /// Database port.
    pub port: Option<u16>,

    /// Database name (a file path for SQLite).
    pub database: Option<String>,

    /// Database user.
    #[serde(alias = "user")]
    pub username: Option<String>,

    /// Database password (not recommended to store in config).
    pub password: Option<String>,
}

impl ConnectionConfig {
    /// Creates a connection config from a connection string.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let url = Url::parse(conn_str)
            .map_err(|e| CellError::config(format!("Invalid connection string: {e}")))?;

        let database = url
            .path()
            .strip_prefix('/')
            .filter(|db| !db.is_empty())
            .map(String::from);
        let username = if url.username().is_empty() {
            None
        } else {
            Some(url.username().to_string())
        };

        Ok(Self {
            url: None,
            drivername: Some(url.scheme().to_string()),
            host: url.host_str().map(String::from),
            port: url.port(),
            database,
            username,
            password: url.password().map(String::from),
        })
    }

    /// Converts the section to a connection string.
    pub fn to_connection_string(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let driver = self
            .drivername
            .as_deref()
            .ok_or_else(|| CellError::config("Either 'url' or 'drivername' is required"))?;

        let mut conn_str = format!("{driver}://");

        if let Some(user) = &self.username {
            conn_str.push_str(user);
            if let Some(password) = &self.password {
                conn_str.push(':');
                conn_str.push_str(password);
            }
            conn_str.push('@');
        }

        if let Some(host) = &self.host {
            conn_str.push_str(host);
            if let Some(port) = self.port {
                conn_str.push(':');
                conn_str.push_str(&port.to_string());
            }
        }

        if let Some(database) = &self.database {
            conn_str.push('/');
            conn_str.push_str(database);
        }

        Ok(conn_str)
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-cell")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CellError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            CellError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection section.
    pub fn get_connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }

    /// Resolves a named section to a connection string.
    pub fn section_connection_string(&self, section: &str) -> Result<String> {
        let conn = self.get_connection(section).ok_or_else(|| {
            let mut known: Vec<&str> = self.connections.keys().map(String::as_str).collect();
            known.sort_unstable();
            CellError::config(format!(
                "Connection section '{section}' not found in config file (available: {})",
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })?;
        conn.to_connection_string()
    }
}
