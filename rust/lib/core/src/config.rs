use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Directory searched when a bare context name is given instead of a path.
pub const CONFIG_DIR: &str = "/etc/invent";

/// Server configuration, read from a TOML file.
///
/// ```toml
/// listen = "0.0.0.0:8080"
/// data_dir = "/var/lib/invent/prod"
/// log = "info,install=debug"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Listen address for the HTTP server.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory holding the record store.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log")]
    pub log: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: None,
            sqlite_path: None,
            log: default_log(),
        }
    }
}

impl ServiceConfig {
    /// Resolve a context name or path to a config file path.
    ///
    /// Anything containing `/` or `.` is used as-is; a bare name maps to
    /// `/etc/invent/<name>.toml`.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(CONFIG_DIR).join(format!("{}.toml", name_or_path))
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Storage(format!("read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| ServiceError::Validation(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ServiceError> {
        toml::from_str(content).map_err(|e| ServiceError::Validation(e.to_string()))
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.sqlite"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
