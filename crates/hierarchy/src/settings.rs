use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hierarchy_browser::ExecutorLimits;
use hierarchy_model::{ClassHierarchy, HierarchyError};
use hierarchy_platform::AppPaths;
use hierarchy_provider::SearchConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("unparsable settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_search_handle_idle")]
    pub search_handle_idle_secs: u64,

    #[serde(default = "default_search_reap_interval")]
    pub search_reap_interval_secs: u64,

    #[serde(default = "default_search_poll_interval")]
    pub search_poll_interval_ms: u64,

    #[serde(default = "default_part_timeout")]
    pub part_timeout_secs: u64,

    #[serde(default = "default_part_memory_limit")]
    pub part_memory_limit_bytes: usize,

    /// Extra `class -> parent` edges for the class hierarchy.
    #[serde(default)]
    pub extra_classes: BTreeMap<String, String>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_search_handle_idle() -> u64 {
    600
}

fn default_search_reap_interval() -> u64 {
    60
}

fn default_search_poll_interval() -> u64 {
    1000
}

fn default_part_timeout() -> u64 {
    30
}

fn default_part_memory_limit() -> usize {
    64 * 1024 * 1024
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            search_handle_idle_secs: default_search_handle_idle(),
            search_reap_interval_secs: default_search_reap_interval(),
            search_poll_interval_ms: default_search_poll_interval(),
            part_timeout_secs: default_part_timeout(),
            part_memory_limit_bytes: default_part_memory_limit(),
            extra_classes: BTreeMap::new(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    /// Settings from the per-user settings file. Parse failures are returned
    /// so they can be reported once logging is up.
    ///
    /// # Errors
    /// `SettingsError::Parse` when the file exists but is not valid.
    pub fn load() -> Result<Self, SettingsError> {
        let Ok(paths) = AppPaths::new() else {
            return Ok(Self::default());
        };
        Self::load_from(&paths.settings_file())
    }

    /// Settings stored at `path`; a missing file yields defaults.
    ///
    /// # Errors
    /// `SettingsError::Parse` when the file exists but is not valid.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Provider address, command line overrides first.
    pub fn address(&self, host: Option<String>, port: Option<u16>) -> String {
        let host = host.unwrap_or_else(|| self.host.clone());
        format!("{host}:{}", port.unwrap_or(self.port))
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            idle_timeout: Duration::from_secs(self.search_handle_idle_secs),
            reap_interval: Duration::from_secs(self.search_reap_interval_secs.max(1)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.search_poll_interval_ms)
    }

    pub fn executor_limits(&self) -> ExecutorLimits {
        ExecutorLimits {
            timeout: Duration::from_secs(self.part_timeout_secs),
            memory_limit: self.part_memory_limit_bytes,
        }
    }

    pub fn class_hierarchy(&self) -> Result<ClassHierarchy, HierarchyError> {
        ClassHierarchy::builtin().with_classes(
            self.extra_classes
                .iter()
                .map(|(class, parent)| (class.clone(), parent.clone())),
        )
    }
}
