//! Runtime configuration
//!
//! Every field has a default. A TOML file may override the defaults and the
//! process environment overrides both.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where function bundles are pulled from and logs are pushed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    #[default]
    Local,
    S3,
}

impl StorageDriver {
    /// `s3` selects the object store; anything else falls back to local.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => StorageDriver::S3,
            _ => StorageDriver::Local,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root working directory holding slots, cache and executions.
    pub run_directory: PathBuf,
    /// Remote (or local) location of the function archives.
    pub functions_location: String,
    /// Archive root for execution logs.
    pub logs_location: String,
    /// Transfer backend.
    pub storage_driver: StorageDriver,
    /// How function entry points are launched.
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Route prefix of the control surface, e.g. `/python/functions`.
    pub route_prefix: String,
    /// Program that runs the entry point.
    pub interpreter: String,
    /// Entry point file inside each function bundle.
    pub entry_point: String,
    /// Environment variable carrying the session context.
    pub session_env: String,
    /// Mirror each output line of a function into the service log.
    pub echo_output: bool,
    /// Remove the execution directory once its log has been archived.
    pub prune_execution_dirs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            run_directory: PathBuf::from("/tmp/executor"),
            functions_location: "/tmp/functions".into(),
            logs_location: "/tmp/executor_logs".into(),
            storage_driver: StorageDriver::Local,
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            route_prefix: "python".into(),
            interpreter: "python".into(),
            entry_point: "function.py".into(),
            session_env: "OPENOBD_SESSION_INFO".into(),
            echo_output: true,
            prune_execution_dirs: false,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl RuntimeConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("EXECUTOR_RUN_DIRECTORY") {
            self.run_directory = PathBuf::from(v);
        }
        if let Some(v) = lookup("FUNCTIONS_LOCATION") {
            self.functions_location = v;
        }
        if let Some(v) = lookup("LOGS_LOCATION") {
            self.logs_location = v;
        }
        if let Some(v) = lookup("STORAGE_DRIVER") {
            self.storage_driver = StorageDriver::parse(&v);
        }
        if let Some(v) = lookup("EXECUTOR_ROUTE_PREFIX") {
            self.executor.route_prefix = v;
        }
        if let Some(v) = lookup("EXECUTOR_INTERPRETER") {
            self.executor.interpreter = v;
        }
        if let Some(v) = lookup("EXECUTOR_ENTRY_POINT") {
            self.executor.entry_point = v;
        }
        if let Some(v) = lookup("EXECUTOR_SESSION_ENV") {
            self.executor.session_env = v;
        }
        if let Some(v) = lookup("EXECUTOR_ECHO_OUTPUT").and_then(|v| parse_flag(&v)) {
            self.executor.echo_output = v;
        }
        if let Some(v) = lookup("EXECUTOR_PRUNE_EXECUTION_DIRS").and_then(|v| parse_flag(&v)) {
            self.executor.prune_execution_dirs = v;
        }
        self
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Contains the two function slots.
    pub fn functions_dir(&self) -> PathBuf {
        self.run_directory.join("functions")
    }

    /// Contains the archives pulled from `functions_location`.
    pub fn cache_dir(&self) -> PathBuf {
        self.run_directory.join("cache")
    }

    /// Contains one directory per execution.
    pub fn executions_dir(&self) -> PathBuf {
        self.run_directory.join("executions")
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
