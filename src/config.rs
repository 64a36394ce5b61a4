use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Environment key holding the application's database connection string
    #[serde(default = "default_url_key")]
    pub url_key: String,
    /// Path used when the connection string is absent or not a sqlite URL
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_key: default_url_key(),
            fallback_path: default_fallback_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory holding one lock file per protected resource
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
    /// Runtime override file exported from the container's init process
    #[serde(default)]
    pub override_file: Option<PathBuf>,
    /// Executable that hosts the management commands (default: `python`)
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the command name (default: `manage.py`)
    #[serde(default = "default_program_args")]
    pub program_args: Vec<String>,
    /// Working directory for the external job and for relative database paths
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Capture the job's stdout/stderr into the log instead of inheriting them
    #[serde(default)]
    pub capture_output: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            lock_dir: default_lock_dir(),
            override_file: None,
            program: default_program(),
            program_args: default_program_args(),
            working_dir: None,
            capture_output: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_fallback_path() -> String {
    "/data/operations.db".to_string()
}

fn default_lock_dir() -> PathBuf {
    PathBuf::from("/tmp/cronwarden")
}

fn default_program() -> String {
    "python".to_string()
}

fn default_program_args() -> Vec<String> {
    vec!["manage.py".to_string()]
}
