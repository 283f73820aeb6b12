//! Shell Configuration
//!
//! Loads `shell.json` and resolves the backend command, window geometry and
//! navigation timing. Every field has a default, so a missing or partial file
//! still yields a usable configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tauri::Url;

use crate::error::ShellError;

/// Name of the settings file looked up at startup
pub const CONFIG_FILE_NAME: &str = "shell.json";

/// Top-level settings file structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShellConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub navigation: NavigationSettings,
}

/// How to launch the backend and where it listens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSettings {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_script")]
    pub script: String,
    /// Working directory for the backend. Relative paths resolve against the
    /// shell's current directory; `None` means the current directory itself.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Grace period between the polite termination signal and a force kill
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_interpreter() -> String {
    "./venv/bin/python3".to_string()
}

fn default_script() -> String {
    "app.py".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4030
}

fn default_stop_grace_ms() -> u64 {
    5000
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: default_script(),
            working_dir: None,
            host: default_host(),
            port: default_port(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl BackendSettings {
    /// The address the window navigates to once the backend is up
    pub fn url(&self) -> Result<Url, ShellError> {
        let raw = format!("http://{}:{}", self.host, self.port);
        Url::parse(&raw).map_err(|e| ShellError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Resolve the working directory against `base`
    pub fn resolve_working_dir(&self, base: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        }
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// Native window geometry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
}

fn default_title() -> String {
    "Dashboard".to_string()
}

fn default_width() -> f64 {
    1280.0
}

fn default_height() -> f64 {
    800.0
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Timing of the first navigation to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationSettings {
    /// Minimum wait before the first navigation
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// Readiness probe run after the delay. `None` navigates blindly.
    #[serde(default = "default_readiness")]
    pub readiness: Option<ReadinessSettings>,
}

fn default_startup_delay_ms() -> u64 {
    2000
}

fn default_readiness() -> Option<ReadinessSettings> {
    Some(ReadinessSettings::default())
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            startup_delay_ms: default_startup_delay_ms(),
            readiness: default_readiness(),
        }
    }
}

/// Bounded retry policy for the readiness probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadinessSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Per-request timeout
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// Candidate locations for `shell.json`, in lookup order
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        paths.push(cwd.join(CONFIG_FILE_NAME));
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(parent) = exe_path.parent() {
            paths.push(parent.join(CONFIG_FILE_NAME));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("dashboard-shell").join(CONFIG_FILE_NAME));
    }

    paths
}

/// Load the first `shell.json` found, falling back to defaults
pub fn load_config() -> ShellConfig {
    for path in config_search_paths() {
        if path.exists() {
            return load_config_from(&path);
        }
    }

    log::info!("[Config] No {} found, using defaults", CONFIG_FILE_NAME);
    ShellConfig::default()
}

/// Load a specific settings file. Read and parse failures are logged and
/// yield the defaults.
pub fn load_config_from(path: &Path) -> ShellConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<ShellConfig>(&content) {
            Ok(config) => {
                log::info!("[Config] Loaded {:?}", path);
                return config;
            }
            Err(e) => log::warn!("[Config] Failed to parse {:?}: {}", path, e),
        },
        Err(e) => log::warn!("[Config] Failed to read {:?}: {}", path, e),
    }

    ShellConfig::default()
}
