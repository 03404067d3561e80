//! Configuration for the `xbdm` command-line tool.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xbdm_core::{CONTROL_PORT, ScreenshotRequest, SessionOptions};
use xbdm_core::protocol::screen::DEFAULT_NAME_FORMAT;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XbdmConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Screenshot naming.
    pub screenshot: ScreenshotConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP port of the debug monitor.
    pub port: u16,
}

/// Where screenshots without an explicit file name go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// Output directory. Empty means the working directory.
    pub directory: String,
    /// `strftime` pattern for generated file names.
    pub name_format: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { port: CONTROL_PORT }
    }
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
            name_format: DEFAULT_NAME_FORMAT.into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at the given path.
    Defaults,
    /// The file exists but could not be parsed.
    Invalid(String),
}

impl XbdmConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Logging is not initialised yet when this runs, so the outcome is
    /// returned for the caller to report.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(cfg) => (cfg, ConfigSource::File(path.to_path_buf())),
                Err(e) => (
                    Self::default(),
                    ConfigSource::Invalid(format!("invalid config {}: {e}", path.display())),
                ),
            },
            Err(_) => (Self::default(), ConfigSource::Defaults),
        }
    }

    /// Session options for this configuration.
    pub fn session_options(&self, verbose: bool) -> SessionOptions {
        SessionOptions::default()
            .with_port(self.network.port)
            .with_verbose(verbose)
    }

    /// Screenshot request writing to `output`, or to a generated name.
    pub fn screenshot_request(&self, output: Option<PathBuf>) -> ScreenshotRequest {
        let request = ScreenshotRequest::default()
            .with_directory(&self.screenshot.directory)
            .with_name_format(self.screenshot.name_format.clone());
        match output {
            Some(path) => request.with_output(path),
            None => request,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
