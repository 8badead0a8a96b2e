//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{config_path, home_dir};
use super::{Error, Result};
use crate::harness::HarnessTiming;

/// Longest accepted poll interval (one hour)
const MAX_TICK_INTERVAL_MS: u64 = 3_600_000;

/// Main configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Product name used to derive default artifact locations
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,

    /// Application under test
    #[serde(default)]
    pub target: TargetConfig,

    /// Log file observed by the harness
    #[serde(default)]
    pub log: LogConfig,

    /// Timing of a harness run
    #[serde(default)]
    pub timing: TimingConfig,

    /// Diagnostics logging of castprobe itself
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Installed artifacts checked by `castprobe verify`
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            target: TargetConfig::default(),
            log: LogConfig::default(),
            timing: TimingConfig::default(),
            logging: LoggingConfig::default(),
            artifacts: Vec::new(),
        }
    }
}

fn default_plugin_name() -> String {
    "FreeCaster".to_string()
}

/// The application launched for a run
#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    /// Path (or PATH-resolvable name) of the executable
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            working_dir: None,
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("./build/FreeCaster_artefacts/Standalone/FreeCaster.app/Contents/MacOS/FreeCaster")
}

/// Log file settings
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Log file written by the application under test
    #[serde(default = "default_log_path")]
    pub path: PathBuf,

    /// Number of connection attempts kept for the report
    #[serde(default = "default_recent_attempts")]
    pub recent_attempts: usize,

    /// Print every observed line while monitoring
    #[serde(default)]
    pub echo_lines: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            recent_attempts: default_recent_attempts(),
            echo_lines: false,
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("test_log.txt")
}
fn default_recent_attempts() -> usize {
    5
}

/// Timing settings
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Wait after launch before observation starts
    #[serde(default = "default_discovery_grace")]
    pub discovery_grace_secs: u64,

    /// Interval between log polls
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Length of the monitoring window
    #[serde(default = "default_monitor_duration")]
    pub monitor_duration_secs: u64,

    /// Wait after a graceful stop request before killing the target
    #[serde(default = "default_stop_grace")]
    pub stop_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            discovery_grace_secs: default_discovery_grace(),
            tick_interval_ms: default_tick_interval(),
            monitor_duration_secs: default_monitor_duration(),
            stop_grace_ms: default_stop_grace(),
        }
    }
}

fn default_discovery_grace() -> u64 {
    10
}
fn default_tick_interval() -> u64 {
    1000
}
fn default_monitor_duration() -> u64 {
    30
}
fn default_stop_grace() -> u64 {
    5000
}

/// Diagnostics logging settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Also write diagnostics to the data directory log file
    #[serde(default)]
    pub file: bool,
}

/// An installed artifact whose presence is verified
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ArtifactConfig {
    /// Display name, e.g. "VST3"
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
    /// Usage note printed when the artifact is present
    #[serde(default)]
    pub note: Option<String>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Timing of a run as durations
    ///
    /// Durations may be arbitrarily long; only the tick interval is bounded.
    pub fn timing(&self) -> Result<HarnessTiming> {
        if self.timing.tick_interval_ms == 0 {
            return Err(Error::Config(
                "timing.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.timing.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return Err(Error::Config(format!(
                "timing.tick_interval_ms must be at most {}",
                MAX_TICK_INTERVAL_MS
            )));
        }
        Ok(HarnessTiming {
            grace_delay: Duration::from_secs(self.timing.discovery_grace_secs),
            tick_interval: Duration::from_millis(self.timing.tick_interval_ms),
            monitor_duration: Duration::from_secs(self.timing.monitor_duration_secs),
            stop_grace_timeout: Duration::from_millis(self.timing.stop_grace_ms),
        })
    }

    /// Artifacts to verify
    ///
    /// Falls back to the plugin bundles and standalone app of `plugin_name`
    /// when none are configured
    pub fn artifacts(&self) -> Vec<ArtifactConfig> {
        if !self.artifacts.is_empty() {
            return self.artifacts.clone();
        }

        let name = &self.plugin_name;
        let plugins = home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join("Library/Audio/Plug-Ins");

        vec![
            ArtifactConfig {
                name: "VST3".to_string(),
                path: plugins.join("VST3").join(format!("{name}.vst3")),
                note: Some("Available for Ableton Live, Logic Pro and other VST3 hosts".to_string()),
            },
            ArtifactConfig {
                name: "AU".to_string(),
                path: plugins.join("Components").join(format!("{name}.component")),
                note: Some("Available for Logic Pro, GarageBand and other AU hosts".to_string()),
            },
            ArtifactConfig {
                name: "Standalone".to_string(),
                path: PathBuf::from(format!("./build/{name}_artefacts/Standalone/{name}.app")),
                note: Some("Available for direct testing with `castprobe run`".to_string()),
            },
        ]
    }
}
