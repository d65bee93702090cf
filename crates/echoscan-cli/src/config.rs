//! Configuration file – reads/writes `~/.echoscan/config.toml`.

use echoscan_runtime::{DriverConfig, RetryPolicy};
use echoscan_types::{ScanError, SensorId, SensorMount};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How readings reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// One JSON reading per WebSocket frame (the rig firmware default).
    #[default]
    WebSocket,
    /// Line-delimited JSON over TCP.
    Tcp,
    /// Built-in synthetic rig, no hardware needed.
    Simulated,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::WebSocket => write!(f, "websocket"),
            Transport::Tcp => write!(f, "tcp"),
            Transport::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for Transport {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Transport::WebSocket),
            "tcp" => Ok(Transport::Tcp),
            "simulated" | "sim" => Ok(Transport::Simulated),
            other => Err(ScanError::Config(format!("unknown transport '{other}'"))),
        }
    }
}

/// Where raw readings are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderKind {
    #[default]
    Csv,
    Sqlite,
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub kind: RecorderKind,
    /// Directory for CSV files or the SQLite database.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            kind: RecorderKind::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Persisted configuration stored in `~/.echoscan/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: Transport,

    /// Rig endpoint (`ws://…` or `host:port` for TCP).
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Maximum number of points kept for display.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Readings that may queue between ingestion and processing.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// HTTP/WebSocket port of the live viewer.
    #[serde(default = "default_cockpit_port")]
    pub cockpit_port: u16,

    /// Viewer refresh period.
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,

    /// Half-extent of the viewer axes (cm).
    #[serde(default = "default_plot_bound_cm")]
    pub plot_bound_cm: f64,

    #[serde(default = "SensorMount::default_rig")]
    pub mounts: Vec<SensorMount>,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub recorder: RecorderConfig,
}

fn default_source_url() -> String {
    "ws://192.168.1.219:81/".to_string()
}
fn default_buffer_capacity() -> usize {
    10_000
}
fn default_channel_capacity() -> usize {
    64
}
fn default_cockpit_port() -> u16 {
    8080
}
fn default_render_interval_ms() -> u64 {
    100
}
fn default_plot_bound_cm() -> f64 {
    250.0
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            source_url: default_source_url(),
            buffer_capacity: default_buffer_capacity(),
            channel_capacity: default_channel_capacity(),
            cockpit_port: default_cockpit_port(),
            render_interval_ms: default_render_interval_ms(),
            plot_bound_cm: default_plot_bound_cm(),
            mounts: SensorMount::default_rig(),
            retry: RetryPolicy::default(),
            recorder: RecorderConfig::default(),
        }
    }
}

impl Config {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.buffer_capacity == 0 {
            return Err(ScanError::Config("buffer_capacity must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ScanError::Config("channel_capacity must be at least 1".into()));
        }
        if self.render_interval_ms == 0 {
            return Err(ScanError::Config("render_interval_ms must be at least 1".into()));
        }
        if !(self.plot_bound_cm.is_finite() && self.plot_bound_cm > 0.0) {
            return Err(ScanError::Config(format!(
                "plot_bound_cm must be positive, got {}",
                self.plot_bound_cm
            )));
        }
        if self.transport != Transport::Simulated && self.source_url.trim().is_empty() {
            return Err(ScanError::Config(format!(
                "source_url is required for the {} transport",
                self.transport
            )));
        }
        // Every reading carries all four distances, so every sensor needs a mount.
        let mut seen: HashSet<SensorId> = HashSet::new();
        for mount in &self.mounts {
            if !seen.insert(mount.id) {
                return Err(ScanError::Config(format!("sensor '{}' is mounted twice", mount.id)));
            }
        }
        if let Some(missing) = SensorId::ALL.into_iter().find(|id| !seen.contains(id)) {
            return Err(ScanError::Config(format!("sensor '{missing}' has no mount")));
        }
        Ok(())
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    /// The driver settings carried by this config.
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            mounts: self.mounts.clone(),
            buffer_capacity: self.buffer_capacity,
            channel_capacity: self.channel_capacity,
            retry: self.retry,
        }
    }
}

/// Return the path to `~/.echoscan/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".echoscan").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ScanError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ScanError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ScanError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| ScanError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `ECHOSCAN_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ECHOSCAN_SOURCE_URL` | `source_url` |
/// | `ECHOSCAN_TRANSPORT` | `transport` |
/// | `ECHOSCAN_COCKPIT_PORT` | `cockpit_port` |
/// | `ECHOSCAN_BUFFER_CAPACITY` | `buffer_capacity` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ECHOSCAN_SOURCE_URL") {
        cfg.source_url = v;
    }
    if let Ok(v) = std::env::var("ECHOSCAN_TRANSPORT")
        && let Ok(transport) = v.parse::<Transport>()
    {
        cfg.transport = transport;
    }
    if let Ok(v) = std::env::var("ECHOSCAN_COCKPIT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.cockpit_port = port;
    }
    if let Ok(v) = std::env::var("ECHOSCAN_BUFFER_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>()
    {
        cfg.buffer_capacity = capacity;
    }
}

/// Save the config to disk, creating `~/.echoscan/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ScanError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ScanError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ScanError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                ScanError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| ScanError::Config(format!("failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| ScanError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| ScanError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
