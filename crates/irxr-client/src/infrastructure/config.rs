//! TOML-based configuration for the client.
//!
//! Reads and writes [`ClientConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\IRXR\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/irxr/config.toml` (or `~/.config/irxr/`)
//! - macOS:    `~/Library/Application Support/IRXR/config.toml`
//!
//! ```toml
//! [client]
//! host_name = "UnityEditor"
//! log_level = "info"
//! subscribe_topics = ["SceneUpdate"]
//!
//! [network]
//! discovery_port = 7720
//! subnet_mask = "255.255.255.0"
//!
//! [timing]
//! liveness_window_ms = 1000
//! request_timeout_ms = 2000
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so an empty file, a
//! missing section, or a file written by an older version all load cleanly.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use irxr_core::protocol::{ClientPort, ServerPort};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::net_manager::NetManagerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is not usable.
    #[error("invalid config value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub timing: TimingSection,
}

/// Identity and logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Name advertised to the server in the `Register` request.
    #[serde(default = "default_host_name")]
    pub host_name: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Topics the binary subscribes to and logs.
    #[serde(default)]
    pub subscribe_topics: Vec<String>,
}

/// Ports, subnet and discovery tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    #[serde(default = "default_server_service_port")]
    pub server_service_port: u16,
    #[serde(default = "default_server_topic_port")]
    pub server_topic_port: u16,
    /// Reserved; no socket binds it.
    #[serde(default = "default_client_service_port")]
    pub client_service_port: u16,
    #[serde(default = "default_client_topic_port")]
    pub client_topic_port: u16,
    /// Dotted-quad mask, e.g. `"255.255.255.0"`.
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: String,
    #[serde(default = "default_discovery_tag")]
    pub discovery_tag: String,
}

/// Tick and timeout durations in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSection {
    #[serde(default = "default_liveness_window_ms")]
    pub liveness_window_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Absent means requests block until answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host_name() -> String {
    "UnityEditor".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_discovery_port() -> u16 {
    ClientPort::Discovery.port()
}
fn default_server_service_port() -> u16 {
    ServerPort::Service.port()
}
fn default_server_topic_port() -> u16 {
    ServerPort::Topic.port()
}
fn default_client_service_port() -> u16 {
    ClientPort::Service.port()
}
fn default_client_topic_port() -> u16 {
    ClientPort::Topic.port()
}
fn default_subnet_mask() -> String {
    "255.255.255.0".to_string()
}
fn default_discovery_tag() -> String {
    irxr_core::protocol::DISCOVERY_TAG.to_string()
}
fn default_liveness_window_ms() -> u64 {
    1000
}
fn default_tick_interval_ms() -> u64 {
    20
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            host_name: default_host_name(),
            log_level: default_log_level(),
            subscribe_topics: Vec::new(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            server_service_port: default_server_service_port(),
            server_topic_port: default_server_topic_port(),
            client_service_port: default_client_service_port(),
            client_topic_port: default_client_topic_port(),
            subnet_mask: default_subnet_mask(),
            discovery_tag: default_discovery_tag(),
        }
    }
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            liveness_window_ms: default_liveness_window_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            request_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Converts the on-disk form into the manager's runtime config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparsable subnet mask, a
    /// zero liveness window, or an empty discovery tag.
    pub fn to_manager_config(&self) -> Result<NetManagerConfig, ConfigError> {
        let subnet_mask: Ipv4Addr =
            self.network
                .subnet_mask
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                    key: "network.subnet_mask",
                    reason: e.to_string(),
                })?;
        if self.timing.liveness_window_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timing.liveness_window_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.network.discovery_tag.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "network.discovery_tag",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(NetManagerConfig {
            host_name: self.client.host_name.clone(),
            discovery_port: self.network.discovery_port,
            server_service_port: self.network.server_service_port,
            server_topic_port: self.network.server_topic_port,
            client_topic_port: self.network.client_topic_port,
            subnet_mask,
            discovery_tag: self.network.discovery_tag.clone(),
            liveness_window: Duration::from_millis(self.timing.liveness_window_ms),
            request_timeout: self.timing.request_timeout_ms.map(Duration::from_millis),
        })
    }

    /// Interval between ticks in the binary's driver loop.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timing.tick_interval_ms.max(1))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform path.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `ClientConfig` from `path`, returning `ClientConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &ClientConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("IRXR"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("irxr"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("IRXR")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
