//! TOML configuration for the conformance harness.
//!
//! Every field is optional; the defaults match a local SITL swarm where the
//! router forwards vehicle traffic to UDP ports 14560 and 14570:
//!
//! ```toml
//! component_id = 1
//! connect_timeout_ms = 10000
//! liveness_timeout_ms = 10000
//! settle_ms = 5000
//! heartbeat_interval_ms = 1000
//! wait_for_heartbeat_on_connect = true
//!
//! [endpoint1]
//! address = "udpin:0.0.0.0:14560"
//! identity = 251
//!
//! [endpoint2]
//! address = "udpin:0.0.0.0:14570"
//! identity = 252
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error other than "not found".
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// One side of the conformance run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Connection string, `udpin:<host>:<port>` or `udpout:<host>:<port>`.
    pub address: String,
    /// MAVLink system id this session sends as.
    pub identity: u8,
}

impl EndpointConfig {
    /// Listens on all interfaces at `port`.
    pub fn udpin(port: u16, identity: u8) -> Self {
        Self {
            address: format!("udpin:0.0.0.0:{port}"),
            identity,
        }
    }
}

/// Top-level harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessConfig {
    #[serde(default = "default_endpoint1")]
    pub endpoint1: EndpointConfig,
    #[serde(default = "default_endpoint2")]
    pub endpoint2: EndpointConfig,
    /// MAVLink component id both sessions send as.
    #[serde(default = "default_component_id")]
    pub component_id: u8,
    /// Bound on the connect-time heartbeat wait.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bound on each cross-session liveness wait.
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,
    /// How long to wait for routing after the send.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Period of each session's own HEARTBEAT.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_wait_for_heartbeat_on_connect")]
    pub wait_for_heartbeat_on_connect: bool,
}

impl HarnessConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_endpoint1() -> EndpointConfig {
    EndpointConfig::udpin(14560, 251)
}
fn default_endpoint2() -> EndpointConfig {
    EndpointConfig::udpin(14570, 252)
}
fn default_component_id() -> u8 {
    1
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_liveness_timeout_ms() -> u64 {
    10_000
}
fn default_settle_ms() -> u64 {
    5_000
}
fn default_heartbeat_interval_ms() -> u64 {
    1_000
}
fn default_wait_for_heartbeat_on_connect() -> bool {
    true
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoint1: default_endpoint1(),
            endpoint2: default_endpoint2(),
            component_id: default_component_id(),
            connect_timeout_ms: default_connect_timeout_ms(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
            settle_ms: default_settle_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            wait_for_heartbeat_on_connect: default_wait_for_heartbeat_on_connect(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads a [`HarnessConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<HarnessConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HarnessConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
