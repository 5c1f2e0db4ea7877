//! TOML configuration for the consistency checker.
//!
//! Every field is optional in the file; absent fields fall back to the
//! conventional checkout layout:
//!
//! ```toml
//! verbose = false
//!
//! [sources]
//! ardupilot_root = "~/ardupilot"
//! router_root = "~/mavlink-router"
//! ardupilot_header = "build/sitl/libraries/GCS_MAVLink/include/mavlink/v2.0/ardupilotmega/ardupilotmega.h"
//! router_header = "modules/mavlink_c_library_v2/ardupilotmega/ardupilotmega.h"
//! # registry_dump = "/tmp/registry.json"
//! ```
//!
//! A leading `~` in any path expands from `$HOME`.

use std::path::{Path, PathBuf};

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

/// Top-level checker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckConfig {
    #[serde(default)]
    pub sources: SourcePaths,
    /// Dump the runtime source's full table before the comparison.
    #[serde(default)]
    pub verbose: bool,
}

/// Where each artifact lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcePaths {
    #[serde(default = "default_ardupilot_root")]
    pub ardupilot_root: PathBuf,
    #[serde(default = "default_router_root")]
    pub router_root: PathBuf,
    /// Generated header, relative to `ardupilot_root`.
    #[serde(default = "default_ardupilot_header")]
    pub ardupilot_header: PathBuf,
    /// Generated header, relative to `router_root`.
    #[serde(default = "default_router_header")]
    pub router_header: PathBuf,
    /// Exported runtime registry; the built-in dialect is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_dump: Option<PathBuf>,
}

impl SourcePaths {
    /// Full path of the autopilot's generated header.
    pub fn ardupilot_header_path(&self) -> PathBuf {
        expand_home(&self.ardupilot_root).join(&self.ardupilot_header)
    }

    /// Full path of the router's generated header.
    pub fn router_header_path(&self) -> PathBuf {
        expand_home(&self.router_root).join(&self.router_header)
    }

    /// Registry dump path with `~` expanded.
    pub fn registry_dump_path(&self) -> Option<PathBuf> {
        self.registry_dump.as_deref().map(expand_home)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_ardupilot_root() -> PathBuf {
    PathBuf::from("~/ardupilot")
}
fn default_router_root() -> PathBuf {
    PathBuf::from("~/mavlink-router")
}
fn default_ardupilot_header() -> PathBuf {
    PathBuf::from(
        "build/sitl/libraries/GCS_MAVLink/include/mavlink/v2.0/ardupilotmega/ardupilotmega.h",
    )
}
fn default_router_header() -> PathBuf {
    PathBuf::from("modules/mavlink_c_library_v2/ardupilotmega/ardupilotmega.h")
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            sources: SourcePaths::default(),
            verbose: false,
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            ardupilot_root: default_ardupilot_root(),
            router_root: default_router_root(),
            ardupilot_header: default_ardupilot_header(),
            router_header: default_router_header(),
            registry_dump: None,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads a [`CheckConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<CheckConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CheckConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Replaces a leading `~` with `$HOME`.  Paths without one, or a missing
/// `$HOME`, are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
