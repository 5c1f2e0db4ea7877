//! Why a protocol artifact could not take part in a check.

use std::path::PathBuf;

use thiserror::Error;

/// Why a source could not take part in the comparison.
///
/// Never fatal: the driver reports it as a warning and skips the source.
#[derive(Debug, Error)]
pub enum SourceUnavailable {
    /// The artifact does not exist.
    #[error("{path} does not exist")]
    Missing { path: PathBuf },

    /// The artifact exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header has no `MAVLINK_MESSAGE_CRCS` table.
    #[error("{path} has no MAVLINK_MESSAGE_CRCS table")]
    NoTable { path: PathBuf },

    /// The registry dump is not valid JSON of the expected shape.
    #[error("invalid registry dump {path}: {source}")]
    InvalidDump {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The artifact was read but defines none of the catalog messages.
    #[error("{location} defines no navlink messages")]
    NoCatalogEntries { location: String },
}
