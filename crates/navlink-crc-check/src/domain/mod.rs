//! Domain layer for navlink-crc-check.
//!
//! Pure value types: what a source says about each message, what the
//! comparator reports, and how the checker is configured.  Nothing here
//! touches the file system except the config loader.

pub mod config;
pub mod descriptor;
pub mod unavailable;

pub use config::{CheckConfig, ConfigError, SourcePaths};
pub use descriptor::{Discrepancy, DiscrepancyKind, MessageDescriptor, SourceTable};
pub use unavailable::SourceUnavailable;
