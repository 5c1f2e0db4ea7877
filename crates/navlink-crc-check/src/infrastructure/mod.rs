//! Infrastructure layer: concrete artifact extractors.
//!
//! - [`registry`] reads a protocol runtime's message registry, either the
//!   built-in dialect or an exported JSON dump.
//! - [`header`] scans a generated C header for its CRC table.

pub mod header;
pub mod registry;

pub use header::{CrcTableParser, HeaderExtractor};
pub use registry::{ProtocolRegistry, RegistryClass, RegistryDump, RegistryExtractor, RegistrySource};
