//! Domain layer for navlink-msg-test.
//!
//! Pure value types with no socket or thread in sight.

pub mod config;
pub mod params;
pub mod record;

pub use config::{ConfigError, EndpointConfig, HarnessConfig};
pub use params::{parse_params, sniff_value};
pub use record::ReceivedRecord;
