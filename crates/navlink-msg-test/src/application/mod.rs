//! Application layer: what the harness does, independent of sockets.
//!
//! - [`conformance`] drives one run over two [`Endpoint`](crate::infrastructure::Endpoint)s.
//! - [`listing`] renders `--list`.

pub mod conformance;
pub mod listing;

pub use conformance::{
    build_message, run_conformance, ConformanceError, ConformanceReport, LivenessCheck,
    FAILED_BANNER, PASSED_BANNER,
};
pub use listing::{list_messages, render_listing, ListedMessage};
