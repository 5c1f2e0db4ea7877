//! navlink-crc-check library crate.
//!
//! Confirms that independently generated navlink protocol artifacts agree on
//! the CRC extra of every catalog message.
//!
//! # Architecture
//!
//! ```text
//! [navlink-crc-check]
//!   ├── domain/           MessageDescriptor, SourceTable, Discrepancy,
//!   │                     SourceUnavailable, CheckConfig
//!   ├── application/
//!   │     ├── compare     symmetric pairwise comparison
//!   │     └── check       extract all, compare all pairs, PASS/FAIL report
//!   └── infrastructure/
//!         ├── registry    runtime registry (built-in dialect or JSON dump)
//!         └── header      MAVLINK_MESSAGE_CRCS table in generated C headers
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no dependency on the other layers.  It also owns
//!   [`domain::SourceUnavailable`], so both other layers can name it.
//! - `application` sees artifacts only through the
//!   [`application::ArtifactExtractor`] trait.
//! - `infrastructure` implements that trait for each artifact kind.

/// Domain layer: value types and configuration.
pub mod domain;

/// Application layer: comparator and check driver.
pub mod application;

/// Infrastructure layer: concrete artifact extractors.
pub mod infrastructure;
