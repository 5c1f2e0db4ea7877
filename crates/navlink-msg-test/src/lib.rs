//! navlink-msg-test library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does navlink-msg-test do? (for beginners)
//!
//! Two simulated vehicles talk to each other through a MAVLink router.  This
//! harness plays the part of both vehicles' ground-side links:
//!
//! 1. It builds one navlink message from `key=value` command-line parameters.
//! 2. It opens two UDP endpoint sessions, one per vehicle port, and waits
//!    for each to hear a HEARTBEAT.
//! 3. Each session runs one background thread that reads datagrams, emits
//!    the session's own HEARTBEAT, and hands decoded messages to registered
//!    callbacks.
//! 4. It sends the message from vehicle 2 and waits a fixed settle time.
//! 5. If the message arrived at the other side the test passes.
//!
//! # Architecture
//!
//! ```text
//! [navlink-msg-test]
//!   ├── domain/           parameter sniffing, HarnessConfig, ReceivedRecord
//!   ├── application/
//!   │     ├── conformance build, connect, liveness, send, settle, verdict
//!   │     └── listing     --list rendering
//!   └── infrastructure/
//!         ├── address     udpin:/udpout: connection strings
//!         ├── dispatch    type-keyed callback table with a wildcard key
//!         ├── liveness    last HEARTBEAT per system id
//!         └── endpoint    Endpoint trait and the UDP EndpointSession
//! ```

/// Domain layer: parameters, configuration, and received records.
pub mod domain;

/// Application layer: the conformance test driver.
pub mod application;

/// Infrastructure layer: addresses, callback dispatch, and endpoint sessions.
pub mod infrastructure;
