//! # navlink-core
//!
//! Shared library for the navlink verification tools: the message catalog,
//! the built-in dialect registry, and a MAVLink v2 frame codec.
//!
//! Both `navlink-crc-check` and `navlink-msg-test` depend on this crate.  It
//! has no dependency on sockets, files, or a runtime.
//!
//! # Architecture overview (for beginners)
//!
//! navlink is a set of custom MAVLink messages exchanged by a swarm of
//! autonomous vehicles (check-in, task auction, slot claims, voting, search
//! status).  Every build of the protocol (the autopilot's C headers, the
//! router's C headers, a scripting runtime) is generated independently from
//! the same XML definition, and any drift between them makes frames vanish
//! silently on the wire.
//!
//! This crate is the shared foundation:
//!
//! - **`catalog`** – Which navlink messages exist and which numeric id each one
//!   carries.  Built once in `main` and passed by reference.
//!
//! - **`protocol`** – Typed message definitions with CRC-extra computation
//!   (`dialect`), message values (`messages`), and the frame codec that turns
//!   them into bytes and back (`codec`).

pub mod catalog;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `navlink_core::Catalog` instead of `navlink_core::catalog::Catalog`.
pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use protocol::codec::{decode_frame, encode_message, ProtocolError};
pub use protocol::dialect::{Dialect, DialectError, MessageDef};
pub use protocol::messages::{BuildError, FieldValue, Message};
