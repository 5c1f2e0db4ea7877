//! Infrastructure layer: everything that touches a socket or a thread.
//!
//! - [`address`] parses `udpin:` / `udpout:` connection strings.
//! - [`dispatch`] is the type-keyed callback table.
//! - [`liveness`] tracks which systems have sent a HEARTBEAT.
//! - [`endpoint`] is the UDP session built from the three.

pub mod address;
pub mod dispatch;
pub mod endpoint;
pub mod liveness;

pub use address::{AddressError, LinkAddress};
pub use dispatch::{Callback, DispatchTable, Inbound, WILDCARD};
pub use endpoint::{Endpoint, EndpointSession, SessionError, SessionOptions, SessionState};
pub use liveness::LivenessBoard;
