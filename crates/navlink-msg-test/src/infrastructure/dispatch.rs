//! Type-keyed callback table.
//!
//! Handlers are registered under a message type name or under [`WILDCARD`].
//! For each inbound message the exact-type handlers run first, then the
//! wildcard handlers, each group in registration order.
//!
//! A handler that returns an error or panics is logged and skipped; the
//! remaining handlers still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use navlink_core::protocol::FrameHeader;
use navlink_core::Message;
use tracing::{error, warn};

/// Registration key that matches every message type.
pub const WILDCARD: &str = "*";

/// A decoded message together with the header it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub header: FrameHeader,
    pub message: Message,
}

impl Inbound {
    /// System id of the sender.
    pub fn sender(&self) -> u8 {
        self.header.system_id
    }

    pub fn type_name(&self) -> &'static str {
        self.message.type_name()
    }
}

/// A registered handler.
pub type Callback = Box<dyn Fn(&Inbound) -> anyhow::Result<()> + Send + Sync>;

type SharedCallback = Arc<dyn Fn(&Inbound) -> anyhow::Result<()> + Send + Sync>;

/// The callback table.  Safe to register into while dispatch is running.
#[derive(Default)]
pub struct DispatchTable {
    handlers: Mutex<HashMap<String, Vec<SharedCallback>>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to the handlers for `key`.
    pub fn register(&self, key: &str, callback: Callback) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push(Arc::from(callback));
    }

    /// Runs every matching handler; returns how many failed.
    ///
    /// The table lock is released before any handler runs, so a handler may
    /// register further handlers.
    pub fn dispatch(&self, inbound: &Inbound) -> usize {
        let type_name = inbound.type_name();
        let matched: Vec<SharedCallback> = {
            let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            let exact = handlers.get(type_name).into_iter().flatten();
            let wildcard = handlers.get(WILDCARD).into_iter().flatten();
            exact.chain(wildcard).cloned().collect()
        };

        let mut faults = 0;
        for handler in matched {
            match catch_unwind(AssertUnwindSafe(|| handler(inbound))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    faults += 1;
                    warn!(message = type_name, "callback error: {e:#}");
                }
                Err(_) => {
                    faults += 1;
                    error!(message = type_name, "callback panicked");
                }
            }
        }
        faults
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&String> = handlers.keys().collect();
        keys.sort();
        f.debug_struct("DispatchTable").field("keys", &keys).finish()
    }
}
