//! Conformance test driver.
//!
//! # Flow
//!
//! ```text
//! build_message(name, params)           unknown name / bad params → error, no sockets
//!        │
//! connect vehicle 1, then vehicle 2     either fails → abort
//!        │
//! wildcard callback on both             target-type messages → received log
//!        │
//! 2 waits for 1's heartbeat, 1 for 2's  missing liveness is logged, not fatal
//!        │
//! send from vehicle 2, settle           interrupt flag checked while settling
//!        │
//! drain log → PASS if non-empty
//! ```
//!
//! Both sessions are closed on every path out of [`run_conformance`].
//! The connect and liveness waits also watch the interrupt flag, so Ctrl+C
//! ends the run within one [`SETTLE_TICK`] or socket read timeout.
//!
//! The received log is an unbounded channel: callbacks on the receive
//! threads push, and the driver drains it once the settle time is over.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use navlink_core::{BuildError, Catalog, Dialect, FieldValue, Message};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use crate::domain::{HarnessConfig, ReceivedRecord};
use crate::infrastructure::{Callback, Endpoint, Inbound, SessionError, WILDCARD};

/// Granularity of the interruptible liveness and settle waits.
const SETTLE_TICK: Duration = Duration::from_millis(50);

const RULE_WIDTH: usize = 60;

pub const PASSED_BANNER: &str = "*** TEST PASSED ***";
pub const FAILED_BANNER: &str = "*** TEST FAILED ***";

/// Why a conformance run could not produce a verdict.
#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("Unknown message: {0}. Use --list to see available messages.")]
    UnknownMessage(String),

    #[error("{0} is in the navlink catalog but has no dialect definition")]
    NotInDialect(String),

    #[error("Invalid parameters for {0}")]
    Build(#[from] BuildError),

    #[error("Failed to connect to vehicle {role} (system {identity}): {source}")]
    Connect {
        role: u8,
        identity: u8,
        #[source]
        source: SessionError,
    },

    #[error("Failed to send {name}: {source}")]
    Send {
        name: &'static str,
        #[source]
        source: SessionError,
    },

    #[error("Interrupted")]
    Interrupted,
}

impl ConformanceError {
    /// Constructor parameter names to show the user, for build errors.
    pub fn expected_parameters(&self) -> Option<&[String]> {
        match self {
            ConformanceError::Build(e) => Some(e.expected()),
            _ => None,
        }
    }
}

/// Resolves `name` (any case) through the catalog and builds the message.
///
/// # Errors
///
/// [`ConformanceError::UnknownMessage`] for a name outside the catalog,
/// [`ConformanceError::Build`] for missing, unknown, or unrepresentable
/// parameters.
pub fn build_message(
    catalog: &Catalog,
    dialect: &Dialect,
    name: &str,
    params: &BTreeMap<String, FieldValue>,
) -> Result<Message, ConformanceError> {
    let upper = name.to_ascii_uppercase();
    let id = catalog
        .lookup(&upper)
        .ok_or_else(|| ConformanceError::UnknownMessage(name.to_string()))?;
    let def = dialect
        .get(id)
        .ok_or_else(|| ConformanceError::NotInDialect(upper.clone()))?;
    Ok(Message::build(def, params)?)
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Outcome of one cross-session heartbeat wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessCheck {
    pub observer: u8,
    pub target: u8,
    pub seen: bool,
}

/// What a completed run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConformanceReport {
    pub message_name: String,
    pub liveness: Vec<LivenessCheck>,
    pub records: Vec<ReceivedRecord>,
}

impl ConformanceReport {
    pub fn passed(&self) -> bool {
        !self.records.is_empty()
    }

    /// 0 when the message was observed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        writeln!(f, "{heavy}")?;
        writeln!(f, "TEST RESULTS")?;
        writeln!(f, "{heavy}")?;

        for check in self.liveness.iter().filter(|c| !c.seen) {
            writeln!(
                f,
                "  (no heartbeat from SYS {} seen by SYS {})",
                check.target, check.observer
            )?;
        }

        if self.passed() {
            for record in &self.records {
                writeln!(f, "  {record}")?;
            }
            writeln!(f)?;
            writeln!(f, "Total messages received: {}", self.records.len())?;
            writeln!(f)?;
            write!(f, "{PASSED_BANNER}")
        } else {
            writeln!(f, "  No messages received!")?;
            writeln!(f)?;
            write!(f, "{FAILED_BANNER}")
        }
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Runs steps 2–7 for an already built message.
///
/// `vehicle2` sends; both vehicles record target-type arrivals.  Both are
/// closed before this returns, whatever the outcome.
///
/// # Errors
///
/// [`ConformanceError::Connect`], [`ConformanceError::Send`], or
/// [`ConformanceError::Interrupted`].
pub fn run_conformance(
    vehicle1: &dyn Endpoint,
    vehicle2: &dyn Endpoint,
    message: &Message,
    config: &HarnessConfig,
    interrupt: &AtomicBool,
) -> Result<ConformanceReport, ConformanceError> {
    let result = drive(vehicle1, vehicle2, message, config, interrupt);
    vehicle1.close();
    vehicle2.close();
    result
}

fn drive(
    vehicle1: &dyn Endpoint,
    vehicle2: &dyn Endpoint,
    message: &Message,
    config: &HarnessConfig,
    interrupt: &AtomicBool,
) -> Result<ConformanceReport, ConformanceError> {
    for (role, vehicle) in [(1u8, vehicle1), (2u8, vehicle2)] {
        check_interrupt(interrupt)?;
        vehicle
            .connect(
                config.wait_for_heartbeat_on_connect,
                config.connect_timeout(),
                interrupt,
            )
            .map_err(|source| match source {
                SessionError::Cancelled { .. } => ConformanceError::Interrupted,
                source => ConformanceError::Connect {
                    role,
                    identity: vehicle.identity(),
                    source,
                },
            })?;
    }

    let target = message.type_name();
    let (tx, mut rx) = mpsc::unbounded_channel();
    for vehicle in [vehicle1, vehicle2] {
        vehicle.on_message(WILDCARD, record_target(target, vehicle.identity(), tx.clone()));
    }
    drop(tx);

    let mut liveness = Vec::with_capacity(2);
    for (observer, peer) in [(vehicle2, vehicle1), (vehicle1, vehicle2)] {
        let seen = wait_for_liveness(
            observer,
            peer.identity(),
            config.liveness_timeout(),
            interrupt,
        )?;
        if seen {
            info!(
                observer = observer.identity(),
                "heartbeat from system {}",
                peer.identity()
            );
        } else {
            warn!(
                observer = observer.identity(),
                "no heartbeat from system {}; sending anyway",
                peer.identity()
            );
        }
        liveness.push(LivenessCheck {
            observer: observer.identity(),
            target: peer.identity(),
            seen,
        });
    }

    check_interrupt(interrupt)?;
    info!("sending {target} from system {}", vehicle2.identity());
    vehicle2
        .send(message)
        .map_err(|source| ConformanceError::Send {
            name: target,
            source,
        })?;

    info!("waiting {:?} for message routing", config.settle());
    settle(config.settle(), interrupt)?;

    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }

    Ok(ConformanceReport {
        message_name: target.to_string(),
        liveness,
        records,
    })
}

/// The wildcard callback: logs target-type arrivals at `receiver`.
fn record_target(
    target: &'static str,
    receiver: u8,
    log: UnboundedSender<ReceivedRecord>,
) -> Callback {
    Box::new(move |inbound: &Inbound| {
        if inbound.type_name() != target {
            return Ok(());
        }
        let record = ReceivedRecord {
            receiver_identity: receiver,
            sender_identity: inbound.sender(),
            type_name: target.to_string(),
            field_values: inbound.message.fields(),
        };
        info!("{record}");
        log.send(record)
            .map_err(|_| anyhow::anyhow!("received log is closed"))
    })
}

fn check_interrupt(interrupt: &AtomicBool) -> Result<(), ConformanceError> {
    if interrupt.load(Ordering::Relaxed) {
        Err(ConformanceError::Interrupted)
    } else {
        Ok(())
    }
}

/// Waits up to `timeout` for `observer` to see a heartbeat from `target`,
/// in [`SETTLE_TICK`] slices so an interrupt is noticed between them.
fn wait_for_liveness(
    observer: &dyn Endpoint,
    target: u8,
    timeout: Duration,
    interrupt: &AtomicBool,
) -> Result<bool, ConformanceError> {
    let deadline = Instant::now() + timeout;
    loop {
        check_interrupt(interrupt)?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        if observer.wait_for_heartbeat_from(target, (deadline - now).min(SETTLE_TICK)) {
            return Ok(true);
        }
    }
}

/// Sleeps for `duration`, waking early on interrupt.
fn settle(duration: Duration, interrupt: &AtomicBool) -> Result<(), ConformanceError> {
    let deadline = Instant::now() + duration;
    loop {
        check_interrupt(interrupt)?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep((deadline - now).min(SETTLE_TICK));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
