//! One live MAVLink connection over UDP.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──heartbeat seen──▶ Connected ──close()──▶ Closed
//!                                  │
//!                                  ├──timeout──▶ HeartbeatTimeout (terminal)
//!                                  └──cancel───▶ Disconnected
//! ```
//!
//! # Threads
//!
//! A connected session owns exactly one background thread.  It is the only
//! reader of the socket:
//!
//! 1. It waits at most [`RECV_TIMEOUT`] for a datagram, so the stop flag is
//!    checked at least that often.  A timeout is not an error.
//! 2. It splits each datagram into frames, records HEARTBEATs on the
//!    [`LivenessBoard`], and runs the registered callbacks.
//! 3. Once per heartbeat interval it sends the session's own HEARTBEAT,
//!    provided a peer address is known.
//!
//! Sends from any thread go through one lock around the socket, so two
//! frames never interleave on the wire and sequence numbers follow send
//! order.
//!
//! Before the thread starts, `connect()` may wait for the first heartbeat
//! on the calling thread, reading the socket itself.  That wait also checks
//! the caller's cancel flag once per read timeout.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use navlink_core::protocol::{split_datagram, SequenceCounter, HEARTBEAT_ID};
use navlink_core::{encode_message, Dialect, Message, ProtocolError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{EndpointConfig, HarnessConfig};
use crate::infrastructure::address::{AddressError, LinkAddress};
use crate::infrastructure::dispatch::{Callback, DispatchTable, Inbound};
use crate::infrastructure::liveness::LivenessBoard;

/// Upper bound on one blocking receive.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// How long `close()` waits for the receive thread.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause after a receive error that is not a timeout.
const ERROR_BACKOFF: Duration = Duration::from_millis(50);

const MAX_DATAGRAM: usize = 65_536;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    HeartbeatTimeout,
    Closed,
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open {address}: {source}")]
    Bind {
        address: LinkAddress,
        #[source]
        source: io::Error,
    },

    #[error("no heartbeat on {address} within {timeout:?}")]
    HeartbeatTimeout {
        address: LinkAddress,
        timeout: Duration,
    },

    #[error("session on {address} is {state:?}")]
    InvalidState {
        address: LinkAddress,
        state: SessionState,
    },

    #[error("no peer address known yet on {address}")]
    NoPeer { address: LinkAddress },

    #[error("failed to encode {name}: {source}")]
    Encode {
        name: &'static str,
        #[source]
        source: ProtocolError,
    },

    #[error("send on {address} failed: {source}")]
    Send {
        address: LinkAddress,
        #[source]
        source: io::Error,
    },

    #[error("failed to start receive thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("connect on {address} was cancelled")]
    Cancelled { address: LinkAddress },
}

// ── Endpoint trait ────────────────────────────────────────────────────────────

/// What the conformance driver needs from a session.
#[cfg_attr(test, mockall::automock)]
pub trait Endpoint: Send + Sync {
    /// System id this endpoint sends as.
    fn identity(&self) -> u8;

    /// Opens the connection, optionally waiting up to `timeout` for the
    /// first heartbeat from anyone, then starts the receive thread.
    ///
    /// Setting `cancel` ends the heartbeat wait early; the socket is released
    /// and the session goes back to `Disconnected`.
    ///
    /// # Errors
    ///
    /// [`SessionError::HeartbeatTimeout`] if no heartbeat arrived in time;
    /// [`SessionError::Cancelled`] if `cancel` was set during the wait;
    /// [`SessionError::Bind`] if the socket could not be opened;
    /// [`SessionError::InvalidState`] unless the session is `Disconnected`.
    fn connect(
        &self,
        wait_for_peer_heartbeat: bool,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<(), SessionError>;

    /// Registers `callback` for a type name or [`WILDCARD`](super::dispatch::WILDCARD).
    fn on_message(&self, key: &str, callback: Callback);

    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Fails when not connected, when no peer is known yet, or on a socket
    /// error.
    fn send(&self, message: &Message) -> Result<(), SessionError>;

    /// `true` once a HEARTBEAT from `identity` has been seen; `false` after
    /// `timeout` otherwise.
    fn wait_for_heartbeat_from(&self, identity: u8, timeout: Duration) -> bool;

    /// Stops the receive thread and releases the socket.  Idempotent.
    fn close(&self);
}

// ── Session options ───────────────────────────────────────────────────────────

/// Everything needed to open one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub address: LinkAddress,
    pub identity: u8,
    pub component_id: u8,
    pub heartbeat_interval: Duration,
}

impl SessionOptions {
    /// Options for one configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if the connection string is invalid.
    pub fn from_config(
        endpoint: &EndpointConfig,
        config: &HarnessConfig,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            address: endpoint.address.parse()?,
            identity: endpoint.identity,
            component_id: config.component_id,
            heartbeat_interval: config.heartbeat_interval(),
        })
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// A UDP endpoint session.  See the module docs.
pub struct EndpointSession {
    dialect: Dialect,
    heartbeat_interval: Duration,
    shared: Arc<Shared>,
    reader: Mutex<Option<ReaderHandle>>,
}

struct ReaderHandle {
    join: JoinHandle<()>,
    /// Disconnects when the thread exits.
    done: mpsc::Receiver<()>,
}

/// State the receive thread shares with callers.
struct Shared {
    address: LinkAddress,
    identity: u8,
    component_id: u8,
    state: Mutex<SessionState>,
    /// Send side of the socket; `None` while not open.
    socket: Mutex<Option<UdpSocket>>,
    peer: Mutex<Option<SocketAddr>>,
    sequence: SequenceCounter,
    dispatch: DispatchTable,
    liveness: LivenessBoard,
    stop: AtomicBool,
}

impl EndpointSession {
    pub fn new(options: SessionOptions, dialect: Dialect) -> Self {
        Self {
            dialect,
            heartbeat_interval: options.heartbeat_interval,
            shared: Arc::new(Shared {
                address: options.address,
                identity: options.identity,
                component_id: options.component_id,
                state: Mutex::new(SessionState::Disconnected),
                socket: Mutex::new(None),
                peer: Mutex::new(None),
                sequence: SequenceCounter::new(),
                dispatch: DispatchTable::new(),
                liveness: LivenessBoard::new(),
                stop: AtomicBool::new(false),
            }),
            reader: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    pub fn address(&self) -> LinkAddress {
        self.shared.address
    }

    /// Local socket address while open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.shared.socket)
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    fn open(&self) -> Result<UdpSocket, SessionError> {
        let address = self.shared.address;
        let bind_err = |source| SessionError::Bind { address, source };

        let (socket, peer) = address.bind().map_err(bind_err)?;
        let read_timeout = RECV_TIMEOUT
            .min(self.heartbeat_interval)
            .max(Duration::from_millis(1));
        socket.set_read_timeout(Some(read_timeout)).map_err(bind_err)?;
        let reader = socket.try_clone().map_err(bind_err)?;

        *lock(&self.shared.peer) = peer;
        *lock(&self.shared.socket) = Some(socket);
        Ok(reader)
    }

    /// Reads the socket on the calling thread until any heartbeat arrives.
    ///
    /// `cancel` is checked at least once per socket read timeout.
    fn await_first_heartbeat(
        &self,
        socket: &UdpSocket,
        timer: &mut HeartbeatTimer,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> FirstHeartbeat {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        while Instant::now() < deadline && !self.shared.stop.load(Ordering::Relaxed) {
            if cancel.load(Ordering::Relaxed) {
                return FirstHeartbeat::Cancelled;
            }
            self.shared.emit_heartbeat_if_due(timer);
            match socket.recv_from(&mut buf) {
                Ok((len, src)) => {
                    // Only liveness matters here; other traffic is dropped.
                    self.shared.decode_datagram(&buf[..len], src, &self.dialect);
                    if self.shared.liveness.any() {
                        return FirstHeartbeat::Seen;
                    }
                }
                Err(e) if is_timeout_error(&e) => {}
                Err(e) => {
                    debug!(identity = self.shared.identity, "receive error while connecting: {e}");
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        if self.shared.liveness.any() {
            FirstHeartbeat::Seen
        } else {
            FirstHeartbeat::TimedOut
        }
    }

    fn spawn_reader(&self, socket: UdpSocket, timer: HeartbeatTimer) -> Result<(), SessionError> {
        let shared = Arc::clone(&self.shared);
        let dialect = self.dialect.clone();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(format!("navlink-session-{}", self.shared.identity))
            .spawn(move || {
                let _done = done_tx;
                reader_loop(&shared, &socket, &dialect, timer);
            })
            .map_err(SessionError::Spawn)?;

        *lock(&self.reader) = Some(ReaderHandle {
            join,
            done: done_rx,
        });
        Ok(())
    }
}

impl Endpoint for EndpointSession {
    fn identity(&self) -> u8 {
        self.shared.identity
    }

    fn connect(
        &self,
        wait_for_peer_heartbeat: bool,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<(), SessionError> {
        let address = self.shared.address;
        let identity = self.shared.identity;
        {
            let mut state = lock(&self.shared.state);
            if *state != SessionState::Disconnected {
                return Err(SessionError::InvalidState {
                    address,
                    state: *state,
                });
            }
            *state = SessionState::Connecting;
        }
        info!(identity, %address, "connecting");

        let reader_socket = match self.open() {
            Ok(socket) => socket,
            Err(e) => {
                self.shared.transition(SessionState::Connecting, SessionState::Disconnected);
                return Err(e);
            }
        };

        let mut timer = HeartbeatTimer::new(self.heartbeat_interval);
        if wait_for_peer_heartbeat {
            info!(identity, "waiting for heartbeat");
            match self.await_first_heartbeat(&reader_socket, &mut timer, timeout, cancel) {
                FirstHeartbeat::Seen => {}
                FirstHeartbeat::Cancelled => {
                    lock(&self.shared.socket).take();
                    self.shared
                        .transition(SessionState::Connecting, SessionState::Disconnected);
                    info!(identity, %address, "connect cancelled");
                    return Err(SessionError::Cancelled { address });
                }
                FirstHeartbeat::TimedOut => {
                    lock(&self.shared.socket).take();
                    if !self
                        .shared
                        .transition(SessionState::Connecting, SessionState::HeartbeatTimeout)
                    {
                        return Err(SessionError::InvalidState {
                            address,
                            state: self.state(),
                        });
                    }
                    warn!(identity, %address, "no heartbeat received within {timeout:?}");
                    return Err(SessionError::HeartbeatTimeout { address, timeout });
                }
            }
        }

        if !self
            .shared
            .transition(SessionState::Connecting, SessionState::Connected)
        {
            lock(&self.shared.socket).take();
            return Err(SessionError::InvalidState {
                address,
                state: self.state(),
            });
        }
        if let Err(e) = self.spawn_reader(reader_socket, timer) {
            self.shared.transition(SessionState::Connected, SessionState::Closed);
            lock(&self.shared.socket).take();
            return Err(e);
        }
        info!(identity, %address, "connected");
        Ok(())
    }

    fn on_message(&self, key: &str, callback: Callback) {
        self.shared.dispatch.register(key, callback);
    }

    fn send(&self, message: &Message) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Connected {
            return Err(SessionError::InvalidState {
                address: self.shared.address,
                state,
            });
        }
        self.shared.transmit(message)?;
        debug!(identity = self.shared.identity, message = message.type_name(), "sent");
        Ok(())
    }

    fn wait_for_heartbeat_from(&self, identity: u8, timeout: Duration) -> bool {
        let seen = self.shared.liveness.wait_for(identity, timeout);
        debug!(
            identity = self.shared.identity,
            seen, "heartbeat wait for system {identity} ({timeout:?})"
        );
        seen
    }

    fn close(&self) {
        let previous = std::mem::replace(&mut *lock(&self.shared.state), SessionState::Closed);
        if previous == SessionState::Closed {
            return;
        }
        self.shared.stop.store(true, Ordering::Relaxed);

        let reader = lock(&self.reader).take();
        if let Some(reader) = reader {
            match reader.done.recv_timeout(JOIN_TIMEOUT) {
                Err(RecvTimeoutError::Timeout) => warn!(
                    identity = self.shared.identity,
                    "receive thread did not stop within {JOIN_TIMEOUT:?}; abandoning it"
                ),
                _ => {
                    if reader.join.join().is_err() {
                        warn!(identity = self.shared.identity, "receive thread panicked");
                    }
                }
            }
        }

        lock(&self.shared.socket).take();
        info!(identity = self.shared.identity, "closed");
    }
}

impl Drop for EndpointSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EndpointSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSession")
            .field("address", &self.shared.address)
            .field("identity", &self.shared.identity)
            .field("state", &self.state())
            .finish()
    }
}

// ── Shared internals ──────────────────────────────────────────────────────────

impl Shared {
    /// Moves `from` → `to`; `false` if the state was something else.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = lock(&self.state);
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Encodes and sends under the socket lock.
    fn transmit(&self, message: &Message) -> Result<(), SessionError> {
        let address = self.address;
        let peer = (*lock(&self.peer)).ok_or(SessionError::NoPeer { address })?;

        let guard = lock(&self.socket);
        let Some(socket) = guard.as_ref() else {
            return Err(SessionError::InvalidState {
                address,
                state: *lock(&self.state),
            });
        };
        let bytes = encode_message(message, self.sequence.next(), self.identity, self.component_id)
            .map_err(|source| SessionError::Encode {
                name: message.type_name(),
                source,
            })?;
        socket
            .send_to(&bytes, peer)
            .map_err(|source| SessionError::Send { address, source })?;
        Ok(())
    }

    fn emit_heartbeat_if_due(&self, timer: &mut HeartbeatTimer) {
        if !timer.due() {
            return;
        }
        match self.transmit(&Message::heartbeat()) {
            Ok(()) => debug!(identity = self.identity, "heartbeat sent"),
            Err(SessionError::NoPeer { .. }) => {}
            Err(e) => debug!(identity = self.identity, "heartbeat not sent: {e}"),
        }
    }

    /// Learns the peer, records heartbeats, and returns the decoded messages.
    fn decode_datagram(&self, data: &[u8], src: SocketAddr, dialect: &Dialect) -> Vec<Inbound> {
        if self.address.learns_peer() {
            *lock(&self.peer) = Some(src);
        }

        let mut out = Vec::new();
        for frame in split_datagram(data, dialect) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(identity = self.identity, %src, "dropping frame: {e}");
                    continue;
                }
            };
            match frame.message(dialect) {
                Ok(message) => {
                    if message.id() == HEARTBEAT_ID {
                        self.liveness.record(frame.header.system_id);
                    }
                    out.push(Inbound {
                        header: frame.header,
                        message,
                    });
                }
                Err(e) => debug!(identity = self.identity, "undecodable payload: {e}"),
            }
        }
        out
    }
}

fn reader_loop(shared: &Shared, socket: &UdpSocket, dialect: &Dialect, mut timer: HeartbeatTimer) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while !shared.stop.load(Ordering::Relaxed) {
        shared.emit_heartbeat_if_due(&mut timer);
        match socket.recv_from(&mut buf) {
            Ok((len, src)) => {
                for inbound in shared.decode_datagram(&buf[..len], src, dialect) {
                    shared.dispatch.dispatch(&inbound);
                }
            }
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                if !shared.stop.load(Ordering::Relaxed) {
                    warn!(identity = shared.identity, "reader error: {e}");
                }
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    debug!(identity = shared.identity, "receive thread stopped");
}

/// How the connect-time heartbeat wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirstHeartbeat {
    Seen,
    TimedOut,
    Cancelled,
}

/// Schedules the session's own HEARTBEAT.
#[derive(Debug)]
struct HeartbeatTimer {
    interval: Duration,
    next_due: Instant,
}

impl HeartbeatTimer {
    /// The first heartbeat is due immediately.
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: Instant::now(),
        }
    }

    fn due(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_due {
            self.next_due = now + self.interval;
            true
        } else {
            false
        }
    }
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
