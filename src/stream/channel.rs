//! Stream channel: owns the connection to the remote controller.
//!
//! `connect` returns immediately and performs the handshake on a background
//! thread; completion is observed through [`StreamChannel::state`] or
//! [`StreamChannel::wait_until_ready`]. Sends are synchronous on the caller's
//! thread. The link is guarded by a mutex, so connect, send and disconnect
//! issued from different threads never interleave on a half-closed transport.
//!
//! A send checks the transport out of the link and writes without holding
//! the lock. A hung write therefore never blocks teardown: `disconnect` and
//! `connect` interrupt the checked-out transport, the blocked send returns an
//! error, and the transport is dropped instead of being put back.
//!
//! There is no retry, buffering or reconnection. A failed send marks the
//! channel as failed; later sends try the same transport again until a new
//! `connect` is issued from outside.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::tracking::{ControlFlags, Pose};

use super::error::StreamError;
use super::message::PoseMessage;
use super::transport::{Connector, Interrupt, Transport};

/// Close reason sent when the operator ends the session.
pub const DEFAULT_CLOSE_REASON: &str = "Exited App Session";

/// Poll interval used by [`StreamChannel::wait_until_ready`].
const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Liveness of the stream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No connection, either never connected or explicitly disconnected.
    Disconnected = 0,
    /// Handshake in flight.
    Connecting = 1,
    /// Handshake done and the last send (if any) succeeded.
    Connected = 2,
    /// The last send failed. The transport is kept and retried on the next send.
    SendFailed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::SendFailed,
            _ => ConnectionState::Disconnected,
        }
    }

    /// True only in the connected state.
    pub fn is_live(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Remote controller endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAddress {
    pub host: String,
    pub port: u16,
}

impl StreamAddress {
    /// Validate a host and a port as typed by the operator.
    pub fn new(host: &str, port: &str) -> Result<Self, StreamError> {
        let host = host.trim();
        let port = port.trim();
        if host.is_empty() || port.is_empty() {
            return Err(StreamError::InvalidAddress(
                "both host and port are required".to_string(),
            ));
        }
        if host.contains('/') || host.contains(char::is_whitespace) {
            return Err(StreamError::InvalidAddress(format!("bad host {:?}", host)));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| StreamError::InvalidAddress(format!("bad port {:?}", port)))?;
        if port == 0 {
            return Err(StreamError::InvalidAddress("port 0".to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl FromStr for StreamAddress {
    type Err = StreamError;

    /// Parse `host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            StreamError::InvalidAddress(format!("expected host:port, got {:?}", s))
        })?;
        Self::new(host, port)
    }
}

impl fmt::Display for StreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The connection slot. Only touched while holding the channel's mutex.
struct Link {
    /// `None` while disconnected and while a send has it checked out.
    transport: Option<Box<dyn Transport>>,
    /// Interrupt handle of the current transport, kept here during sends.
    interrupt: Option<Box<dyn Interrupt>>,
    /// A send is writing to the checked-out transport.
    in_flight: bool,
    address: Option<StreamAddress>,
    /// Bumped by every connect and disconnect; a background handshake only
    /// installs its transport if the generation it started with is current.
    generation: u64,
}

/// Persistent connection carrying one [`PoseMessage`] per emitted pose.
pub struct StreamChannel {
    connector: Arc<dyn Connector>,
    link: Mutex<Link>,
    state: AtomicU8,
    close_reason: String,
    messages_sent: AtomicU64,
}

impl StreamChannel {
    pub fn new(connector: Arc<dyn Connector>) -> Arc<Self> {
        Self::with_close_reason(connector, DEFAULT_CLOSE_REASON)
    }

    pub fn with_close_reason(connector: Arc<dyn Connector>, close_reason: &str) -> Arc<Self> {
        Arc::new(Self {
            connector,
            link: Mutex::new(Link {
                transport: None,
                interrupt: None,
                in_flight: false,
                address: None,
                generation: 0,
            }),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            close_reason: close_reason.to_string(),
            messages_sent: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Connection-liveness query for presentation layers.
    pub fn is_connected(&self) -> bool {
        self.state().is_live()
    }

    /// Endpoint of the current or last attempted connection.
    pub fn address(&self) -> Option<StreamAddress> {
        self.link.lock().address.clone()
    }

    /// Number of messages handed to the transport without error.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Start connecting to `address` without blocking.
    ///
    /// Any existing connection is closed first. The state moves to
    /// `Connecting`, then to `Connected` or back to `Disconnected` when the
    /// handshake thread finishes.
    pub fn connect(self: &Arc<Self>, address: StreamAddress) {
        let generation = {
            let mut link = self.link.lock();
            if let Err(e) = self.release(&mut link) {
                debug!("Closing previous connection failed: {}", e);
            }
            link.generation += 1;
            link.address = Some(address.clone());
            self.set_state(ConnectionState::Connecting);
            link.generation
        };

        let url = address.url();
        info!("Connecting to {}", url);

        let channel = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("stream-connect".to_string())
            .spawn(move || channel.finish_connect(&url, generation));

        if let Err(e) = spawned {
            warn!("Could not spawn connect thread: {}", e);
            let link = self.link.lock();
            if link.generation == generation {
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    fn finish_connect(&self, url: &str, generation: u64) {
        let result = self.connector.connect(url);

        let mut link = self.link.lock();
        if link.generation != generation {
            // Superseded by a later connect or disconnect while handshaking.
            if let Ok(mut stale) = result {
                if let Err(e) = stale.close(&self.close_reason) {
                    debug!("Closing superseded connection failed: {}", e);
                }
            }
            debug!("Discarding superseded connection to {}", url);
            return;
        }

        match result {
            Ok(transport) => {
                link.interrupt = transport.interrupter();
                link.transport = Some(transport);
                self.set_state(ConnectionState::Connected);
                info!("Connected to {}", url);
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                warn!("Connection to {} failed: {}", url, e);
            }
        }
    }

    /// Block until the handshake settles or `timeout` elapses.
    ///
    /// Returns whether the channel is connected.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.state() == ConnectionState::Connecting && Instant::now() < deadline {
            thread::sleep(READY_POLL_INTERVAL);
        }
        self.is_connected()
    }

    /// Serialize `pose` and `flags` and transmit them.
    ///
    /// Failures (including serialization) flip the state to `SendFailed` and
    /// are returned to the caller. A successful send restores `Connected`.
    /// Without any transport the send fails with `NotConnected` and the state
    /// is left as is.
    pub fn send(&self, pose: &Pose, flags: ControlFlags) -> Result<(), StreamError> {
        let text = match PoseMessage::new(pose, flags).to_json() {
            Ok(text) => text,
            Err(e) => {
                self.set_state(ConnectionState::SendFailed);
                warn!("Failed to serialize pose message: {}", e);
                return Err(e);
            }
        };

        let (mut transport, generation) = {
            let mut link = self.link.lock();
            let Some(transport) = link.transport.take() else {
                if link.in_flight {
                    return Err(StreamError::Send("another send is in progress".to_string()));
                }
                return Err(StreamError::NotConnected);
            };
            link.in_flight = true;
            (transport, link.generation)
        };

        let result = transport.send_text(text);

        let mut link = self.link.lock();
        link.in_flight = false;
        if link.generation != generation {
            // Torn down or replaced while writing; the transport is dead.
            debug!("Dropping transport released during a send");
            return result;
        }
        link.transport = Some(transport);

        match result {
            Ok(()) => {
                if self.state() != ConnectionState::Connected {
                    info!("Stream channel live again");
                }
                self.set_state(ConnectionState::Connected);
                self.messages_sent.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                if self.state() != ConnectionState::SendFailed {
                    warn!("Pose send failed: {}", e);
                } else {
                    debug!("Pose send failed again: {}", e);
                }
                self.set_state(ConnectionState::SendFailed);
                Err(e)
            }
        }
    }

    /// Close the connection with the configured reason.
    ///
    /// Safe to call without a connection (logged no-op). Also cancels a
    /// handshake that is still in flight, and interrupts a send blocked on
    /// the transport.
    pub fn disconnect(&self) -> Result<(), StreamError> {
        let mut link = self.link.lock();
        link.generation += 1;
        self.set_state(ConnectionState::Disconnected);

        if link.transport.is_none() && !link.in_flight {
            info!("No open connection, nothing to disconnect");
            return Ok(());
        }

        let result = self.release(&mut link);
        match &result {
            Ok(()) => info!("Disconnected ({})", self.close_reason),
            Err(e) => warn!("Disconnect did not complete cleanly: {}", e),
        }
        result
    }

    /// Close the installed transport, or interrupt it if a send has it
    /// checked out. The caller bumps the generation.
    fn release(&self, link: &mut Link) -> Result<(), StreamError> {
        let interrupt = link.interrupt.take();
        if let Some(mut transport) = link.transport.take() {
            return transport.close(&self.close_reason);
        }
        if link.in_flight {
            match interrupt {
                Some(interrupt) => {
                    warn!("Send in progress, interrupting the transport");
                    interrupt.interrupt();
                }
                None => warn!("Send in progress on a transport that cannot be interrupted"),
            }
        }
        Ok(())
    }
}
