// ============================================
// File: crates/decada-agent/src/session/manager.rs
// ============================================
//! # Session Manager
//!
//! ## Creation Reason
//! Owns the single authenticated broker connection: connecting with
//! bounded retries, publishing and subscribing under a send lock, and
//! running the inbound and keep-alive pumps for the life of the
//! connection.
//!
//! ## Main Functionality
//! - `SessionManager::connect()`: up to N attempts of DNS + TLS + CONNACK,
//!   each bounded by the connect timeout
//! - `publish()` / `subscribe()`: serialized on the link mutex
//! - Inbound pump: drains received packets, forwards PUBLISH frames to
//!   the dispatcher channel
//! - Keep-alive pump: PINGREQ before the keep-alive interval lapses
//! - `disconnect()`: DISCONNECT, pump cancellation, back to DISCONNECTED
//!
//! ## State Machine
//! ```text
//! ┌──────────────┐ connect() ┌────────────┐  CONNACK   ┌───────────┐
//! │ Disconnected │──────────►│ Connecting │───────────►│ Connected │
//! └──────────────┘           └─────┬──────┘            └─────┬─────┘
//!        ▲      retries exhausted  │                         │
//!        ├─────────────────────────┘                         │
//!        │     transport error / disconnect()                │
//!        └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Pump Scheduling
//! ```text
//! every loop_period:
//!   tick ─► cancelled? ─yes─► stop
//!             │ no
//!             ▼
//!   lock link ─► cancelled? ─yes─► release, stop
//!             │ no
//!             ▼
//!   recv/send ─► release ─► dispatch
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - There is no automatic reconnect; the owner watches the state
//! - The cancellation token is checked both before and after taking the
//!   link lock, so a pump never touches a connection being torn down
//! - Never hold the `connection` slot lock across an `.await`
//!
//! ## Last Modified
//! v0.1.0 - Initial session manager

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use decada_common::time::AtomicInstant;
use decada_core::error::CoreError;
use decada_core::protocol::{Codec, ConnectReturnCode, Packet, PacketCodec, Publish};
use decada_transport::{
    CredentialStore, Resolver, SecureSocket, SecureTransport, SocketEndpoint, TransportError,
    CA_CERTS_TAG, CLIENT_CERTS_TAG,
};

use super::credentials::SessionCredentials;
use crate::config::SessionConfig;
use crate::error::{AgentError, Result};

// ============================================
// Constants
// ============================================

/// How long one pump tick waits for more inbound bytes.
const POLL_WINDOW: Duration = Duration::from_millis(10);

/// Upper bound on reads per inbound tick.
const MAX_READS_PER_POLL: usize = 64;

/// Socket read chunk size.
const READ_CHUNK: usize = 4096;

/// Topic filters one SUBSCRIBE may carry (16-bit count on the wire).
const MAX_TOPICS_PER_SUBSCRIBE: usize = u16::MAX as usize;

/// SUBACK return code signalling failure.
const SUBACK_FAILURE: u8 = 0x80;

// ============================================
// Public Types
// ============================================

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// `connect` in progress.
    Connecting,
    /// CONNACK accepted; pumps running.
    Connected,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload.
    pub payload: Bytes,
}

/// Anything that can publish on the session.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `payload` on `topic` with at-most-once delivery.
    ///
    /// # Errors
    /// Returns `NotConnected` or `PublishFailed`.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;
}

// ============================================
// Link
// ============================================

/// Socket plus its receive buffer; guarded by the send lock.
struct Link {
    socket: Box<dyn SecureSocket>,
    read_buf: BytesMut,
}

impl Link {
    fn new(socket: Box<dyn SecureSocket>) -> Self {
        Self {
            socket,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    async fn send_packet(&mut self, codec: &PacketCodec, packet: &Packet) -> Result<()> {
        let mut buf = BytesMut::new();
        codec.encode(packet, &mut buf)?;
        self.socket.send(&buf).await?;
        Ok(())
    }

    /// Reads once, waiting at most `timeout`.
    async fn read_some(&mut self, timeout: Duration) -> std::result::Result<usize, TransportError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.socket.recv(&mut chunk, timeout).await?;
        self.read_buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Reads everything currently available.
    async fn poll(&mut self) -> Result<()> {
        for _ in 0..MAX_READS_PER_POLL {
            match self.read_some(POLL_WINDOW).await {
                Ok(_) => {}
                Err(e) if e.is_timeout() => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Decodes the next complete packet in the buffer.
    fn next_packet(&mut self, codec: &PacketCodec) -> Result<Option<Packet>> {
        match PacketCodec::check_complete(&self.read_buf)? {
            Some(len) => {
                let mut frame = self.read_buf.split_to(len).freeze();
                Ok(Some(codec.decode(&mut frame)?))
            }
            None => Ok(None),
        }
    }
}

// ============================================
// Connection
// ============================================

/// One live broker connection.
struct Connection {
    link: tokio::sync::Mutex<Link>,
    cancel: CancellationToken,
    last_inbound: AtomicInstant,
    last_outbound: AtomicInstant,
}

/// Background loops of one connection.
#[derive(Debug, Clone, Copy)]
enum Pump {
    Inbound,
    KeepAlive,
}

// ============================================
// SessionManager
// ============================================

/// Owner of the broker connection.
///
/// # Thread Safety
/// Shared as `Arc<SessionManager>`; every method takes `&self`.
pub struct SessionManager {
    config: SessionConfig,
    resolver: Arc<dyn Resolver>,
    transport: Arc<dyn SecureTransport>,
    credentials: Arc<CredentialStore>,
    inbound: mpsc::Sender<InboundMessage>,
    state: watch::Sender<SessionState>,
    connection: Mutex<Option<Arc<Connection>>>,
    packet_ids: AtomicU16,
    codec: PacketCodec,
}

impl SessionManager {
    /// Creates a disconnected session. Received PUBLISH frames are
    /// forwarded to `inbound`.
    pub fn new(
        config: SessionConfig,
        resolver: Arc<dyn Resolver>,
        transport: Arc<dyn SecureTransport>,
        credentials: Arc<CredentialStore>,
        inbound: mpsc::Sender<InboundMessage>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Arc::new(Self {
            config,
            resolver,
            transport,
            credentials,
            inbound,
            state,
            connection: Mutex::new(None),
            packet_ids: AtomicU16::new(1),
            codec: PacketCodec::new(),
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver observing every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn current(&self) -> Option<Arc<Connection>> {
        self.connection.lock().clone()
    }

    fn next_packet_id(&self) -> u16 {
        loop {
            let id = self.packet_ids.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    // ====== Connect ======

    /// Connects to the broker.
    ///
    /// # Errors
    /// - `AlreadyConnected` unless the session is disconnected
    /// - `ConnectFailed` once every attempt failed or timed out
    pub async fn connect(self: &Arc<Self>, credentials: &SessionCredentials) -> Result<()> {
        let acquired = self.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !acquired {
            return Err(AgentError::AlreadyConnected);
        }

        let attempts = self.config.connect_retries;
        let timeout = self.config.connect_timeout();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            info!(
                attempt,
                attempts,
                host = %credentials.broker_host,
                port = credentials.broker_port,
                "Connecting to broker"
            );
            match tokio::time::timeout(timeout, self.open_session(credentials)).await {
                Ok(Ok(link)) => {
                    self.establish(link);
                    info!(client_id = %credentials.client_id, "Broker session established");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Broker connection attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(attempt, timeout_secs = timeout.as_secs(), "Broker connection attempt timed out");
                    last_error = format!("timed out after {}ms", timeout.as_millis());
                }
            }
        }

        self.state.send_replace(SessionState::Disconnected);
        Err(AgentError::ConnectFailed {
            attempts,
            reason: last_error,
        })
    }

    /// DNS, TLS and the CONNECT/CONNACK exchange.
    async fn open_session(&self, credentials: &SessionCredentials) -> Result<Link> {
        let ip = self.resolver.resolve(&credentials.broker_host).await?;
        let endpoint = SocketEndpoint {
            ip,
            port: credentials.broker_port,
            sni_hostname: credentials.broker_host.clone(),
        };
        let tls = self
            .credentials
            .tls_credentials(CA_CERTS_TAG, Some(CLIENT_CERTS_TAG))?;
        let socket = self.transport.open_secure_socket(&endpoint, &tls).await?;

        let mut link = Link::new(socket);
        let connect = credentials.connect_packet(self.config.keep_alive_secs);
        link.send_packet(&self.codec, &Packet::Connect(connect)).await?;

        loop {
            if let Some(packet) = link.next_packet(&self.codec)? {
                return match packet {
                    Packet::ConnAck {
                        return_code: ConnectReturnCode::Accepted,
                        ..
                    } => Ok(link),
                    Packet::ConnAck { return_code, .. } => Err(AgentError::BrokerRejected {
                        reason: format!("{return_code:?}"),
                    }),
                    other => Err(CoreError::malformed(format!(
                        "expected CONNACK, received {:?}",
                        other.packet_type()
                    ))
                    .into()),
                };
            }
            link.read_some(self.config.connect_timeout()).await?;
        }
    }

    fn establish(self: &Arc<Self>, link: Link) {
        let connection = Arc::new(Connection {
            link: tokio::sync::Mutex::new(link),
            cancel: CancellationToken::new(),
            last_inbound: AtomicInstant::now(),
            last_outbound: AtomicInstant::now(),
        });
        *self.connection.lock() = Some(Arc::clone(&connection));
        self.state.send_replace(SessionState::Connected);
        self.spawn_pumps(&connection);
    }

    // ====== Pumps ======

    fn spawn_pumps(self: &Arc<Self>, connection: &Arc<Connection>) {
        self.spawn_pump(Pump::Inbound, connection);
        self.spawn_pump(Pump::KeepAlive, connection);
    }

    fn spawn_pump(self: &Arc<Self>, pump: Pump, connection: &Arc<Connection>) {
        let manager: Weak<Self> = Arc::downgrade(self);
        let connection = Arc::clone(connection);
        let period = self.config.loop_period();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = connection.cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let step = match pump {
                    Pump::Inbound => manager.pump_inbound(&connection).await,
                    Pump::KeepAlive => manager.pump_keep_alive(&connection).await,
                };
                if let Err(e) = step {
                    manager.connection_lost(&connection, &e);
                    break;
                }
            }
            debug!(?pump, "Pump stopped");
        });
    }

    async fn pump_inbound(&self, connection: &Connection) -> Result<()> {
        let mut packets = Vec::new();
        {
            let mut link = connection.link.lock().await;
            if connection.cancel.is_cancelled() {
                return Ok(());
            }
            link.poll().await?;
            while let Some(packet) = link.next_packet(&self.codec)? {
                if let Packet::Publish(Publish {
                    qos: 1,
                    packet_id: Some(packet_id),
                    ..
                }) = &packet
                {
                    link.send_packet(&self.codec, &Packet::PubAck { packet_id: *packet_id })
                        .await?;
                }
                packets.push(packet);
            }
        }

        if !packets.is_empty() {
            connection.last_inbound.touch();
        }
        for packet in packets {
            self.handle_packet(packet);
        }
        Ok(())
    }

    fn handle_packet(&self, packet: Packet) {
        match packet {
            Packet::Publish(publish) => {
                debug!(topic = %publish.topic, bytes = publish.payload.len(), "Inbound message");
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                match self.inbound.try_send(message) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(message)) => {
                        warn!(topic = %message.topic, "Dispatcher busy, inbound message dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(message)) => {
                        warn!(topic = %message.topic, "No dispatcher, inbound message dropped");
                    }
                }
            }
            Packet::SubAck {
                packet_id,
                return_codes,
            } => {
                if return_codes.contains(&SUBACK_FAILURE) {
                    warn!(packet_id, ?return_codes, "Subscription rejected by broker");
                } else {
                    debug!(packet_id, ?return_codes, "Subscription acknowledged");
                }
            }
            Packet::PingResp => debug!("Keep-alive acknowledged"),
            other => debug!(packet_type = ?other.packet_type(), "Ignoring packet"),
        }
    }

    async fn pump_keep_alive(&self, connection: &Connection) -> Result<()> {
        let keep_alive = Duration::from_secs(u64::from(self.config.keep_alive_secs));
        if connection.last_inbound.has_elapsed(keep_alive + keep_alive / 2) {
            return Err(TransportError::timeout(
                "keep-alive",
                u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX),
            )
            .into());
        }
        if !connection.last_outbound.has_elapsed(keep_alive / 2) {
            return Ok(());
        }

        let mut link = connection.link.lock().await;
        if connection.cancel.is_cancelled() {
            return Ok(());
        }
        link.send_packet(&self.codec, &Packet::PingReq).await?;
        connection.last_outbound.touch();
        debug!("Keep-alive sent");
        Ok(())
    }

    /// Tears down `connection` if it is still the current one.
    fn connection_lost(&self, connection: &Arc<Connection>, reason: &AgentError) {
        let mut slot = self.connection.lock();
        if !slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, connection)) {
            return;
        }
        *slot = None;
        connection.cancel.cancel();
        self.state.send_replace(SessionState::Disconnected);
        warn!(error = %reason, "Broker connection lost");
    }

    // ====== Publish / Subscribe ======

    async fn send_on_current(&self, packet: &Packet) -> Result<Arc<Connection>> {
        let connection = self.current().ok_or(AgentError::NotConnected)?;
        let result = {
            let mut link = connection.link.lock().await;
            if connection.cancel.is_cancelled() {
                Err(AgentError::NotConnected)
            } else {
                link.send_packet(&self.codec, packet).await
            }
        };
        match result {
            Ok(()) => {
                connection.last_outbound.touch();
                Ok(connection)
            }
            Err(e) => {
                if e.is_connection_loss() {
                    self.connection_lost(&connection, &e);
                }
                Err(e)
            }
        }
    }

    /// Publishes at most once.
    ///
    /// # Errors
    /// - `NotConnected` without a live connection
    /// - `PublishFailed` if encoding or sending fails
    pub async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        let len = payload.len();
        let packet = Packet::Publish(Publish::at_most_once(topic, payload));
        match self.send_on_current(&packet).await {
            Ok(_) => {
                debug!(topic, bytes = len, "Published");
                Ok(())
            }
            Err(AgentError::NotConnected) => Err(AgentError::NotConnected),
            Err(e) => Err(AgentError::publish_failed(topic, e.to_string())),
        }
    }

    /// Subscribes to `topics` at QoS 0. The SUBACK is handled by the
    /// inbound pump.
    ///
    /// # Errors
    /// - `NotConnected` without a live connection
    /// - `SubscribeFailed` for an empty or oversized topic list, or a send
    ///   failure
    pub async fn subscribe(&self, topics: &[String]) -> Result<()> {
        if topics.is_empty() {
            return Err(AgentError::SubscribeFailed {
                reason: "no topics".into(),
            });
        }
        if topics.len() > MAX_TOPICS_PER_SUBSCRIBE {
            return Err(AgentError::SubscribeFailed {
                reason: format!("{} topics exceed the limit of {MAX_TOPICS_PER_SUBSCRIBE}", topics.len()),
            });
        }
        let packet_id = self.next_packet_id();
        let packet = Packet::Subscribe {
            packet_id,
            topics: topics.to_vec(),
        };
        match self.send_on_current(&packet).await {
            Ok(_) => {
                info!(packet_id, ?topics, "Subscribed");
                Ok(())
            }
            Err(AgentError::NotConnected) => Err(AgentError::NotConnected),
            Err(e) => Err(AgentError::SubscribeFailed {
                reason: e.to_string(),
            }),
        }
    }

    // ====== Disconnect ======

    /// Sends DISCONNECT, stops the pumps and closes the socket. Does
    /// nothing when already disconnected.
    ///
    /// # Errors
    /// Currently infallible; send and close failures are logged.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(connection) = self.connection.lock().take() else {
            return Ok(());
        };
        connection.cancel.cancel();
        {
            let mut link = connection.link.lock().await;
            if let Err(e) = link.send_packet(&self.codec, &Packet::Disconnect).await {
                debug!(error = %e, "DISCONNECT not delivered");
            }
            if let Err(e) = link.socket.close().await {
                debug!(error = %e, "Socket close failed");
            }
        }
        self.state.send_replace(SessionState::Disconnected);
        info!("Disconnected from broker");
        Ok(())
    }
}

#[async_trait]
impl Publisher for SessionManager {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        Self::publish(self, topic, payload).await
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
