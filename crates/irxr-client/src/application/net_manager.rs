//! NetManager: discovery, liveness tracking, and the connection state machine.
//!
//! The manager is an explicit context object: the host constructs it once,
//! keeps it, and calls [`NetManager::tick`] at a fixed rate.  There are no
//! internal threads or timers; everything happens inside `tick` or inside the
//! request/publish calls the host makes.
//!
//! # State machine
//!
//! ```text
//!             announcement accepted (gate open)
//!   ┌──────┐ ─────────────────────────────────▶ ┌───────────┐
//!   │ Idle │                                    │ Connected │ ◀─┐ announcement:
//!   └──────┘ ◀───────────────────────────────── └───────────┘ ──┘ refresh liveness
//!             no announcement for > window
//! ```
//!
//! Connect sequence (in order): select the local IP, connect the service
//! channel, emit [`NetEvent::ServerDiscovered`], mark Connected, bind the
//! publisher, register with the server, emit [`NetEvent::ConnectionCompleted`],
//! start the subscription.
//!
//! Teardown sequence (in order): log, mark Idle, stop the subscription
//! (disconnect then drain), unbind the publisher, close the service channel,
//! emit [`NetEvent::Disconnected`].
//!
//! # Tick order
//!
//! 1. Liveness check; a teardown ends the tick.
//! 2. A topic stream the server dropped is reconnected (at most once per
//!    liveness window after the first attempt).
//! 3. At most one topic frame is dispatched.
//! 4. At most one discovery datagram is processed.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use irxr_core::protocol::{ClientPort, ServerPort};
use irxr_core::{decode_announcement, HostInfo, SubnetError, DEFAULT_SUBNET_MASK};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::pubsub::{PubSubChannel, TopicHandler};
use crate::application::registry::{Registry, ServiceHandler, REGISTER_SERVICE};
use crate::application::reqres::ReqResChannel;
use crate::application::subnet_matcher::{local_ip_in_same_subnet, InterfaceEnumerator};
use crate::application::transport::{DiscoverySocket, Transport, TransportError};

/// Error type for manager operations.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("subnet matching failed: {0}")]
    Subnet(#[from] SubnetError),
    #[error("not connected to a server")]
    NotConnected,
    #[error("failed to serialize host info: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("reply is not valid UTF-8: {0}")]
    InvalidReply(#[from] std::string::FromUtf8Error),
}

/// Runtime settings for the manager.
#[derive(Debug, Clone)]
pub struct NetManagerConfig {
    /// Name advertised to the server.
    pub host_name: String,
    /// UDP port the discovery listener binds.
    pub discovery_port: u16,
    /// Server port answering service requests.
    pub server_service_port: u16,
    /// Server port publishing topics.
    pub server_topic_port: u16,
    /// Local port the publisher binds (`0` lets the OS choose).
    pub client_topic_port: u16,
    /// Mask used to match the server's subnet.
    pub subnet_mask: Ipv4Addr,
    /// Tag every discovery datagram must start with.
    pub discovery_tag: String,
    /// How long the server may stay silent before the client disconnects.
    pub liveness_window: Duration,
    /// Deadline applied to requests.  `None` blocks until the server answers.
    pub request_timeout: Option<Duration>,
}

impl Default for NetManagerConfig {
    fn default() -> Self {
        Self {
            host_name: "UnityEditor".to_string(),
            discovery_port: ClientPort::Discovery.port(),
            server_service_port: ServerPort::Service.port(),
            server_topic_port: ServerPort::Topic.port(),
            client_topic_port: ClientPort::Topic.port(),
            subnet_mask: DEFAULT_SUBNET_MASK,
            discovery_tag: irxr_core::protocol::DISCOVERY_TAG.to_string(),
            liveness_window: Duration::from_secs(1),
            request_timeout: None,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
}

/// Lifecycle events, delivered in order through the channel returned by
/// [`NetManager::new`].
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// A server was accepted and the local address selected.
    ServerDiscovered { server: HostInfo, local_ip: Ipv4Addr },
    /// Publisher bound and registration sent.  `ack` is the server's reply to
    /// `Register`, or `None` if registration failed.
    ConnectionCompleted { ack: Option<String> },
    /// The server went silent and every channel was torn down.
    Disconnected,
}

/// The client's networking context.
pub struct NetManager {
    config: NetManagerConfig,
    transport: Box<dyn Transport>,
    interfaces: Box<dyn InterfaceEnumerator>,
    discovery: Option<Box<dyn DiscoverySocket>>,
    pubsub: PubSubChannel,
    reqres: ReqResChannel,
    registry: Registry,
    server_info: Option<HostInfo>,
    state: ConnectionState,
    last_announcement: Option<Instant>,
    last_connect_attempt: Option<Instant>,
    event_tx: mpsc::UnboundedSender<NetEvent>,
}

impl NetManager {
    /// Creates the manager, binds the discovery listener, and returns the
    /// manager together with its event receiver.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Transport`] if the discovery port cannot be bound.
    pub fn new(
        config: NetManagerConfig,
        transport: Box<dyn Transport>,
        interfaces: Box<dyn InterfaceEnumerator>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NetEvent>), NetError> {
        let discovery = transport.discovery(config.discovery_port)?;
        let pubsub = PubSubChannel::new(transport.publisher(), transport.subscriber());
        let reqres = ReqResChannel::new(transport.requester());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!(
            "listening for {} announcements on UDP {}",
            config.discovery_tag, config.discovery_port
        );

        let mgr = Self {
            registry: Registry::new(config.host_name.clone()),
            config,
            transport,
            interfaces,
            discovery: Some(discovery),
            pubsub,
            reqres,
            server_info: None,
            state: ConnectionState::Idle,
            last_announcement: None,
            last_connect_attempt: None,
            event_tx,
        };
        Ok((mgr, event_rx))
    }

    // ── Tick ──────────────────────────────────────────────────────────────────

    /// Runs one scheduler tick at the current time.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Runs one scheduler tick as if the current time were `now`.
    pub fn tick_at(&mut self, now: Instant) {
        if self.state == ConnectionState::Connected && self.liveness_expired(now) {
            self.disconnect();
            return;
        }

        if self.state == ConnectionState::Connected {
            if let Err(e) = self
                .pubsub
                .resubscribe_if_lost(now, self.config.liveness_window)
            {
                warn!("topic channel reconnect failed: {e}");
            }
        }

        match self.pubsub.dispatch_one() {
            Ok(_) => {}
            Err(TransportError::Closed) => warn!("server closed the topic channel"),
            Err(e) => warn!("topic channel receive failed: {e}"),
        }

        self.poll_discovery(now);
    }

    fn liveness_expired(&self, now: Instant) -> bool {
        self.last_announcement
            .map_or(true, |t| now.saturating_duration_since(t) > self.config.liveness_window)
    }

    fn poll_discovery(&mut self, now: Instant) {
        let Some(socket) = self.discovery.as_mut() else {
            return;
        };
        let (datagram, src) = match socket.try_recv_datagram() {
            Ok(Some(pair)) => pair,
            Ok(None) => return,
            Err(e) => {
                warn!("discovery receive failed: {e}");
                return;
            }
        };

        match decode_announcement(&datagram, &self.config.discovery_tag, src.ip()) {
            Ok(peer) => self.accept_announcement(peer, now),
            Err(e) => debug!("dropping discovery datagram from {src}: {e}"),
        }
    }

    fn accept_announcement(&mut self, peer: HostInfo, now: Instant) {
        if self.state == ConnectionState::Connected {
            if let Some(current) = &self.server_info {
                if current.ip != peer.ip {
                    warn!(
                        "ignoring announcement from {} while connected to {}",
                        peer.ip, current.ip
                    );
                    return;
                }
            }
            self.server_info = Some(peer);
            self.last_announcement = Some(now);
            return;
        }

        let gate_open = self.last_connect_attempt.map_or(true, |t| {
            now.saturating_duration_since(t) > self.config.liveness_window
        });
        self.server_info = Some(peer);
        self.last_announcement = Some(now);
        if gate_open {
            self.connect(now);
        }
    }

    // ── Connection lifecycle ──────────────────────────────────────────────────

    fn connect(&mut self, now: Instant) {
        self.last_connect_attempt = Some(now);
        if let Err(e) = self.run_connect_sequence() {
            let server = self.server_ip().unwrap_or_default();
            error!("connection to server {server} failed: {e}");
            if self.state == ConnectionState::Connected {
                self.disconnect();
            } else {
                self.reqres.disconnect();
            }
        }
    }

    fn run_connect_sequence(&mut self) -> Result<(), NetError> {
        let server = self.server_info.clone().ok_or(NetError::NotConnected)?;
        let server_ip: Ipv4Addr = server
            .ip
            .parse()
            .map_err(|_| SubnetError::MalformedAddress(server.ip.clone()))?;
        let local_ip =
            local_ip_in_same_subnet(&server.ip, self.config.subnet_mask, self.interfaces.as_ref())?;
        self.registry.set_local_ip(local_ip);
        info!("discovered server {} at {server_ip} with local IP {local_ip}", server.name);

        self.connect_service()?;
        self.emit(NetEvent::ServerDiscovered { server, local_ip });
        self.state = ConnectionState::Connected;

        self.pubsub
            .bind_publisher(SocketAddr::new(local_ip.into(), self.config.client_topic_port))?;
        let ack = match self.register_info_to_server() {
            Ok(ack) => ack,
            Err(e) => {
                error!("registration failed: {e}");
                None
            }
        };
        self.emit(NetEvent::ConnectionCompleted { ack });

        self.start_subscription()?;
        Ok(())
    }

    fn disconnect(&mut self) {
        info!("disconnected");
        self.state = ConnectionState::Idle;
        self.stop_subscription();
        self.pubsub.unbind_publisher();
        self.reqres.disconnect();
        self.emit(NetEvent::Disconnected);
    }

    fn emit(&self, event: NetEvent) {
        // A dropped receiver only means the host stopped listening.
        let _ = self.event_tx.send(event);
    }

    fn server_ip(&self) -> Option<String> {
        self.server_info.as_ref().map(|s| s.ip.clone())
    }

    fn server_endpoint(&self, port: u16) -> Result<SocketAddr, NetError> {
        let ip = self.server_ip().ok_or(NetError::NotConnected)?;
        let ip: Ipv4Addr = ip.parse().map_err(|_| SubnetError::MalformedAddress(ip))?;
        Ok(SocketAddr::new(ip.into(), port))
    }

    // ── Channels ──────────────────────────────────────────────────────────────

    /// Connects the service channel to the current server.
    ///
    /// # Errors
    ///
    /// [`NetError::NotConnected`] if no server has been discovered yet.
    pub fn connect_service(&mut self) -> Result<(), NetError> {
        let addr = self.server_endpoint(self.config.server_service_port)?;
        self.reqres.connect(addr)?;
        Ok(())
    }

    /// (Re)starts the topic subscription against the current server.
    ///
    /// # Errors
    ///
    /// [`NetError::NotConnected`] if no server has been discovered yet.
    pub fn start_subscription(&mut self) -> Result<(), NetError> {
        let addr = self.server_endpoint(self.config.server_topic_port)?;
        self.pubsub.start_subscription(addr)?;
        Ok(())
    }

    /// Stops the topic subscription, discarding buffered frames.
    pub fn stop_subscription(&mut self) {
        self.pubsub.stop_subscription();
    }

    /// Installs the handler for `topic`.  Handlers run inside [`tick`](Self::tick).
    pub fn subscribe_topic(&mut self, topic: &str, handler: TopicHandler) {
        self.pubsub.subscribe_topic(topic, handler);
    }

    /// Removes the handler for `topic`.
    pub fn unsubscribe_topic(&mut self, topic: &str) -> bool {
        self.pubsub.unsubscribe_topic(topic)
    }

    /// Publishes `payload` on `topic` through the local publisher.
    ///
    /// # Errors
    ///
    /// [`NetError::Transport`] with `NotBound` while disconnected.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), NetError> {
        self.pubsub.publish(topic, payload)?;
        Ok(())
    }

    /// Publishes a string payload on `topic`.
    pub fn publish_string(&mut self, topic: &str, payload: &str) -> Result<(), NetError> {
        self.publish(topic, payload.as_bytes())
    }

    /// Adds `topic` to the advertised topics and re-registers with the server.
    ///
    /// A duplicate only logs a warning.  Returns `true` if the topic was new.
    pub fn create_topic(&mut self, topic: &str) -> bool {
        let added = self.registry.add_topic(topic);
        if let Err(e) = self.register_info_to_server() {
            error!("re-registration after creating topic {topic} failed: {e}");
        }
        added
    }

    /// Sends the local identity to the server's `Register` service.
    ///
    /// Returns `Ok(None)` without any network traffic while Idle.
    ///
    /// # Errors
    ///
    /// Propagates serialization and request failures.
    pub fn register_info_to_server(&mut self) -> Result<Option<String>, NetError> {
        if self.state != ConnectionState::Connected {
            return Ok(None);
        }
        let envelope = self.registry.envelope()?;
        let ack = self.request_string(REGISTER_SERVICE, &envelope)?;
        debug!("server acknowledged registration: {ack}");
        Ok(Some(ack))
    }

    /// Installs the handler for `service`.
    pub fn register_service_callback(&mut self, service: &str, handler: ServiceHandler) {
        self.registry.register_service_callback(service, handler);
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    /// Calls `service` with a string body and returns the string reply.
    ///
    /// Blocks until the reply is complete, bounded only by
    /// `request_timeout` from the config.
    pub fn request_string(&mut self, service: &str, body: &str) -> Result<String, NetError> {
        let deadline = self.default_deadline();
        self.request_string_until(service, body, deadline)
    }

    /// Calls `service` with a byte body and returns the byte reply.
    pub fn request_bytes(&mut self, service: &str, body: &[u8]) -> Result<Vec<u8>, NetError> {
        let deadline = self.default_deadline();
        self.request_bytes_until(service, body, deadline)
    }

    /// Like [`request_string`](Self::request_string) with an explicit deadline.
    pub fn request_string_until(
        &mut self,
        service: &str,
        body: &str,
        deadline: Option<Instant>,
    ) -> Result<String, NetError> {
        let reply = self.request_bytes_until(service, body.as_bytes(), deadline)?;
        Ok(String::from_utf8(reply)?)
    }

    /// Like [`request_bytes`](Self::request_bytes) with an explicit deadline.
    pub fn request_bytes_until(
        &mut self,
        service: &str,
        body: &[u8],
        deadline: Option<Instant>,
    ) -> Result<Vec<u8>, NetError> {
        if !self.reqres.is_connected() {
            return Err(NetError::NotConnected);
        }
        Ok(self.reqres.request(service, body, deadline)?)
    }

    fn default_deadline(&self) -> Option<Instant> {
        self.config.request_timeout.map(|t| Instant::now() + t)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// The currently tracked server, if one has been discovered.
    pub fn server_info(&self) -> Option<&HostInfo> {
        self.server_info.as_ref()
    }

    /// This client's identity record.
    pub fn local_info(&self) -> &HostInfo {
        self.registry.local()
    }

    pub fn host_name(&self) -> &str {
        &self.config.host_name
    }

    /// The address the publisher is bound to, if any.
    pub fn publisher_addr(&self) -> Option<SocketAddr> {
        self.pubsub.publisher_addr()
    }

    pub fn config(&self) -> &NetManagerConfig {
        &self.config
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    /// Disposes every socket and releases the transport.
    ///
    /// Order: discovery socket, messaging sockets, then transport cleanup.
    pub fn shutdown(mut self) {
        info!("shutting down network manager");
        self.discovery = None;

        let Self {
            pubsub,
            reqres,
            transport,
            ..
        } = self;
        drop(pubsub);
        drop(reqres);
        transport.cleanup();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
