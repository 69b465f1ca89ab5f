//! Socket abstractions the application layer drives.
//!
//! The client talks to the server over four channels that follow different
//! messaging patterns.  Each pattern is a small trait so the connection logic
//! can be tested against an in-memory network and so another transport (for
//! example a native ZeroMQ binding) can be dropped in per platform:
//!
//! | Trait                | Pattern            | Blocking?                      |
//! |----------------------|--------------------|--------------------------------|
//! | [`DiscoverySocket`]  | raw UDP datagrams  | never (`try_recv_datagram`)    |
//! | [`PublisherSocket`]  | publish            | never                          |
//! | [`SubscriberSocket`] | subscribe          | never (`try_recv_frame`)       |
//! | [`RequesterSocket`]  | request / reply    | `recv_frame` waits for a reply |
//!
//! A [`Transport`] is the factory that creates one of each, and owns any
//! process-wide state the sockets share (released by [`Transport::cleanup`]).
//!
//! # Wire compatibility
//!
//! The shipped [`TcpTransport`](crate::infrastructure::tcp::TcpTransport)
//! speaks the length-prefixed framing of [`irxr_core::protocol::frame`] over
//! plain TCP.  It is **not** wire compatible with a ZeroMQ (ZMTP) server such
//! as a NetMQ-based SimPub server: the UDP discovery datagram matches, but the
//! service and topic connections will not.  Talking to such a server needs a
//! ZeroMQ-backed implementation of these traits.

use std::net::SocketAddr;
use std::time::Instant;

use irxr_core::{Frame, FrameError};
use thiserror::Error;

/// Errors produced by transport sockets.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// An outbound connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The publisher was used before `bind`.
    #[error("socket is not bound")]
    NotBound,
    /// The socket was used before `connect`.
    #[error("socket is not connected")]
    NotConnected,
    /// The deadline passed before the reply was complete.
    #[error("timed out waiting for reply")]
    Timeout,
    /// The remote side closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// Inbound bytes did not form a valid frame.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),
    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Passive receiver for discovery announcements.
pub trait DiscoverySocket: Send {
    /// Returns the next pending datagram and its sender, or `None` if nothing
    /// is waiting.  Never blocks.
    fn try_recv_datagram(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError>;
}

/// Publishing half of the topic channel.
pub trait PublisherSocket: Send {
    /// Starts accepting subscribers on `addr`.  Binding again to the address
    /// already bound is a no-op.
    fn bind(&mut self, addr: SocketAddr) -> Result<(), TransportError>;

    /// Stops accepting subscribers and drops existing ones.
    fn unbind(&mut self);

    /// The address actually bound (port resolved if `0` was requested).
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Sends one frame to every connected subscriber.
    ///
    /// Returns [`TransportError::NotBound`] before `bind`.
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Subscribing half of the topic channel.
///
/// Subscribes to every topic: filtering happens on the client by topic table
/// lookup, never on the server.
pub trait SubscriberSocket: Send {
    /// Connects to a publisher at `addr`.
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError>;

    /// Disconnects.  Frames that already arrived stay buffered until
    /// [`drain`](SubscriberSocket::drain) is called.
    fn disconnect(&mut self);

    /// Discards every buffered inbound frame and returns how many were dropped.
    fn drain(&mut self) -> usize;

    /// Returns `true` while connected.
    fn is_connected(&self) -> bool;

    /// Returns the next complete frame's payload, or `None` if nothing is
    /// pending.  Never blocks.
    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Requesting half of the service channel.
pub trait RequesterSocket: Send {
    /// Connects to a replier at `addr`.  Connecting again to the current
    /// endpoint is a no-op.
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError>;

    /// Closes the connection and forgets the endpoint.
    fn disconnect(&mut self);

    /// The endpoint this socket is connected to.
    fn endpoint(&self) -> Option<SocketAddr>;

    /// Sends a single request frame.
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Waits for the next reply frame.
    ///
    /// With `deadline = None` this blocks until a frame arrives, however long
    /// that takes.  With a deadline it returns [`TransportError::Timeout`] once
    /// the deadline passes, and the implementation must discard any partial
    /// reply so it cannot be mistaken for the answer to the next request.
    fn recv_frame(&mut self, deadline: Option<Instant>) -> Result<Frame, TransportError>;
}

/// Factory for the sockets of one client.
pub trait Transport: Send {
    /// Binds the discovery receiver on `port`.
    fn discovery(&self, port: u16) -> Result<Box<dyn DiscoverySocket>, TransportError>;

    /// Creates an unbound publisher.
    fn publisher(&self) -> Box<dyn PublisherSocket>;

    /// Creates a disconnected subscriber.
    fn subscriber(&self) -> Box<dyn SubscriberSocket>;

    /// Creates a disconnected requester.
    fn requester(&self) -> Box<dyn RequesterSocket>;

    /// Releases process-wide transport state.
    ///
    /// Must only be called after every socket created by this transport has
    /// been dropped.
    fn cleanup(&self) {}
}
