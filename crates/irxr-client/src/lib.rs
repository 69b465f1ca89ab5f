//! irxr-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does irxr-client do? (for beginners)
//!
//! A simulation server on the LAN announces itself with a UDP broadcast about
//! once per second.  The client:
//!
//! 1. Hears the announcement and picks the local IPv4 address on the same
//!    subnet as the server.
//! 2. Opens three channels to it: a request/response channel for services, a
//!    subscriber for the server's topics, and a publisher for its own topics.
//! 3. Registers itself (name, address, topics, services) with the server's
//!    `Register` service.
//! 4. Tears everything down when the announcements stop, and starts over
//!    when they resume.
//!
//! # Wire compatibility
//!
//! The bundled transport frames messages over plain TCP.  Only the UDP
//! discovery datagram is compatible with a ZeroMQ-based SimPub server; the
//! service and topic channels need a server speaking the same TCP framing,
//! or a ZeroMQ implementation of the `application::transport` traits.
//!
//! The whole thing is driven by [`NetManager::tick`](application::net_manager::NetManager::tick),
//! called from the host's frame loop.

/// Application layer: channels, registry and the connection state machine.
pub mod application;

/// Infrastructure layer: sockets, interface enumeration and config.
pub mod infrastructure;
