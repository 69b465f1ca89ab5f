//! UDP discovery receiver.
//!
//! The client binds a UDP socket on the discovery port (default 7720) and
//! waits for the server's `SimPub:` broadcasts.  The socket is non-blocking:
//! each tick asks "is a datagram waiting?" and returns immediately if not, so
//! the host's frame loop never stalls on discovery.
//!
//! # How UDP discovery works (for beginners)
//!
//! UDP is a connectionless protocol: a datagram is sent without a handshake
//! and may be lost.  That is fine for discovery because the server repeats its
//! announcement about once per second.
//!
//! 1. The server sends a datagram to the LAN broadcast address (or directly
//!    to a known client) on the discovery port.
//! 2. Every client listening on that port receives it, together with the
//!    sender's address.
//! 3. The sender's address is what the client later connects to, whatever
//!    the datagram's JSON claims.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use tracing::debug;

use crate::application::transport::{DiscoverySocket, TransportError};

/// Largest datagram accepted; announcements are far smaller.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Non-blocking UDP receiver bound on all interfaces.
pub struct UdpDiscoverySocket {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpDiscoverySocket {
    /// Binds `0.0.0.0:port` in non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the port is taken.
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::BindFailed { addr, source })?;
        socket.set_nonblocking(true)?;
        debug!("discovery socket bound on {addr}");
        Ok(Self {
            socket,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    /// The bound address (port resolved if `0` was requested).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DiscoverySocket for UdpDiscoverySocket {
    fn try_recv_datagram(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, src)) => Ok(Some((self.buf[..len].to_vec(), src))),
            Err(e) if is_would_block(&e) => Ok(None),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// Returns `true` for "nothing to read yet" errors.
pub(crate) fn is_would_block(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
