//! The request/response service channel.
//!
//! A request is a single frame `<service>:<body>`.  The reply may span several
//! frames; every frame but the last carries the continuation flag and the
//! payloads are concatenated in arrival order.
//!
//! # Blocking hazard
//!
//! Without a deadline a request blocks the calling thread until the server
//! answers.  Because the client runs on the host's tick, a server that never
//! answers freezes every other per-tick job with it.  Pass a deadline (or set
//! `request_timeout_ms` in the config) to bound the wait; an expired request
//! resets the connection instead of leaving a stale reply in flight.

use std::net::SocketAddr;
use std::time::Instant;

use irxr_core::protocol::join_envelope;
use tracing::{info, warn};

use crate::application::transport::{RequesterSocket, TransportError};

/// Requester socket plus the request/reply framing rules.
pub struct ReqResChannel {
    requester: Box<dyn RequesterSocket>,
}

impl ReqResChannel {
    pub fn new(requester: Box<dyn RequesterSocket>) -> Self {
        Self { requester }
    }

    /// Connects to the server's service port at `addr`.
    ///
    /// Already connected to `addr`: no-op.  Connected elsewhere: the old
    /// connection is closed first.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        match self.requester.endpoint() {
            Some(current) if current == addr => return Ok(()),
            Some(_) => self.requester.disconnect(),
            None => {}
        }
        self.requester.connect(addr)?;
        info!("starting service connection to {addr}");
        Ok(())
    }

    /// Closes the service connection if open.
    pub fn disconnect(&mut self) {
        if let Some(addr) = self.requester.endpoint() {
            self.requester.disconnect();
            info!("closed service connection to {addr}");
        }
    }

    /// Returns `true` while connected.
    pub fn is_connected(&self) -> bool {
        self.requester.endpoint().is_some()
    }

    /// Sends `<service>:<body>` and returns the concatenated reply.
    ///
    /// # Errors
    ///
    /// - [`TransportError::NotConnected`] before [`connect`](Self::connect).
    /// - [`TransportError::Timeout`] if `deadline` passes first.
    /// - Any socket error raised while sending or receiving.
    pub fn request(
        &mut self,
        service: &str,
        body: &[u8],
        deadline: Option<Instant>,
    ) -> Result<Vec<u8>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.requester.send_frame(&join_envelope(service, body))?;

        let mut reply = Vec::new();
        loop {
            let frame = match self.requester.recv_frame(deadline) {
                Ok(frame) => frame,
                Err(TransportError::Timeout) => {
                    warn!("request {service} timed out; discarding partial reply");
                    return Err(TransportError::Timeout);
                }
                Err(e) => return Err(e),
            };
            reply.extend_from_slice(&frame.payload);
            if !frame.more {
                return Ok(reply);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
