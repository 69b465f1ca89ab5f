//! Fan-out publisher over TCP.
//!
//! The publisher owns a non-blocking listener.  Subscribers are accepted
//! lazily at the start of every send, and a subscriber whose write fails is
//! dropped from the fan-out list.  Publishing with nobody connected is not an
//! error: the frame is simply not delivered, exactly like a broker-less
//! publish socket.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use irxr_core::{encode_frame, Frame};
use tracing::{debug, warn};

use crate::application::transport::{PublisherSocket, TransportError};
use crate::infrastructure::discovery::is_would_block;

/// A slow subscriber may hold a send for at most this long.
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// TCP publisher socket.
#[derive(Debug, Default)]
pub struct TcpPublisher {
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    requested: Option<SocketAddr>,
    subscribers: Vec<TcpStream>,
}

impl TcpPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribers currently in the fan-out list.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Accepts every pending subscriber without blocking.
    pub fn accept_pending(&mut self) {
        let Some(listener) = &self.listener else {
            return;
        };
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = configure(&stream) {
                        warn!("rejecting subscriber {peer}: {e}");
                        continue;
                    }
                    debug!("subscriber {peer} connected");
                    self.subscribers.push(stream);
                }
                Err(e) if is_would_block(&e) => break,
                Err(e) => {
                    warn!("accept on publisher failed: {e}");
                    break;
                }
            }
        }
    }
}

fn configure(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))
}

impl PublisherSocket for TcpPublisher {
    fn bind(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        if self.listener.is_some() && self.requested == Some(addr) {
            return Ok(());
        }
        self.unbind();

        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::BindFailed { addr, source })?;
        listener.set_nonblocking(true)?;
        self.local_addr = Some(listener.local_addr()?);
        self.requested = Some(addr);
        self.listener = Some(listener);
        Ok(())
    }

    fn unbind(&mut self) {
        self.listener = None;
        self.local_addr = None;
        self.requested = None;
        self.subscribers.clear();
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.listener.is_none() {
            return Err(TransportError::NotBound);
        }
        self.accept_pending();

        let bytes = encode_frame(&Frame::last(payload.to_vec()))?;
        self.subscribers.retain_mut(|stream| match stream.write_all(&bytes) {
            Ok(()) => true,
            Err(e) => {
                debug!("dropping subscriber: {e}");
                false
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::time::Instant;

    fn loopback_any() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_send_before_bind_is_not_bound() {
        let mut publisher = TcpPublisher::new();
        assert!(matches!(
            publisher.send_frame(b"t:1"),
            Err(TransportError::NotBound)
        ));
    }

    #[test]
    fn test_bind_resolves_ephemeral_port_and_unbind_clears_it() {
        // Arrange
        let mut publisher = TcpPublisher::new();

        // Act
        publisher.bind(loopback_any()).unwrap();
        let bound = publisher.local_addr().unwrap();
        publisher.unbind();

        // Assert
        assert_ne!(bound.port(), 0);
        assert!(publisher.local_addr().is_none());
    }

    #[test]
    fn test_rebinding_same_address_is_noop() {
        let mut publisher = TcpPublisher::new();
        publisher.bind(loopback_any()).unwrap();
        let first = publisher.local_addr();

        publisher.bind(loopback_any()).unwrap();

        assert_eq!(publisher.local_addr(), first);
    }

    #[test]
    fn test_frame_reaches_connected_subscriber() {
        // Arrange
        let mut publisher = TcpPublisher::new();
        publisher.bind(loopback_any()).unwrap();
        let mut subscriber = TcpStream::connect(publisher.local_addr().unwrap()).unwrap();
        subscriber
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        // Act: keep publishing until the listener has accepted the subscriber.
        let deadline = Instant::now() + Duration::from_secs(2);
        while publisher.subscriber_count() == 0 && Instant::now() < deadline {
            publisher.send_frame(b"warmup:0").unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        publisher.send_frame(b"pose:1").unwrap();

        // Assert: the last frame on the wire is ours.
        let expected = encode_frame(&Frame::last(b"pose:1".to_vec())).unwrap();
        let mut received = Vec::new();
        let mut chunk = [0u8; 256];
        while !received.ends_with(&expected) {
            let n = subscriber.read(&mut chunk).unwrap();
            assert!(n > 0, "publisher closed the stream");
            received.extend_from_slice(&chunk[..n]);
        }
    }
}
