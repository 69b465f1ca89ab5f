//! TCP transport for the messaging channels.
//!
//! Every channel uses the length-prefixed frame codec from
//! [`irxr_core::protocol::frame`] over a plain TCP stream:
//!
//! - **`publisher`** – listens on the client topic port and fans every frame
//!   out to all connected subscribers.
//! - **`subscriber`** – connects to the server topic port and polls without
//!   blocking, reading only as far as the next complete frame.
//! - **`requester`** – connects to the server service port; sends one request
//!   frame and blocks (optionally until a deadline) for the reply frames.
//!
//! The UDP discovery socket lives in [`crate::infrastructure::discovery`].

pub mod publisher;
pub mod requester;
pub mod subscriber;

use std::time::Duration;

use irxr_core::{decode_frame, Frame, FrameError};
use tracing::debug;

use crate::application::transport::{
    DiscoverySocket, PublisherSocket, RequesterSocket, SubscriberSocket, Transport,
    TransportError,
};
use crate::infrastructure::discovery::UdpDiscoverySocket;

pub use publisher::TcpPublisher;
pub use requester::TcpRequester;
pub use subscriber::TcpSubscriber;

/// Upper bound on a single outbound connection attempt.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Size of the scratch buffer used for each socket read.
pub(crate) const READ_CHUNK: usize = 64 * 1024;

/// Creates UDP discovery and TCP messaging sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for TcpTransport {
    fn discovery(&self, port: u16) -> Result<Box<dyn DiscoverySocket>, TransportError> {
        Ok(Box::new(UdpDiscoverySocket::bind(port)?))
    }

    fn publisher(&self) -> Box<dyn PublisherSocket> {
        Box::new(TcpPublisher::new())
    }

    fn subscriber(&self) -> Box<dyn SubscriberSocket> {
        Box::new(TcpSubscriber::new())
    }

    fn requester(&self) -> Box<dyn RequesterSocket> {
        Box::new(TcpRequester::new())
    }

    fn cleanup(&self) {
        debug!("tcp transport released");
    }
}

/// Accumulates stream bytes and yields complete frames.
#[derive(Debug, Default)]
pub(crate) struct FrameBuffer {
    bytes: Vec<u8>,
}

impl FrameBuffer {
    pub(crate) fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, or `None` if more bytes are needed.
    ///
    /// A corrupt stream clears the buffer: there is no way to resynchronise
    /// on a frame boundary afterwards.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        match decode_frame(&self.bytes) {
            Ok((frame, used)) => {
                self.bytes.drain(..used);
                Ok(Some(frame))
            }
            Err(e) if e.is_incomplete() => Ok(None),
            Err(e) => {
                self.bytes.clear();
                Err(e)
            }
        }
    }

    /// Discards everything and returns the number of complete frames dropped.
    pub(crate) fn discard(&mut self) -> usize {
        let mut count = 0;
        while let Ok(Some(_)) = self.next_frame() {
            count += 1;
        }
        self.bytes.clear();
        count
    }

    /// Buffered byte count.
    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }
}
