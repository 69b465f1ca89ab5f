//! Blocking TCP requester.
//!
//! One request is in flight at a time: send a single frame, then read reply
//! frames until one arrives without the continuation flag.  A timed-out or
//! failed exchange resets the stream, and the next send reconnects to the same
//! endpoint, so a late reply can never be mistaken for the answer to a newer
//! request.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Instant;

use irxr_core::{encode_frame, Frame};
use tracing::{debug, warn};

use super::{FrameBuffer, CONNECT_TIMEOUT, READ_CHUNK};
use crate::application::transport::{RequesterSocket, TransportError};
use crate::infrastructure::discovery::is_would_block;

/// TCP requester socket.
#[derive(Debug)]
pub struct TcpRequester {
    endpoint: Option<SocketAddr>,
    stream: Option<TcpStream>,
    buffer: FrameBuffer,
    chunk: Vec<u8>,
}

impl Default for TcpRequester {
    fn default() -> Self {
        Self {
            endpoint: None,
            stream: None,
            buffer: FrameBuffer::default(),
            chunk: vec![0u8; READ_CHUNK],
        }
    }
}

impl TcpRequester {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(addr: SocketAddr) -> Result<TcpStream, TransportError> {
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|source| TransportError::ConnectFailed { addr, source })?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Drops the stream but keeps the endpoint for a lazy reconnect.
    fn reset(&mut self) {
        if self.stream.take().is_some() {
            debug!("requester stream reset");
        }
        self.buffer.clear();
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        let addr = self.endpoint.ok_or(TransportError::NotConnected)?;
        if self.stream.is_none() {
            self.stream = Some(Self::open(addr)?);
        }
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl RequesterSocket for TcpRequester {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        if self.endpoint == Some(addr) && self.stream.is_some() {
            return Ok(());
        }
        self.disconnect();
        let stream = Self::open(addr)?;
        self.stream = Some(stream);
        self.endpoint = Some(addr);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.reset();
        self.endpoint = None;
    }

    fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
    }

    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let bytes = encode_frame(&Frame::last(payload.to_vec()))?;
        let result = self.stream()?.write_all(&bytes);
        if let Err(e) = result {
            self.reset();
            return Err(TransportError::Io(e));
        }
        Ok(())
    }

    fn recv_frame(&mut self, deadline: Option<Instant>) -> Result<Frame, TransportError> {
        loop {
            match self.buffer.next_frame() {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => {
                    warn!("corrupt reply stream: {e}");
                    self.reset();
                    return Err(e.into());
                }
            }

            let timeout = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        self.reset();
                        return Err(TransportError::Timeout);
                    }
                    Some(remaining)
                }
                None => None,
            };

            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
            stream.set_read_timeout(timeout)?;
            match stream.read(&mut self.chunk) {
                Ok(0) => {
                    self.reset();
                    return Err(TransportError::Closed);
                }
                Ok(n) => self.buffer.extend(&self.chunk[..n]),
                Err(e) if is_would_block(&e) => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.reset();
                    return Err(TransportError::Io(e));
                }
            }
        }
    }
}
