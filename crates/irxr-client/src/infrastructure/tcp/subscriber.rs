//! Non-blocking TCP subscriber.
//!
//! Connects to the server's topic port and polls for frames.  Bytes are read
//! into a [`FrameBuffer`] as they arrive, so a frame split across several TCP
//! segments is only handed out once it is complete.
//!
//! # Bounded buffering
//!
//! The subscriber reads from the socket only while the buffer holds no
//! complete frame, one chunk at a time.  Everything else stays in the kernel
//! receive buffer, where TCP flow control slows a publisher that outpaces
//! the tick rate.  The user-space buffer therefore never exceeds one frame
//! plus one read chunk.

use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream};

use tracing::{debug, warn};

use super::{FrameBuffer, CONNECT_TIMEOUT, READ_CHUNK};
use crate::application::transport::{SubscriberSocket, TransportError};
use crate::infrastructure::discovery::is_would_block;

/// Result of one socket read.
enum ReadOutcome {
    Data,
    Pending,
    Eof,
}

/// TCP subscriber socket.
#[derive(Debug)]
pub struct TcpSubscriber {
    stream: Option<TcpStream>,
    buffer: FrameBuffer,
    chunk: Vec<u8>,
}

impl Default for TcpSubscriber {
    fn default() -> Self {
        Self {
            stream: None,
            buffer: FrameBuffer::default(),
            chunk: vec![0u8; READ_CHUNK],
        }
    }
}

impl TcpSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held in user space, complete frames and partial ones.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Reads at most one chunk into the frame buffer.
    fn read_chunk(&mut self) -> Result<ReadOutcome, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(ReadOutcome::Eof);
        };
        loop {
            match stream.read(&mut self.chunk) {
                Ok(0) => return Ok(ReadOutcome::Eof),
                Ok(n) => {
                    self.buffer.extend(&self.chunk[..n]);
                    return Ok(ReadOutcome::Data);
                }
                Err(e) if is_would_block(&e) => return Ok(ReadOutcome::Pending),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }
}

impl SubscriberSocket for TcpSubscriber {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        self.disconnect();
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|source| TransportError::ConnectFailed { addr, source })?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        self.buffer.clear();
        self.stream = Some(stream);
        debug!("subscriber connected to {addr}");
        Ok(())
    }

    fn disconnect(&mut self) {
        // Frames already in user space stay there for `drain`; bytes still in
        // the kernel are discarded with the socket.
        self.stream = None;
    }

    fn drain(&mut self) -> usize {
        self.buffer.discard()
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.stream.is_none() {
            return Ok(None);
        }
        loop {
            match self.buffer.next_frame() {
                Ok(Some(frame)) => return Ok(Some(frame.payload)),
                Ok(None) => {}
                Err(e) => {
                    warn!("corrupt topic stream, dropping connection: {e}");
                    self.stream = None;
                    return Err(e.into());
                }
            }
            match self.read_chunk() {
                Ok(ReadOutcome::Data) => continue,
                Ok(ReadOutcome::Pending) => return Ok(None),
                Ok(ReadOutcome::Eof) => {
                    self.stream = None;
                    return Err(TransportError::Closed);
                }
                Err(e) => {
                    self.stream = None;
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irxr_core::{encode_frame, Frame};
    use std::io::Write;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn poll_frame(subscriber: &mut TcpSubscriber) -> Option<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(payload) = subscriber.try_recv_frame().unwrap() {
                return Some(payload);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_recv_without_connection_returns_none() {
        let mut subscriber = TcpSubscriber::new();
        assert!(subscriber.try_recv_frame().unwrap().is_none());
        assert!(!subscriber.is_connected());
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        // Bind then drop to get a port that is very likely closed.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let mut subscriber = TcpSubscriber::new();

        let err = subscriber.connect(addr).unwrap_err();

        assert!(matches!(err, TransportError::ConnectFailed { .. }));
    }

    #[test]
    fn test_frame_split_across_writes_is_reassembled() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut subscriber = TcpSubscriber::new();
        subscriber.connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        let bytes = encode_frame(&Frame::last(b"pose:{\"x\":1}".to_vec())).unwrap();

        // Act
        server.write_all(&bytes[..3]).unwrap();
        server.flush().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let early = subscriber.try_recv_frame().unwrap();
        server.write_all(&bytes[3..]).unwrap();

        // Assert
        assert!(early.is_none());
        assert_eq!(poll_frame(&mut subscriber), Some(b"pose:{\"x\":1}".to_vec()));
    }

    #[test]
    fn test_drain_discards_frames_already_read() {
        // Arrange: three frames land in one read; one is consumed.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut subscriber = TcpSubscriber::new();
        subscriber.connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        let mut bytes = Vec::new();
        for payload in [&b"a:1"[..], b"a:2", b"a:3"] {
            bytes.extend(encode_frame(&Frame::last(payload.to_vec())).unwrap());
        }
        server.write_all(&bytes).unwrap();
        server.flush().unwrap();
        assert_eq!(poll_frame(&mut subscriber), Some(b"a:1".to_vec()));

        // Act
        subscriber.disconnect();
        let drained = subscriber.drain();

        // Assert
        assert_eq!(drained, 2);
        assert!(!subscriber.is_connected());
        assert_eq!(subscriber.buffered_bytes(), 0);
    }

    #[test]
    fn test_backlog_stays_in_kernel_when_consumer_is_slow() {
        // Arrange: the server publishes far more than the client consumes.
        const FRAME_PAYLOAD: usize = 1024;
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut subscriber = TcpSubscriber::new();
        subscriber.connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        server
            .set_write_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let frame = encode_frame(&Frame::last(vec![b'x'; FRAME_PAYLOAD])).unwrap();
        let writer = std::thread::spawn(move || {
            for _ in 0..20_000 {
                if server.write_all(&frame).is_err() {
                    break;
                }
            }
        });

        // Act: consume one frame at a time, with time for the backlog to grow.
        let mut consumed = 0;
        let mut peak = 0;
        while consumed < 200 {
            if subscriber.try_recv_frame().unwrap().is_some() {
                consumed += 1;
            }
            peak = peak.max(subscriber.buffered_bytes());
            std::thread::sleep(Duration::from_millis(1));
        }

        // Assert: at most one partial frame plus one read chunk.
        let cap = READ_CHUNK + FRAME_PAYLOAD + irxr_core::protocol::FRAME_HEADER_SIZE;
        assert!(peak <= cap, "buffered {peak} bytes, cap {cap}");

        drop(subscriber);
        writer.join().unwrap();
    }

    #[test]
    fn test_peer_close_reports_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut subscriber = TcpSubscriber::new();
        subscriber.connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(server);

        let deadline = Instant::now() + Duration::from_secs(2);
        let result = loop {
            match subscriber.try_recv_frame() {
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5))
                }
                other => break other,
            }
        };

        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(!subscriber.is_connected());
    }
}
