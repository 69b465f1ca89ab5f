//! In-memory transport for tests.
//!
//! # Why a mock transport?
//!
//! The real sockets need a server on the network, real ports, and real time.
//! The `MockTransport` replaces them with a shared in-memory
//! [`MockNetwork`]: tests push datagrams, topic frames and replies into it,
//! and every socket operation is appended to `calls` so assertions can check
//! exactly what happened and in what order.
//!
//! Cloning a `MockTransport` shares the same network, so a test keeps one
//! clone for inspection and hands another to the code under test.
//!
//! # Never blocks
//!
//! A mock requester with no queued reply returns
//! [`TransportError::Timeout`] immediately instead of hanging.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use irxr_core::Frame;

use crate::application::transport::{
    DiscoverySocket, PublisherSocket, RequesterSocket, SubscriberSocket, Transport,
    TransportError,
};

/// One recorded socket operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    DiscoveryBound(u16),
    DiscoveryClosed,
    PublisherBind(SocketAddr),
    PublisherUnbind,
    Publish(Vec<u8>),
    SubscriberConnect(SocketAddr),
    SubscriberDisconnect,
    SubscriberDrain(usize),
    SubscriberClosed,
    RequesterConnect(SocketAddr),
    RequesterDisconnect,
    Request(Vec<u8>),
    Cleanup,
}

/// Shared state behind every mock socket.
#[derive(Debug, Default)]
pub struct MockNetwork {
    /// Every socket operation in call order.
    pub calls: Vec<MockCall>,
    /// Datagrams waiting on the discovery socket.
    pub datagrams: VecDeque<(Vec<u8>, SocketAddr)>,
    /// Frames waiting on the subscriber.
    pub topic_frames: VecDeque<Vec<u8>>,
    /// Reply frames waiting on the requester.
    pub reply_frames: VecDeque<Frame>,
    /// When `true`, `PublisherSocket::bind` fails.
    pub fail_publisher_bind: bool,
    /// When `true`, `SubscriberSocket::connect` fails.
    pub fail_subscriber_connect: bool,
    /// When `true`, the next subscriber receive reports the stream closed by
    /// the server.  Cleared once observed.
    pub close_topic_stream: bool,
}

/// Transport whose sockets all share one [`MockNetwork`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub network: Arc<Mutex<MockNetwork>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the shared network.
    pub fn net(&self) -> MutexGuard<'_, MockNetwork> {
        lock(&self.network)
    }

    /// Queues a discovery datagram from `src`.
    pub fn push_datagram(&self, bytes: &[u8], src: SocketAddr) {
        self.net().datagrams.push_back((bytes.to_vec(), src));
    }

    /// Queues an inbound topic frame.
    pub fn push_topic_frame(&self, bytes: &[u8]) {
        self.net().topic_frames.push_back(bytes.to_vec());
    }

    /// Queues the frames of one reply.
    pub fn push_reply(&self, frames: Vec<Frame>) {
        self.net().reply_frames.extend(frames);
    }

    /// Snapshot of the recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.net().calls.clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.net().calls.iter().filter(|c| pred(c)).count()
    }
}

fn lock(network: &Arc<Mutex<MockNetwork>>) -> MutexGuard<'_, MockNetwork> {
    network.lock().expect("mock network mutex poisoned")
}

impl Transport for MockTransport {
    fn discovery(&self, port: u16) -> Result<Box<dyn DiscoverySocket>, TransportError> {
        self.net().calls.push(MockCall::DiscoveryBound(port));
        Ok(Box::new(MockDiscovery {
            network: Arc::clone(&self.network),
        }))
    }

    fn publisher(&self) -> Box<dyn PublisherSocket> {
        Box::new(MockPublisher {
            network: Arc::clone(&self.network),
            bound: None,
        })
    }

    fn subscriber(&self) -> Box<dyn SubscriberSocket> {
        Box::new(MockSubscriber {
            network: Arc::clone(&self.network),
            endpoint: None,
        })
    }

    fn requester(&self) -> Box<dyn RequesterSocket> {
        Box::new(MockRequester {
            network: Arc::clone(&self.network),
            endpoint: None,
        })
    }

    fn cleanup(&self) {
        self.net().calls.push(MockCall::Cleanup);
    }
}

// ── Sockets ───────────────────────────────────────────────────────────────────

struct MockDiscovery {
    network: Arc<Mutex<MockNetwork>>,
}

impl DiscoverySocket for MockDiscovery {
    fn try_recv_datagram(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError> {
        Ok(lock(&self.network).datagrams.pop_front())
    }
}

impl Drop for MockDiscovery {
    fn drop(&mut self) {
        if let Ok(mut net) = self.network.lock() {
            net.calls.push(MockCall::DiscoveryClosed);
        }
    }
}

struct MockPublisher {
    network: Arc<Mutex<MockNetwork>>,
    bound: Option<SocketAddr>,
}

impl PublisherSocket for MockPublisher {
    fn bind(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        if self.bound == Some(addr) {
            return Ok(());
        }
        let mut net = lock(&self.network);
        if net.fail_publisher_bind {
            return Err(TransportError::BindFailed {
                addr,
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "mock bind failure"),
            });
        }
        net.calls.push(MockCall::PublisherBind(addr));
        self.bound = Some(addr);
        Ok(())
    }

    fn unbind(&mut self) {
        if self.bound.take().is_some() {
            lock(&self.network).calls.push(MockCall::PublisherUnbind);
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.bound
    }

    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.bound.is_none() {
            return Err(TransportError::NotBound);
        }
        lock(&self.network)
            .calls
            .push(MockCall::Publish(payload.to_vec()));
        Ok(())
    }
}

struct MockSubscriber {
    network: Arc<Mutex<MockNetwork>>,
    endpoint: Option<SocketAddr>,
}

impl SubscriberSocket for MockSubscriber {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        let mut net = lock(&self.network);
        if net.fail_subscriber_connect {
            return Err(TransportError::ConnectFailed {
                addr,
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "mock connect failure",
                ),
            });
        }
        net.calls.push(MockCall::SubscriberConnect(addr));
        self.endpoint = Some(addr);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.endpoint.take().is_some() {
            lock(&self.network).calls.push(MockCall::SubscriberDisconnect);
        }
    }

    fn drain(&mut self) -> usize {
        let mut net = lock(&self.network);
        let drained = net.topic_frames.len();
        net.topic_frames.clear();
        net.calls.push(MockCall::SubscriberDrain(drained));
        drained
    }

    fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.endpoint.is_none() {
            return Ok(None);
        }
        let mut net = lock(&self.network);
        if net.close_topic_stream {
            net.close_topic_stream = false;
            net.calls.push(MockCall::SubscriberClosed);
            self.endpoint = None;
            return Err(TransportError::Closed);
        }
        Ok(net.topic_frames.pop_front())
    }
}

struct MockRequester {
    network: Arc<Mutex<MockNetwork>>,
    endpoint: Option<SocketAddr>,
}

impl RequesterSocket for MockRequester {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        if self.endpoint == Some(addr) {
            return Ok(());
        }
        lock(&self.network)
            .calls
            .push(MockCall::RequesterConnect(addr));
        self.endpoint = Some(addr);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.endpoint.take().is_some() {
            lock(&self.network).calls.push(MockCall::RequesterDisconnect);
        }
    }

    fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
    }

    fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        lock(&self.network)
            .calls
            .push(MockCall::Request(payload.to_vec()));
        Ok(())
    }

    fn recv_frame(&mut self, _deadline: Option<Instant>) -> Result<Frame, TransportError> {
        lock(&self.network)
            .reply_frames
            .pop_front()
            .ok_or(TransportError::Timeout)
    }
}
