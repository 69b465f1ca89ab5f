//! The publish/subscribe topic channel.
//!
//! Outbound: the client binds a publisher on its own topic port and sends
//! `<topic>:<payload>` frames that the server (or any other subscriber)
//! receives.
//!
//! Inbound: the client connects a subscriber to the server's topic port and
//! receives *every* topic.  Each tick, [`PubSubChannel::dispatch_one`] takes
//! at most one frame, splits off the topic, and calls the handler registered
//! for it; frames for topics nobody subscribed to are dropped silently.
//!
//! # One frame per tick
//!
//! Dispatch is deliberately bounded: a burst of messages is consumed over
//! several ticks instead of stalling one tick on a drain loop.  The socket
//! buffers the backlog meanwhile.
//!
//! # Lost subscriptions
//!
//! If the server drops the topic stream while the client is still
//! connected, [`PubSubChannel::resubscribe_if_lost`] reconnects to the
//! remembered endpoint.  The first attempt after a loss is immediate; later
//! attempts wait for the retry interval the caller passes in.
//!
//! # Payload encoding
//!
//! `publish` sends arbitrary bytes, but handlers receive `&str`.  An inbound
//! frame that is not valid UTF-8 is dropped (logged at trace) and reported
//! as [`Dispatch::Malformed`]; it is never rewritten.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use irxr_core::protocol::{join_envelope, split_envelope};
use tracing::{debug, info, trace};

use crate::application::transport::{PublisherSocket, SubscriberSocket, TransportError};

/// Handler invoked with the payload of a topic message.
///
/// Only frames whose bytes are valid UTF-8 reach a handler.
pub type TopicHandler = Box<dyn FnMut(&str) + Send>;

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Dispatch is not installed or no frame was pending.
    Empty,
    /// A handler received the payload of `topic`.
    Delivered { topic: String },
    /// A frame for `topic` arrived but no handler is registered.
    NoHandler { topic: String },
    /// A frame without a `topic:` prefix, or not valid UTF-8, was dropped.
    Malformed,
}

/// Publisher, subscriber and topic handler table.
pub struct PubSubChannel {
    publisher: Box<dyn PublisherSocket>,
    subscriber: Box<dyn SubscriberSocket>,
    topic_callbacks: HashMap<String, TopicHandler>,
    dispatch_installed: bool,
    endpoint: Option<SocketAddr>,
    last_resubscribe: Option<Instant>,
}

impl PubSubChannel {
    pub fn new(publisher: Box<dyn PublisherSocket>, subscriber: Box<dyn SubscriberSocket>) -> Self {
        Self {
            publisher,
            subscriber,
            topic_callbacks: HashMap::new(),
            dispatch_installed: false,
            endpoint: None,
            last_resubscribe: None,
        }
    }

    // ── Publisher ─────────────────────────────────────────────────────────────

    /// Binds the publisher at `addr`.  Already bound there: no-op.
    pub fn bind_publisher(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        self.publisher.bind(addr)?;
        info!(
            "publisher bound at {}",
            self.publisher.local_addr().unwrap_or(addr)
        );
        Ok(())
    }

    /// Unbinds the publisher if it is bound.
    pub fn unbind_publisher(&mut self) {
        if let Some(addr) = self.publisher.local_addr() {
            self.publisher.unbind();
            info!("publisher unbound from {addr}");
        }
    }

    /// The address the publisher is bound to, if any.
    pub fn publisher_addr(&self) -> Option<SocketAddr> {
        self.publisher.local_addr()
    }

    /// Publishes `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotBound`] while the publisher is unbound.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.publisher.send_frame(&join_envelope(topic, payload))
    }

    // ── Subscriber ────────────────────────────────────────────────────────────

    /// (Re)starts the subscription against the server publisher at `addr`.
    ///
    /// Any existing subscription is stopped first, so calling this twice is
    /// equivalent to calling it once.
    pub fn start_subscription(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        self.stop_subscription();
        self.subscriber.connect(addr)?;
        self.dispatch_installed = true;
        self.endpoint = Some(addr);
        self.last_resubscribe = None;
        info!("connected topic channel to {addr}");
        Ok(())
    }

    /// Reconnects the subscriber if the stream was lost while dispatch is
    /// installed.
    ///
    /// Returns `Ok(true)` when a reconnect happened.  After one attempt, the
    /// next waits until more than `retry` has passed since it.
    ///
    /// # Errors
    ///
    /// Propagates the connect failure; the retry interval still applies.
    pub fn resubscribe_if_lost(
        &mut self,
        now: Instant,
        retry: Duration,
    ) -> Result<bool, TransportError> {
        if !self.dispatch_installed || self.subscriber.is_connected() {
            return Ok(false);
        }
        let Some(addr) = self.endpoint else {
            return Ok(false);
        };
        if let Some(last) = self.last_resubscribe {
            if now.saturating_duration_since(last) <= retry {
                return Ok(false);
            }
        }

        self.last_resubscribe = Some(now);
        self.subscriber.connect(addr)?;
        info!("reconnected topic channel to {addr}");
        Ok(true)
    }

    /// Stops the subscription.
    ///
    /// When connected, disconnects and then discards every buffered frame so
    /// nothing from this subscription leaks into the next one.  Dispatch is
    /// uninstalled in every case.  Returns the number of discarded frames.
    pub fn stop_subscription(&mut self) -> usize {
        let mut drained = 0;
        if self.subscriber.is_connected() {
            self.subscriber.disconnect();
            drained = self.subscriber.drain();
            if drained > 0 {
                debug!("discarded {drained} buffered topic frame(s)");
            }
        }
        self.dispatch_installed = false;
        self.endpoint = None;
        self.last_resubscribe = None;
        drained
    }

    /// Returns `true` while per-tick dispatch is installed.
    pub fn is_subscribed(&self) -> bool {
        self.dispatch_installed
    }

    /// Receives and dispatches at most one inbound frame.
    ///
    /// Handlers run synchronously on the caller's thread.
    pub fn dispatch_one(&mut self) -> Result<Dispatch, TransportError> {
        if !self.dispatch_installed {
            return Ok(Dispatch::Empty);
        }
        let Some(frame) = self.subscriber.try_recv_frame()? else {
            return Ok(Dispatch::Empty);
        };

        let Ok(message) = std::str::from_utf8(&frame) else {
            trace!("dropping topic frame that is not valid UTF-8");
            return Ok(Dispatch::Malformed);
        };
        let Some((topic, payload)) = split_envelope(message) else {
            trace!("dropping topic frame without delimiter");
            return Ok(Dispatch::Malformed);
        };

        match self.topic_callbacks.get_mut(topic) {
            Some(handler) => {
                handler(payload);
                Ok(Dispatch::Delivered {
                    topic: topic.to_string(),
                })
            }
            None => {
                trace!("no handler for topic {topic}");
                Ok(Dispatch::NoHandler {
                    topic: topic.to_string(),
                })
            }
        }
    }

    // ── Topic table ───────────────────────────────────────────────────────────

    /// Installs the handler for `topic`, silently replacing any previous one.
    pub fn subscribe_topic(&mut self, topic: &str, handler: TopicHandler) {
        self.topic_callbacks.insert(topic.to_string(), handler);
        info!("subscribed to topic {topic}");
    }

    /// Removes the handler for `topic`.  Returns `true` if one was installed.
    pub fn unsubscribe_topic(&mut self, topic: &str) -> bool {
        self.topic_callbacks.remove(topic).is_some()
    }

    /// Returns `true` if a handler is installed for `topic`.
    pub fn has_topic_handler(&self, topic: &str) -> bool {
        self.topic_callbacks.contains_key(topic)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::application::transport::Transport;
    use crate::infrastructure::mock::{MockCall, MockTransport};

    fn server_topic() -> SocketAddr {
        "192.168.1.10:7722".parse().unwrap()
    }

    fn channel(mock: &MockTransport) -> PubSubChannel {
        PubSubChannel::new(mock.publisher(), mock.subscriber())
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, TopicHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (
            seen,
            Box::new(move |payload: &str| sink.lock().unwrap().push(payload.to_string())),
        )
    }

    #[test]
    fn test_dispatch_delivers_payload_to_registered_handler_once() {
        // Arrange
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        let (seen, handler) = recorder();
        pubsub.subscribe_topic("pose", handler);
        pubsub.start_subscription(server_topic()).unwrap();
        mock.push_topic_frame(b"pose:1,2,3");

        // Act
        let first = pubsub.dispatch_one().unwrap();
        let second = pubsub.dispatch_one().unwrap();

        // Assert
        assert_eq!(
            first,
            Dispatch::Delivered {
                topic: "pose".to_string()
            }
        );
        assert_eq!(second, Dispatch::Empty);
        assert_eq!(*seen.lock().unwrap(), vec!["1,2,3"]);
    }

    #[test]
    fn test_dispatch_drops_unknown_topic_without_error() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        let (seen, handler) = recorder();
        pubsub.subscribe_topic("pose", handler);
        pubsub.start_subscription(server_topic()).unwrap();
        mock.push_topic_frame(b"scene:{}");

        let outcome = pubsub.dispatch_one().unwrap();

        assert_eq!(
            outcome,
            Dispatch::NoHandler {
                topic: "scene".to_string()
            }
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_processes_exactly_one_frame_per_call() {
        // Arrange
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        let (seen, handler) = recorder();
        pubsub.subscribe_topic("t", handler);
        pubsub.start_subscription(server_topic()).unwrap();
        for i in 0..3 {
            mock.push_topic_frame(format!("t:{i}").as_bytes());
        }

        // Act
        pubsub.dispatch_one().unwrap();

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec!["0"]);
        pubsub.dispatch_one().unwrap();
        pubsub.dispatch_one().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_payload_keeps_everything_after_first_delimiter() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        let (seen, handler) = recorder();
        pubsub.subscribe_topic("json", handler);
        pubsub.start_subscription(server_topic()).unwrap();
        mock.push_topic_frame(br#"json:{"a":1,"b":"x:y"}"#);

        pubsub.dispatch_one().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![r#"{"a":1,"b":"x:y"}"#]);
    }

    #[test]
    fn test_frame_without_delimiter_is_malformed() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        pubsub.start_subscription(server_topic()).unwrap();
        mock.push_topic_frame(b"garbage");

        assert_eq!(pubsub.dispatch_one().unwrap(), Dispatch::Malformed);
    }

    #[test]
    fn test_non_utf8_frame_is_dropped_not_rewritten() {
        // Arrange
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        let (seen, handler) = recorder();
        pubsub.subscribe_topic("pose", handler);
        pubsub.start_subscription(server_topic()).unwrap();
        mock.push_topic_frame(b"pose:\xFF\xFE");
        mock.push_topic_frame(b"pose:ok");

        // Act
        let first = pubsub.dispatch_one().unwrap();
        let second = pubsub.dispatch_one().unwrap();

        // Assert
        assert_eq!(first, Dispatch::Malformed);
        assert_eq!(
            second,
            Dispatch::Delivered {
                topic: "pose".to_string()
            }
        );
        assert_eq!(*seen.lock().unwrap(), vec!["ok"]);
    }

    #[test]
    fn test_lost_stream_is_reconnected_then_throttled() {
        // Arrange
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        pubsub.start_subscription(server_topic()).unwrap();
        let retry = Duration::from_secs(1);
        let t0 = Instant::now();
        mock.net().close_topic_stream = true;
        assert!(matches!(pubsub.dispatch_one(), Err(TransportError::Closed)));

        // Act
        let first = pubsub.resubscribe_if_lost(t0, retry).unwrap();
        mock.net().close_topic_stream = true;
        let _ = pubsub.dispatch_one();
        let too_soon = pubsub
            .resubscribe_if_lost(t0 + Duration::from_millis(500), retry)
            .unwrap();
        let later = pubsub
            .resubscribe_if_lost(t0 + Duration::from_millis(1100), retry)
            .unwrap();

        // Assert
        assert!(first);
        assert!(!too_soon);
        assert!(later);
        assert_eq!(
            mock.count(|c| *c == MockCall::SubscriberConnect(server_topic())),
            3
        );
        assert!(pubsub.is_subscribed());
    }

    #[test]
    fn test_resubscribe_does_nothing_while_healthy_or_stopped() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        let now = Instant::now();

        let before_start = pubsub.resubscribe_if_lost(now, Duration::ZERO).unwrap();
        pubsub.start_subscription(server_topic()).unwrap();
        let healthy = pubsub.resubscribe_if_lost(now, Duration::ZERO).unwrap();
        pubsub.stop_subscription();
        let after_stop = pubsub.resubscribe_if_lost(now, Duration::ZERO).unwrap();

        assert!(!before_start && !healthy && !after_stop);
        assert_eq!(
            mock.count(|c| matches!(c, MockCall::SubscriberConnect(_))),
            1
        );
    }

    #[test]
    fn test_dispatch_is_inert_before_subscription() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        mock.push_topic_frame(b"pose:1");

        assert_eq!(pubsub.dispatch_one().unwrap(), Dispatch::Empty);
    }

    #[test]
    fn test_stop_subscription_drains_buffered_frames() {
        // Arrange
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        pubsub.start_subscription(server_topic()).unwrap();
        mock.push_topic_frame(b"pose:stale-1");
        mock.push_topic_frame(b"pose:stale-2");

        // Act
        let drained = pubsub.stop_subscription();

        // Assert
        assert_eq!(drained, 2);
        assert!(!pubsub.is_subscribed());
        let calls = mock.calls();
        let disconnect = calls
            .iter()
            .position(|c| *c == MockCall::SubscriberDisconnect)
            .unwrap();
        let drain = calls
            .iter()
            .position(|c| *c == MockCall::SubscriberDrain(2))
            .unwrap();
        assert!(disconnect < drain, "disconnect must precede drain");
    }

    #[test]
    fn test_start_subscription_twice_restarts_cleanly() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);

        pubsub.start_subscription(server_topic()).unwrap();
        pubsub.start_subscription(server_topic()).unwrap();

        let connects = mock
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::SubscriberConnect(_)))
            .count();
        assert_eq!(connects, 2);
        assert_eq!(
            mock.calls()
                .iter()
                .filter(|c| **c == MockCall::SubscriberDisconnect)
                .count(),
            1
        );
        assert!(pubsub.is_subscribed());
    }

    #[test]
    fn test_stop_without_connection_still_uninstalls_dispatch() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);

        let drained = pubsub.stop_subscription();

        assert_eq!(drained, 0);
        assert!(!pubsub.is_subscribed());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_publish_requires_bound_publisher() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);

        let err = pubsub.publish("pose", b"1").unwrap_err();

        assert!(matches!(err, TransportError::NotBound));
    }

    #[test]
    fn test_publish_sends_topic_envelope() {
        // Arrange
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        pubsub
            .bind_publisher("192.168.1.42:7724".parse().unwrap())
            .unwrap();

        // Act
        pubsub.publish("pose", b"1,2,3").unwrap();

        // Assert
        assert!(mock.calls().contains(&MockCall::Publish(b"pose:1,2,3".to_vec())));
    }

    #[test]
    fn test_unsubscribe_removes_handler() {
        let mock = MockTransport::new();
        let mut pubsub = channel(&mock);
        let (_, handler) = recorder();
        pubsub.subscribe_topic("pose", handler);

        assert!(pubsub.unsubscribe_topic("pose"));
        assert!(!pubsub.unsubscribe_topic("pose"));
        assert!(!pubsub.has_topic_handler("pose"));
    }
}
