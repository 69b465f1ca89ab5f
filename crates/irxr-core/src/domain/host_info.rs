//! The host identity record exchanged between client and server.
//!
//! Both sides of an IRXR session describe themselves with the same shape:
//!
//! ```json
//! {"name":"srv","ip":"192.168.1.10","topics":["pose"],"services":["Register"]}
//! ```
//!
//! The server puts this record in its discovery broadcast; the client sends
//! its own copy as the body of the `Register` service call.
//!
//! # Topics and services are sets
//!
//! The wire format uses JSON arrays, but a name must never appear twice.
//! [`HostInfo::add_topic`] and [`HostInfo::add_service`] therefore refuse
//! duplicates while keeping insertion order, so the JSON that reaches the
//! server is stable across runs.

use serde::{Deserialize, Serialize};

/// Identity record of a server (peer) or of this client (local).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Human-readable host name, e.g. `"UnityEditor"`.
    #[serde(default)]
    pub name: String,
    /// Dotted-quad IPv4 address.
    ///
    /// For a discovered peer this is always overwritten with the datagram's
    /// source address; whatever the server wrote here is ignored.
    #[serde(default)]
    pub ip: String,
    /// Topics this host publishes.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Services this host answers.
    #[serde(default)]
    pub services: Vec<String>,
}

impl HostInfo {
    /// Creates a record with the given name and no address, topics or services.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds `topic` to the topic set.
    ///
    /// Returns `false` (and leaves the set unchanged) if it was already present.
    pub fn add_topic(&mut self, topic: &str) -> bool {
        insert_unique(&mut self.topics, topic)
    }

    /// Adds `service` to the service set.
    ///
    /// Returns `false` (and leaves the set unchanged) if it was already present.
    pub fn add_service(&mut self, service: &str) -> bool {
        insert_unique(&mut self.services, service)
    }

    /// Returns `true` if `topic` is advertised by this host.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    /// Returns `true` if `service` is advertised by this host.
    pub fn has_service(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }

    /// Serializes the record to its JSON wire envelope.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`]; with only string fields
    /// this does not happen in practice.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a record from its JSON wire envelope.
    ///
    /// Missing fields fall back to empty values so that older servers which
    /// omit `ip` or `services` still decode.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `json` is not a JSON object of the
    /// expected shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn insert_unique(set: &mut Vec<String>, value: &str) -> bool {
    if set.iter().any(|v| v == value) {
        return false;
    }
    set.push(value.to_string());
    true
}

// ── Tests ─────────────────────────────────────────────────────────────────────
