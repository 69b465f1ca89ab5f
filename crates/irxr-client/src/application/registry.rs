//! Local identity and the service callback table.
//!
//! The registry owns this client's [`HostInfo`]: its name, the address it
//! advertises, and the topics it publishes.  The record is sent to the server
//! as the body of a `Register` service call every time the client connects
//! and every time a topic is created, so the server always has a current view.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use irxr_core::HostInfo;
use tracing::{debug, warn};

/// Name of the service the server exposes for client registration.
pub const REGISTER_SERVICE: &str = "Register";

/// Handler for a service call addressed to this client.
pub type ServiceHandler = Box<dyn FnMut(&str) + Send>;

/// This client's advertised identity plus its service handlers.
pub struct Registry {
    local: HostInfo,
    service_callbacks: HashMap<String, ServiceHandler>,
}

impl Registry {
    /// Creates a registry advertising `host_name` with no topics.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            local: HostInfo::new(host_name),
            service_callbacks: HashMap::new(),
        }
    }

    /// The local identity record.
    pub fn local(&self) -> &HostInfo {
        &self.local
    }

    /// Records the address selected to reach the current server.
    pub fn set_local_ip(&mut self, ip: Ipv4Addr) {
        self.local.ip = ip.to_string();
    }

    /// Adds a published topic.
    ///
    /// A duplicate is logged as a warning and leaves the record unchanged.
    /// Returns `true` if the topic was new.
    pub fn add_topic(&mut self, topic: &str) -> bool {
        let added = self.local.add_topic(topic);
        if !added {
            warn!("topic {topic} already exists");
        }
        added
    }

    /// Installs the handler for `service`, replacing any previous one.
    pub fn register_service_callback(&mut self, service: &str, handler: ServiceHandler) {
        if self
            .service_callbacks
            .insert(service.to_string(), handler)
            .is_some()
        {
            debug!("replaced handler for service {service}");
        }
    }

    /// Returns `true` if a handler is installed for `service`.
    pub fn has_service_callback(&self, service: &str) -> bool {
        self.service_callbacks.contains_key(service)
    }

    /// Serializes the local identity to the registration envelope.
    ///
    /// # Errors
    ///
    /// Propagates JSON serialization errors.
    pub fn envelope(&self) -> Result<String, serde_json::Error> {
        self.local.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_advertises_host_name_only() {
        let registry = Registry::new("UnityEditor");
        assert_eq!(registry.local().name, "UnityEditor");
        assert!(registry.local().topics.is_empty());
    }

    #[test]
    fn test_add_topic_twice_is_duplicate_safe() {
        // Arrange
        let mut registry = Registry::new("client");

        // Act
        let first = registry.add_topic("pose");
        let second = registry.add_topic("pose");

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(
            registry.local().topics.iter().filter(|t| *t == "pose").count(),
            1
        );
    }

    #[test]
    fn test_set_local_ip_is_reflected_in_envelope() {
        // Arrange
        let mut registry = Registry::new("client");
        registry.set_local_ip(Ipv4Addr::new(192, 168, 1, 42));

        // Act
        let envelope = registry.envelope().unwrap();

        // Assert
        assert!(envelope.contains(r#""ip":"192.168.1.42""#), "{envelope}");
    }

    #[test]
    fn test_service_callback_replacement_is_silent() {
        let mut registry = Registry::new("client");
        registry.register_service_callback("Reset", Box::new(|_| {}));
        registry.register_service_callback("Reset", Box::new(|_| {}));
        assert!(registry.has_service_callback("Reset"));
        assert!(!registry.has_service_callback("Other"));
    }
}
