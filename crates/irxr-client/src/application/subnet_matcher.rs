//! Binds the pure subnet matcher to the machine's network interfaces.
//!
//! [`irxr_core::select_local_ip`] works on a fixed candidate list.  This
//! module supplies that list through an [`InterfaceEnumerator`], which the
//! infrastructure layer implements on top of the OS.

use std::net::Ipv4Addr;

use irxr_core::{select_local_ip, SubnetError};
use tracing::debug;

/// Lists the IPv4 addresses assigned to local interfaces.
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceEnumerator: Send {
    /// Returns every local IPv4 address in enumeration order.
    ///
    /// An enumeration failure is reported as an empty list, which makes the
    /// matcher fall back to loopback.
    fn ipv4_addresses(&self) -> Vec<Ipv4Addr>;
}

/// Returns the local address in the same subnet as `peer`, or loopback.
///
/// # Errors
///
/// Returns [`SubnetError::MalformedAddress`] if `peer` is not an IPv4 address.
pub fn local_ip_in_same_subnet(
    peer: &str,
    mask: Ipv4Addr,
    interfaces: &dyn InterfaceEnumerator,
) -> Result<Ipv4Addr, SubnetError> {
    let candidates = interfaces.ipv4_addresses();
    for local in &candidates {
        debug!("local IP candidate: {local}");
    }
    select_local_ip(peer, mask, &candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use irxr_core::DEFAULT_SUBNET_MASK;

    #[test]
    fn test_uses_enumerated_interfaces() {
        // Arrange
        let mut interfaces = MockInterfaceEnumerator::new();
        interfaces
            .expect_ipv4_addresses()
            .times(1)
            .returning(|| vec![Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(192, 168, 1, 42)]);

        // Act
        let ip = local_ip_in_same_subnet("192.168.1.10", DEFAULT_SUBNET_MASK, &interfaces);

        // Assert
        assert_eq!(ip, Ok(Ipv4Addr::new(192, 168, 1, 42)));
    }

    #[test]
    fn test_empty_enumeration_falls_back_to_loopback() {
        let mut interfaces = MockInterfaceEnumerator::new();
        interfaces.expect_ipv4_addresses().returning(Vec::new);

        let ip = local_ip_in_same_subnet("192.168.1.10", DEFAULT_SUBNET_MASK, &interfaces);

        assert_eq!(ip, Ok(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_malformed_peer_is_an_error() {
        let mut interfaces = MockInterfaceEnumerator::new();
        interfaces
            .expect_ipv4_addresses()
            .returning(|| vec![Ipv4Addr::LOCALHOST]);

        let result = local_ip_in_same_subnet("not-an-ip", DEFAULT_SUBNET_MASK, &interfaces);

        assert!(matches!(result, Err(SubnetError::MalformedAddress(_))));
    }
}
