//! Local network interface enumeration.
//!
//! [`SystemInterfaces`] asks the OS for every IPv4 address through the
//! `local-ip-address` crate, which wraps `getifaddrs` on Unix and
//! `GetAdaptersAddresses` on Windows.  Loopback is included: a server running
//! on the same machine announces from `127.0.0.1` and must match it.
//!
//! [`StaticInterfaces`] returns a fixed list, for tests and for hosts that
//! want to pin the advertised address.

use std::net::{IpAddr, Ipv4Addr};

use tracing::{debug, warn};

use crate::application::subnet_matcher::InterfaceEnumerator;

/// Enumerates the machine's interfaces on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl SystemInterfaces {
    pub fn new() -> Self {
        Self
    }
}

impl InterfaceEnumerator for SystemInterfaces {
    fn ipv4_addresses(&self) -> Vec<Ipv4Addr> {
        let interfaces = match local_ip_address::list_afinet_netifas() {
            Ok(ifs) => ifs,
            Err(e) => {
                warn!("failed to list network interfaces: {e}");
                return Vec::new();
            }
        };

        interfaces
            .into_iter()
            .filter_map(|(name, ip)| match ip {
                IpAddr::V4(v4) => {
                    debug!("interface {name}: {v4}");
                    Some(v4)
                }
                IpAddr::V6(_) => None,
            })
            .collect()
    }
}

/// Returns a fixed address list.
#[derive(Debug, Default, Clone)]
pub struct StaticInterfaces {
    addresses: Vec<Ipv4Addr>,
}

impl StaticInterfaces {
    pub fn new(addresses: Vec<Ipv4Addr>) -> Self {
        Self { addresses }
    }
}

impl InterfaceEnumerator for StaticInterfaces {
    fn ipv4_addresses(&self) -> Vec<Ipv4Addr> {
        self.addresses.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_interfaces_preserve_order() {
        let list = vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];
        let interfaces = StaticInterfaces::new(list.clone());
        assert_eq!(interfaces.ipv4_addresses(), list);
    }

    #[test]
    fn test_system_interfaces_return_only_ipv4() {
        // Any machine running the tests has at least one IPv4 address
        // (loopback), but containers can be unusual: only assert the call
        // does not panic and yields IPv4 values.
        let addrs = SystemInterfaces::new().ipv4_addresses();
        for addr in addrs {
            assert!(!addr.is_unspecified());
        }
    }
}
