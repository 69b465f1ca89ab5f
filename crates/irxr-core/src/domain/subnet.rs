//! Subnet matching: choosing which local address can reach a peer.
//!
//! A machine usually has several IPv4 addresses (Wi-Fi, Ethernet, VPN,
//! container bridges, loopback).  When a server is discovered we must tell it
//! an address it can actually reach, so we pick the local address that lives
//! in the same subnet as the server.
//!
//! # How masking works (for beginners)
//!
//! Two addresses are in the same subnet when they agree on every bit that the
//! mask keeps.  With the default mask `255.255.255.0`:
//!
//! ```text
//! peer   192.168.1.10  & 255.255.255.0 = 192.168.1.0
//! local  192.168.1.42  & 255.255.255.0 = 192.168.1.0   -> match
//! local  10.0.0.5      & 255.255.255.0 = 10.0.0.0      -> no match
//! ```
//!
//! # Determinism
//!
//! [`select_local_ip`] returns the *first* matching candidate.  The candidate
//! list normally comes from OS interface enumeration, whose order is platform
//! defined, so two interfaces on the same subnet may resolve differently on
//! different operating systems.

use std::net::Ipv4Addr;

use thiserror::Error;

/// The mask used when none is configured (`/24`).
pub const DEFAULT_SUBNET_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Errors produced by subnet matching.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubnetError {
    /// The peer address is not a dotted-quad IPv4 address.
    #[error("malformed address: {0:?}")]
    MalformedAddress(String),
}

/// Returns `true` if `a` and `b` agree on every bit kept by `mask`.
pub fn is_in_same_subnet(a: Ipv4Addr, b: Ipv4Addr, mask: Ipv4Addr) -> bool {
    a.octets()
        .iter()
        .zip(b.octets().iter())
        .zip(mask.octets().iter())
        .all(|((x, y), m)| x & m == y & m)
}

/// Selects the first candidate in the same subnet as `peer`.
///
/// Falls back to [`Ipv4Addr::LOCALHOST`] when no candidate matches.
///
/// # Errors
///
/// Returns [`SubnetError::MalformedAddress`] if `peer` does not parse as an
/// IPv4 address.  A malformed peer never falls back to loopback.
///
/// # Examples
///
/// ```rust
/// use std::net::Ipv4Addr;
/// use irxr_core::{select_local_ip, DEFAULT_SUBNET_MASK};
///
/// let locals = [Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(192, 168, 1, 42)];
/// let ip = select_local_ip("192.168.1.10", DEFAULT_SUBNET_MASK, &locals).unwrap();
/// assert_eq!(ip, Ipv4Addr::new(192, 168, 1, 42));
/// ```
pub fn select_local_ip(
    peer: &str,
    mask: Ipv4Addr,
    candidates: &[Ipv4Addr],
) -> Result<Ipv4Addr, SubnetError> {
    let peer: Ipv4Addr = peer
        .trim()
        .parse()
        .map_err(|_| SubnetError::MalformedAddress(peer.to_string()))?;

    Ok(candidates
        .iter()
        .copied()
        .find(|local| is_in_same_subnet(peer, *local, mask))
        .unwrap_or(Ipv4Addr::LOCALHOST))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
