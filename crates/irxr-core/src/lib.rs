//! # irxr-core
//!
//! Shared library for the IRXR messaging client containing the wire formats,
//! the host identity record, and the subnet matching rules.
//!
//! It has zero dependencies on OS APIs or network sockets: every function here
//! is pure and can be tested without a network.
//!
//! # Architecture overview (for beginners)
//!
//! An IRXR *server* (typically a simulator) periodically broadcasts a small
//! UDP datagram announcing itself on the LAN.  A *client* (typically a
//! headset or a visualiser) listens for that datagram, works out which of its
//! own network addresses can reach the server, and then opens four messaging
//! channels: publish, subscribe, request and response.
//!
//! This crate (`irxr-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network: the `SimPub:` discovery
//!   announcement, the length-prefixed frame codec used by the messaging
//!   channels, and the `name:body` envelope inside each frame.
//!
//! - **`domain`** – The [`HostInfo`] identity record exchanged between client
//!   and server, and the pure subnet matcher that picks the local address to
//!   advertise.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `irxr_core::HostInfo` instead of `irxr_core::domain::host_info::HostInfo`.
pub use domain::host_info::HostInfo;
pub use domain::subnet::{
    is_in_same_subnet, select_local_ip, SubnetError, DEFAULT_SUBNET_MASK,
};
pub use protocol::discovery::{decode_announcement, encode_announcement, DiscoveryParseError};
pub use protocol::frame::{decode_frame, encode_frame, Frame, FrameError};
