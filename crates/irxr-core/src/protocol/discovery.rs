//! The discovery announcement datagram.
//!
//! A server broadcasts, roughly once per second, a UDP datagram of the form:
//!
//! ```text
//! SimPub:{"name":"srv","ip":"","topics":[],"services":["Register"]}
//! ```
//!
//! The text before the first `:` is a fixed tag that lets unrelated traffic
//! on the same port be ignored cheaply.  The rest is a JSON [`HostInfo`].
//!
//! The `ip` field inside the JSON is never trusted: a server behind NAT or
//! with several interfaces cannot know which of its addresses the client sees.
//! The decoder replaces it with the datagram's source address instead.

use std::net::IpAddr;

use thiserror::Error;

use crate::domain::host_info::HostInfo;
use crate::protocol::envelope::{join_envelope, split_envelope};

/// The default tag that prefixes every announcement.
pub const DISCOVERY_TAG: &str = "SimPub";

/// Reasons an announcement datagram is rejected.
#[derive(Debug, Error)]
pub enum DiscoveryParseError {
    /// The datagram is not valid UTF-8 text.
    #[error("datagram is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The datagram does not begin with the expected tag.
    #[error("datagram does not start with tag {expected:?}")]
    WrongTag { expected: String },

    /// The tag is present but no `:` separates it from a body.
    #[error("datagram has no body delimiter")]
    MissingBody,

    /// The body is not a valid JSON host record.
    #[error("invalid announcement body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes an announcement received from `sender`.
///
/// The returned record's `ip` is `sender`, regardless of the JSON content.
///
/// # Errors
///
/// Returns [`DiscoveryParseError`] when the datagram must be dropped.
///
/// # Examples
///
/// ```rust
/// use irxr_core::decode_announcement;
///
/// let datagram = br#"SimPub:{"name":"srv","ip":"0.0.0.0","topics":[],"services":["Register"]}"#;
/// let peer = decode_announcement(datagram, "SimPub", "192.168.1.10".parse().unwrap()).unwrap();
/// assert_eq!(peer.name, "srv");
/// assert_eq!(peer.ip, "192.168.1.10");
/// ```
pub fn decode_announcement(
    datagram: &[u8],
    tag: &str,
    sender: IpAddr,
) -> Result<HostInfo, DiscoveryParseError> {
    let text = std::str::from_utf8(datagram)?;
    if !text.starts_with(tag) {
        return Err(DiscoveryParseError::WrongTag {
            expected: tag.to_string(),
        });
    }
    let (_, body) = split_envelope(text).ok_or(DiscoveryParseError::MissingBody)?;

    let mut info = HostInfo::from_json(body)?;
    info.ip = sender.to_string();
    Ok(info)
}

/// Encodes `info` as an announcement datagram.
///
/// Used by servers and by test fixtures that play the server role.
///
/// # Errors
///
/// Propagates JSON serialization failures.
pub fn encode_announcement(tag: &str, info: &HostInfo) -> Result<Vec<u8>, serde_json::Error> {
    let body = info.to_json()?;
    Ok(join_envelope(tag, body.as_bytes()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
