//! The `name:body` envelope carried inside every messaging frame.
//!
//! Topic frames are `<topic>:<payload>` and request frames are
//! `<service>:<body>`.  Only the *first* delimiter separates the name; the body
//! may itself contain any number of `:` characters (JSON usually does).

/// Separator between the name and the body.
pub const ENVELOPE_DELIMITER: char = ':';

/// Splits `message` at the first [`ENVELOPE_DELIMITER`].
///
/// Returns `None` when the message contains no delimiter at all.
///
/// # Examples
///
/// ```rust
/// use irxr_core::protocol::split_envelope;
///
/// assert_eq!(split_envelope("pose:{\"x\":1}"), Some(("pose", "{\"x\":1}")));
/// assert_eq!(split_envelope("pose"), None);
/// ```
pub fn split_envelope(message: &str) -> Option<(&str, &str)> {
    message.split_once(ENVELOPE_DELIMITER)
}

/// Builds `<name>:<body>` as bytes.
pub fn join_envelope(name: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1 + body.len());
    out.extend_from_slice(name.as_bytes());
    out.push(ENVELOPE_DELIMITER as u8);
    out.extend_from_slice(body);
    out
}
