//! Binary frame codec for the messaging channels.
//!
//! Wire format:
//! ```text
//! [flags:1][payload_len:4][payload:N]
//! ```
//! Header size: 5 bytes.  `payload_len` is big-endian.
//!
//! # Multi-frame messages
//!
//! A reply on the service channel may be split across several frames.  Every
//! frame except the last carries [`Frame::FLAG_MORE`]; the receiver keeps
//! reading and concatenates payloads in arrival order until it sees a frame
//! with the flag clear.
//!
//! # Streaming decode
//!
//! TCP delivers a byte stream, not frames, so a read may end in the middle of
//! a frame.  [`decode_frame`] reports that case as
//! [`FrameError::InsufficientData`]; the caller keeps the buffered bytes and
//! retries after the next read.

use thiserror::Error;

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 5;

/// Largest payload accepted by [`decode_frame`] (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer does not yet hold a complete frame.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The flags byte has bits set that this codec does not understand.
    #[error("unknown frame flags: 0x{0:02X}")]
    UnknownFlags(u8),

    /// The declared payload length exceeds [`MAX_FRAME_LEN`].
    #[error("frame too large: {len} bytes (max {MAX_FRAME_LEN})")]
    TooLarge { len: usize },
}

impl FrameError {
    /// Returns `true` when the error only means "read more bytes first".
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::InsufficientData { .. })
    }
}

/// One frame on a messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// `true` if another frame of the same message follows.
    pub more: bool,
}

impl Frame {
    /// Flag bit marking a continuation frame.
    pub const FLAG_MORE: u8 = 0x01;

    /// Creates a final (single or last) frame.
    pub fn last(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            more: false,
        }
    }

    /// Creates a frame that announces another frame follows.
    pub fn continued(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            more: true,
        }
    }

    fn flags(&self) -> u8 {
        if self.more {
            Self::FLAG_MORE
        } else {
            0
        }
    }
}

/// Encodes `frame` including its 5-byte header.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if the payload exceeds [`MAX_FRAME_LEN`].
///
/// # Examples
///
/// ```rust
/// use irxr_core::{decode_frame, encode_frame, Frame};
///
/// let bytes = encode_frame(&Frame::last(b"pose:1".to_vec())).unwrap();
/// let (frame, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.payload, b"pose:1");
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let len = frame.payload.len();
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + len);
    buf.push(frame.flags());
    buf.extend_from_slice(&(len as u32).to_be_bytes());
    buf.extend_from_slice(&frame.payload);
    Ok(buf)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes consumed so the caller can
/// advance its read cursor.
///
/// # Errors
///
/// - [`FrameError::InsufficientData`] if `bytes` ends before the frame does.
/// - [`FrameError::UnknownFlags`] for reserved flag bits.
/// - [`FrameError::TooLarge`] if the declared length exceeds [`MAX_FRAME_LEN`].
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameError> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::InsufficientData {
            needed: FRAME_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let flags = bytes[0];
    if flags & !Frame::FLAG_MORE != 0 {
        return Err(FrameError::UnknownFlags(flags));
    }

    let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }

    let total = FRAME_HEADER_SIZE + len;
    if bytes.len() < total {
        return Err(FrameError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    let frame = Frame {
        payload: bytes[FRAME_HEADER_SIZE..total].to_vec(),
        more: flags & Frame::FLAG_MORE != 0,
    };
    Ok((frame, total))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
