//! Protocol module containing the discovery announcement format, the
//! messaging frame codec, and the well-known port numbers.

pub mod discovery;
pub mod envelope;
pub mod frame;
pub mod ports;

pub use discovery::{decode_announcement, encode_announcement, DiscoveryParseError, DISCOVERY_TAG};
pub use envelope::{join_envelope, split_envelope, ENVELOPE_DELIMITER};
pub use frame::{decode_frame, encode_frame, Frame, FrameError, FRAME_HEADER_SIZE, MAX_FRAME_LEN};
pub use ports::{ClientPort, ServerPort};
