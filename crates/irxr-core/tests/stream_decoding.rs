//! Integration tests for decoding frames out of a byte stream.
//!
//! A TCP read can return any prefix of what the peer wrote.  These tests feed
//! the public codec the same bytes in awkward chunk sizes and check that the
//! frames that come out are exactly the frames that went in, and that a
//! multi-frame reply reassembles into one message.

use irxr_core::protocol::{join_envelope, split_envelope};
use irxr_core::{decode_frame, encode_frame, Frame};

/// Minimal stream reassembler mirroring what a socket reader does: append the
/// chunk, then pull out every complete frame.
fn feed(buffer: &mut Vec<u8>, chunk: &[u8], out: &mut Vec<Frame>) {
    buffer.extend_from_slice(chunk);
    loop {
        match decode_frame(buffer) {
            Ok((frame, used)) => {
                buffer.drain(..used);
                out.push(frame);
            }
            Err(e) if e.is_incomplete() => break,
            Err(e) => panic!("unexpected decode error: {e}"),
        }
    }
}

fn reply_stream() -> Vec<u8> {
    let mut stream = Vec::new();
    stream.extend(encode_frame(&Frame::continued(b"hel".to_vec())).unwrap());
    stream.extend(encode_frame(&Frame::last(b"lo".to_vec())).unwrap());
    stream.extend(encode_frame(&Frame::last(join_envelope("pose", b"1,2,3"))).unwrap());
    stream
}

#[test]
fn test_byte_at_a_time_yields_same_frames() {
    // Arrange
    let stream = reply_stream();
    let mut buffer = Vec::new();
    let mut frames = Vec::new();

    // Act
    for byte in &stream {
        feed(&mut buffer, std::slice::from_ref(byte), &mut frames);
    }

    // Assert
    assert_eq!(frames.len(), 3);
    assert!(buffer.is_empty(), "no bytes may be left over");
}

#[test]
fn test_odd_chunk_sizes_yield_same_frames() {
    let stream = reply_stream();
    for chunk_size in [2usize, 3, 7, 11] {
        let mut buffer = Vec::new();
        let mut frames = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            feed(&mut buffer, chunk, &mut frames);
        }
        assert_eq!(frames.len(), 3, "chunk size {chunk_size}");
    }
}

#[test]
fn test_continuation_frames_concatenate_in_arrival_order() {
    // Arrange
    let stream = reply_stream();
    let mut buffer = Vec::new();
    let mut frames = Vec::new();
    feed(&mut buffer, &stream, &mut frames);

    // Act: reassemble the first message (frames up to and including !more).
    let mut reply = Vec::new();
    for frame in &frames {
        reply.extend_from_slice(&frame.payload);
        if !frame.more {
            break;
        }
    }

    // Assert
    assert_eq!(reply, b"hello");
}

#[test]
fn test_topic_frame_splits_into_topic_and_payload() {
    let bytes = encode_frame(&Frame::last(join_envelope("pose", b"{\"x\":1}"))).unwrap();
    let (frame, _) = decode_frame(&bytes).unwrap();
    let text = String::from_utf8(frame.payload).unwrap();
    assert_eq!(split_envelope(&text), Some(("pose", "{\"x\":1}")));
}
