//! Fuzz target: `Frame::decode` / `Message::decode`
//!
//! Drives arbitrary bytes through the frame and payload decoders and
//! asserts that they never panic and that any frame which passes the
//! checksum re-encodes to the same bytes.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use irrigator::comm::{FRAME_LEN, Frame, Message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(frame) = Frame::decode(data) else {
        assert!(data.len() < FRAME_LEN);
        return;
    };
    assert_eq!(&frame.to_bytes()[..], &data[..FRAME_LEN]);

    // Decoded messages re-encode to a payload that decodes identically.
    if let Ok(msg) = Message::decode(&frame.payload) {
        assert_eq!(Message::decode(&msg.encode()), Ok(msg));
    }
});
