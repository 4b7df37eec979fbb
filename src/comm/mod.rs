//! Host link: framed, checksummed request/reply protocol over a UART.
//!
//! - [`frame`]: 18-byte frame layout and CRC-16.
//! - [`link`]: interrupt-fed queues, retransmission-free ACK replies.
//! - [`messages`]: payload codecs for the controller messages.

pub mod frame;
pub mod link;
pub mod messages;

pub use frame::{ErrorCode, FRAME_LEN, Frame, LOCAL_ADDRESS, PAYLOAD_LEN, crc16};
pub use link::CommLink;
pub use messages::{ManualMode, Message, MessageId};

/// Application side of the link.
pub trait MessageHandler {
    /// Handle one valid request addressed to us.  Write the reply payload
    /// into `reply`; return `false` to answer with [`ErrorCode::Fail`].
    fn handle(&mut self, request: &Frame, reply: &mut [u8; PAYLOAD_LEN]) -> bool;
}
