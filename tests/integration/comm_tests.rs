//! Host link behaviour seen from the wire.

use irrigator::comm::frame::{FC_ACK, FC_REQ_ACK, FC_RESET};
use irrigator::comm::messages::MessageId;
use irrigator::comm::{ErrorCode, FRAME_LEN, Frame, Message, PAYLOAD_LEN};
use irrigator::datetime::RtcTime;

use super::mock_hw::{Rig, host_frame};

fn frames(bytes: &[u8]) -> Vec<Frame> {
    assert_eq!(bytes.len() % FRAME_LEN, 0);
    bytes
        .chunks(FRAME_LEN)
        .map(|c| Frame::decode(c).expect("whole frame"))
        .collect()
}

#[test]
fn reply_mirrors_addresses_and_carries_ack() {
    let mut rig = Rig::new();
    let reply = rig.request(Message::RtcFetch);
    assert!(reply.has(FC_ACK));
    assert!(reply.fcs_ok());
    assert_eq!(reply.src(), 0);
    assert_eq!(reply.dst(), 1);
    assert_eq!(reply.error_code(), ErrorCode::Ok);
    assert_eq!(
        Message::decode(&reply.payload),
        Ok(Message::Rtc(RtcTime::default()))
    );
}

#[test]
fn sequence_numbers_increase_per_reply() {
    let mut rig = Rig::new();
    let seqs: Vec<u8> = (0..3).map(|_| rig.request(Message::RtcFetch).seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[test]
fn request_without_req_ack_is_executed_silently() {
    let mut rig = Rig::new();
    let t = RtcTime {
        hour: 7,
        day_of_week: 2,
        ..Default::default()
    };
    rig.inject(&host_frame(&Message::Rtc(t), 0).to_bytes());
    rig.run(1);
    assert!(rig.take_tx().is_empty());
    assert_eq!(rig.app.time(), t);
}

#[test]
fn acknowledgement_frames_are_not_dispatched() {
    let mut rig = Rig::new();
    let t = RtcTime {
        minute: 30,
        ..Default::default()
    };
    rig.inject(&host_frame(&Message::Rtc(t), FC_ACK).to_bytes());
    rig.run(1);
    assert!(rig.take_tx().is_empty());
    assert_eq!(rig.app.time(), RtcTime::default());
}

#[test]
fn corrupted_frame_gets_fcs_reply() {
    let mut rig = Rig::new();
    let mut bytes = host_frame(&Message::RtcFetch, FC_REQ_ACK).to_bytes();
    bytes[6] ^= 0x10;
    rig.inject(&bytes);
    rig.run(1);
    let reply = frames(&rig.take_tx()).remove(0);
    assert_eq!(reply.error_code(), ErrorCode::Fcs);
    assert_eq!(reply.payload, [0; PAYLOAD_LEN]);
}

#[test]
fn frames_for_other_nodes_are_ignored() {
    let mut rig = Rig::new();
    let mut f = host_frame(&Message::RtcFetch, FC_REQ_ACK);
    f.set_dst(3);
    f.seal();
    rig.inject(&f.to_bytes());
    rig.run(1);
    assert!(rig.take_tx().is_empty());
}

#[test]
fn unknown_message_and_bad_pot_fail() {
    let mut rig = Rig::new();

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0] = 0x7E;
    let mut f = Frame::with_payload(payload);
    f.fc = FC_REQ_ACK;
    f.set_src(1);
    f.seal();
    rig.inject(&f.to_bytes());
    rig.run(1);
    assert_eq!(frames(&rig.take_tx())[0].error_code(), ErrorCode::Fail);

    payload[0] = MessageId::PotConfFetch as u8;
    payload[1] = 6;
    let mut f = Frame::with_payload(payload);
    f.fc = FC_REQ_ACK;
    f.set_src(1);
    f.seal();
    rig.inject(&f.to_bytes());
    rig.run(1);
    assert_eq!(frames(&rig.take_tx())[0].error_code(), ErrorCode::Fail);
}

#[test]
fn reset_restarts_sequence_numbers() {
    let mut rig = Rig::new();
    rig.request(Message::RtcFetch);
    rig.request(Message::RtcFetch);

    let mut f = Frame::new();
    f.fc = FC_RESET | FC_REQ_ACK;
    f.set_src(1);
    f.seal();
    rig.inject(&f.to_bytes());
    rig.run(1);
    let reply = frames(&rig.take_tx()).remove(0);
    assert_eq!(reply.error_code(), ErrorCode::Ok);
    assert_eq!(reply.seq, 0);
    assert_eq!(rig.request(Message::RtcFetch).seq, 1);
}

#[test]
fn partial_frame_is_dropped_after_silence() {
    let mut rig = Rig::new();
    rig.inject(&[0xAA, 0x55]);
    rig.run_ms(400);
    assert_eq!(rig.app.comm().rx_partial(), 2);

    rig.run_ms(200);
    assert_eq!(rig.app.comm().rx_partial(), 0);
    assert!(rig.take_tx().is_empty());

    // The next frame is received aligned.
    let reply = rig.request(Message::RtcFetch);
    assert_eq!(reply.error_code(), ErrorCode::Ok);
}

#[test]
fn slow_frame_is_not_timed_out() {
    let mut rig = Rig::new();
    let bytes = host_frame(&Message::RtcFetch, FC_REQ_ACK).to_bytes();
    for b in bytes {
        rig.inject(&[b]);
        rig.run_ms(300);
    }
    let replies = frames(&rig.take_tx());
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].error_code(), ErrorCode::Ok);
}

#[test]
fn receive_queue_overflow_drops_bytes() {
    let mut rig = Rig::new();
    let bytes = host_frame(&Message::RtcFetch, FC_REQ_ACK).to_bytes();
    for _ in 0..5 {
        rig.app.comm_mut().serial_mut().rx.extend(bytes);
    }
    rig.app.on_uart_rx();
    assert_eq!(rig.app.comm().rx_pending(), 4);
    assert_eq!(rig.app.comm().dropped_bytes(), FRAME_LEN as u32);

    rig.run(4);
    let replies = frames(&rig.take_tx());
    assert_eq!(replies.len(), 4);
    assert!(replies.iter().all(|r| r.error_code() == ErrorCode::Ok));
}

#[test]
fn transmit_queue_overflow_tags_the_newest_reply() {
    let mut rig = Rig::new();
    let bytes = host_frame(&Message::RtcFetch, FC_REQ_ACK).to_bytes();

    // Nothing drains the UART: replies pile up.
    for _ in 0..4 {
        rig.inject(&bytes);
    }
    rig.run(4);
    assert_eq!(rig.app.comm().tx_pending(), 4);

    rig.inject(&bytes);
    rig.run(1);
    assert_eq!(rig.app.comm().tx_overflows(), 1);

    let replies = frames(&rig.take_tx());
    assert_eq!(replies.len(), 5);
    assert!(replies.iter().all(Frame::fcs_ok));
    assert!(replies[..4].iter().all(|r| r.error_code() == ErrorCode::Ok));
    assert_eq!(replies[4].error_code(), ErrorCode::Queue);
    let seqs: Vec<u8> = replies.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
}
