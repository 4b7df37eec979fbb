//! Fuzz target: `CommLink` receive path
//!
//! Feeds arbitrary byte streams, interleaved with timeout ticks, into the
//! link and checks that the queues stay bounded and the transmit path
//! always drains.
//!
//! cargo fuzz run fuzz_comm_link

#![no_main]

use irrigator::adapters::hardware::SimSerial;
use irrigator::comm::link::{RX_QUEUE_LEN, TX_QUEUE_LEN};
use irrigator::comm::{CommLink, Frame, MessageHandler, PAYLOAD_LEN};
use irrigator::irq::FlagIrq;
use libfuzzer_sys::fuzz_target;

struct Echo;

impl MessageHandler for Echo {
    fn handle(&mut self, req: &Frame, reply: &mut [u8; PAYLOAD_LEN]) -> bool {
        *reply = req.payload;
        req.payload[0] & 1 == 0
    }
}

fuzz_target!(|data: &[u8]| {
    let mut link = CommLink::new(SimSerial::default(), FlagIrq::default());
    let mut handler = Echo;

    // 0xFF in the stream stands for "silence long enough to time out".
    for chunk in data.split(|&b| b == 0xFF) {
        link.serial_mut().rx.extend(chunk.iter().copied());
        link.on_rx_interrupt();
        assert!(link.rx_pending() <= RX_QUEUE_LEN);
        link.work(&mut handler);
        assert!(link.tx_pending() <= TX_QUEUE_LEN);
        for _ in 0..60 {
            link.centisecond_tick();
        }
    }

    link.drain_tx();
    assert_eq!(link.tx_pending(), 0);
});
