//! Frame transport over the host UART.
//!
//! ```text
//!   UART RX irq ──▶ on_rx_interrupt ──▶ rx queue (4) ──▶ work ──▶ MessageHandler
//!                                                          │
//!   UART TX irq ◀── on_tx_interrupt ◀── tx queue (4) ◀── send ◀─┘ (reply)
//! ```
//!
//! The interrupt entry points run with interrupts masked and touch the
//! queues directly.  Foreground methods enter an [`IrqGuard`] first.

use heapless::Deque;
use log::{debug, info, warn};

use super::MessageHandler;
use super::frame::{
    ErrorCode, FC_ACK, FC_REQ_ACK, FC_RESET, FRAME_LEN, Frame, LOCAL_ADDRESS,
};
use crate::app::ports::SerialPort;
use crate::irq::{IrqControl, IrqGuard};

pub const TX_QUEUE_LEN: usize = 4;
pub const RX_QUEUE_LEN: usize = 4;

/// Centisecond ticks of silence after which a partial frame is dropped.
/// The count is per byte, not per frame: every received byte restarts it.
pub const RX_TIMEOUT_TICKS: u16 = 50;

// ── Receive side ──────────────────────────────────────────────

struct RxState {
    queue: Deque<Frame, RX_QUEUE_LEN>,
    buf: [u8; FRAME_LEN],
    byte_ptr: usize,
    timeout: u16,
    dropped: u32,
}

impl RxState {
    const fn new() -> Self {
        Self {
            queue: Deque::new(),
            buf: [0; FRAME_LEN],
            byte_ptr: 0,
            timeout: 0,
            dropped: 0,
        }
    }

    fn push_byte(&mut self, byte: u8) {
        if self.queue.is_full() {
            self.dropped = self.dropped.wrapping_add(1);
            return;
        }
        self.buf[self.byte_ptr] = byte;
        self.byte_ptr += 1;
        self.timeout = 0;
        if self.byte_ptr >= FRAME_LEN {
            self.byte_ptr = 0;
            let _ = self.queue.push_back(Frame::from_bytes(&self.buf));
        }
    }
}

// ── Transmit side ─────────────────────────────────────────────

struct TxState {
    queue: Deque<Frame, TX_QUEUE_LEN>,
    /// Bytes of the head frame already on the wire.
    byte_ptr: usize,
    seq: u8,
    overflows: u32,
}

impl TxState {
    const fn new() -> Self {
        Self {
            queue: Deque::new(),
            byte_ptr: 0,
            seq: 0,
            overflows: 0,
        }
    }

    /// Hand the next byte of the head frame to the UART.
    fn put_next_byte<U: SerialPort>(&mut self, serial: &mut U) -> bool {
        let Some(head) = self.queue.front() else {
            return false;
        };
        if !serial.tx_ready() {
            return false;
        }
        let byte = head.to_bytes()[self.byte_ptr];
        self.byte_ptr += 1;
        if self.byte_ptr >= FRAME_LEN {
            self.byte_ptr = 0;
            self.queue.pop_front();
            if self.queue.is_empty() {
                serial.set_tx_interrupt(false);
            }
        }
        serial.write_byte(byte);
        true
    }
}

// ── Link ──────────────────────────────────────────────────────

pub struct CommLink<U: SerialPort, I: IrqControl> {
    serial: U,
    irq: I,
    rx: RxState,
    tx: TxState,
    reported_drops: u32,
}

impl<U: SerialPort, I: IrqControl> CommLink<U, I> {
    pub fn new(serial: U, irq: I) -> Self {
        Self {
            serial,
            irq,
            rx: RxState::new(),
            tx: TxState::new(),
            reported_drops: 0,
        }
    }

    /// Queue `frame` for `dest`.  Stamps the sequence number and checksum.
    ///
    /// With a full queue the head frame is pushed out synchronously first.
    /// It is tagged [`ErrorCode::Queue`] if none of its bytes were sent
    /// yet, otherwise the new frame carries the tag.
    pub fn send(&mut self, mut frame: Frame, dest: u8) {
        frame.set_dst(dest);

        let mut guard = IrqGuard::new(&mut self.irq);
        frame.seq = self.tx.seq;
        self.tx.seq = self.tx.seq.wrapping_add(1);
        frame.seal();

        if self.tx.queue.is_full() {
            self.tx.overflows = self.tx.overflows.wrapping_add(1);
            match self.tx.queue.front_mut() {
                Some(head) if self.tx.byte_ptr == 0 => {
                    head.set_error_code(ErrorCode::Queue);
                    head.seal();
                }
                _ => {
                    frame.set_error_code(ErrorCode::Queue);
                    frame.seal();
                }
            }
            while self.tx.queue.is_full() {
                self.tx.put_next_byte(&mut self.serial);
                guard.breathe();
            }
        }

        let _ = self.tx.queue.push_back(frame);
        self.serial.set_tx_interrupt(true);
        self.tx.put_next_byte(&mut self.serial);
        drop(guard);
    }

    /// UART receive interrupt: move every available byte into the frame
    /// buffer.  Each byte restarts the partial-frame timeout.
    pub fn on_rx_interrupt(&mut self) {
        while let Some(byte) = self.serial.read_byte() {
            self.rx.push_byte(byte);
        }
    }

    /// UART transmitter-ready interrupt.
    pub fn on_tx_interrupt(&mut self) {
        self.tx.put_next_byte(&mut self.serial);
    }

    /// Called every 10 ms.  Drops a partial frame after 0.5 s of silence.
    pub fn centisecond_tick(&mut self) {
        let _guard = IrqGuard::new(&mut self.irq);
        if self.rx.byte_ptr > 0 {
            self.rx.timeout += 1;
        }
        if self.rx.timeout > RX_TIMEOUT_TICKS {
            debug!("comm: rx timeout, dropping {} bytes", self.rx.byte_ptr);
            self.rx.byte_ptr = 0;
            self.rx.timeout = 0;
        }
    }

    /// Process at most one received frame.
    pub fn work<H: MessageHandler + ?Sized>(&mut self, handler: &mut H) {
        let (frame, dropped) = {
            let _guard = IrqGuard::new(&mut self.irq);
            (self.rx.queue.pop_front(), self.rx.dropped)
        };
        if dropped != self.reported_drops {
            warn!("comm: rx queue overflow, {} bytes dropped", dropped);
            self.reported_drops = dropped;
        }
        if let Some(frame) = frame {
            self.handle(&frame, handler);
        }
    }

    fn handle<H: MessageHandler + ?Sized>(&mut self, frame: &Frame, handler: &mut H) {
        if frame.dst() != LOCAL_ADDRESS {
            debug!("comm: frame for {} ignored", frame.dst());
            return;
        }

        let mut reply = Frame::new();
        if !frame.fcs_ok() {
            debug!("comm: fcs mismatch (seq {})", frame.seq);
            reply.set_error_code(ErrorCode::Fcs);
        } else if frame.has(FC_RESET) {
            self.reset();
            reply.set_error_code(ErrorCode::Ok);
        } else if !handler.handle(frame, &mut reply.payload) {
            debug!("comm: request {} rejected", frame.payload[0]);
            reply.set_error_code(ErrorCode::Fail);
        }

        if frame.has(FC_REQ_ACK) {
            reply.fc |= FC_ACK;
            self.send(reply, frame.src());
        }
    }

    /// Clear queues, buffers, counters and the sequence number.
    pub fn reset(&mut self) {
        let _guard = IrqGuard::new(&mut self.irq);
        self.rx = RxState::new();
        self.tx = TxState::new();
        self.reported_drops = 0;
        self.serial.set_tx_interrupt(false);
        info!("comm: link reset");
    }

    /// Push every queued byte out synchronously.
    pub fn drain_tx(&mut self) {
        let mut guard = IrqGuard::new(&mut self.irq);
        while !self.tx.queue.is_empty() {
            self.tx.put_next_byte(&mut self.serial);
            guard.breathe();
        }
    }

    pub fn tx_pending(&self) -> usize {
        self.tx.queue.len()
    }

    pub fn rx_pending(&self) -> usize {
        self.rx.queue.len()
    }

    /// Bytes of the frame currently being received.
    pub fn rx_partial(&self) -> usize {
        self.rx.byte_ptr
    }

    pub fn dropped_bytes(&self) -> u32 {
        self.rx.dropped
    }

    pub fn tx_overflows(&self) -> u32 {
        self.tx.overflows
    }

    pub fn serial(&self) -> &U {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut U {
        &mut self.serial
    }

    pub fn irq(&self) -> &I {
        &self.irq
    }
}
