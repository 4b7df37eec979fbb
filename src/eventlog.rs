//! RAM event log fetched by the host.
//!
//! A bounded FIFO of timestamped [`LogItem`]s.  When the ring is full the
//! oldest item is dropped; the next item handed out carries
//! [`LOG_OVERFLOW`] so the host knows entries were lost.

use heapless::Deque;
use log::debug;

pub const LOG_CAPACITY: usize = 32;

/// Set in `type_flags` of the first item popped after a drop.
pub const LOG_OVERFLOW: u8 = 0x80;

const KIND_MASK: u8 = 0x7F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogKind {
    Error = 0,
    Info = 1,
    SensorData = 2,
}

impl LogKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Error),
            1 => Some(Self::Info),
            2 => Some(Self::SensorData),
            _ => None,
        }
    }
}

/// Codes carried by [`LogKind::Error`] items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Implausible sensor reading.  Data: pot number.
    Sensor = 0,
    /// Watering watchdog fired.  Data: pot number.
    Watchdog = 1,
    /// Freeze expired without being renewed.
    FreezeTimeout = 2,
}

/// Codes carried by [`LogKind::Info`] items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoCode {
    Debug = 0,
    /// Pot state change.  Data: `(state << 4) | pot`.
    StateChange = 1,
    /// Watering started/stopped.  Data: pot number, bit 7 set on start.
    WateringChange = 2,
    /// Hardware on/off switch edge.  Data: 1 = on, 0 = off.
    OnOffSwitch = 3,
}

// ── Log item ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogItem {
    pub type_flags: u8,
    pub timestamp: u32,
    pub payload: [u8; 2],
}

impl LogItem {
    /// Encoded size: flags, LE32 timestamp, two payload bytes.
    pub const WIRE_LEN: usize = 7;

    pub fn error(code: ErrorCode, data: u8, timestamp: u32) -> Self {
        Self {
            type_flags: LogKind::Error as u8,
            timestamp,
            payload: [code as u8, data],
        }
    }

    pub fn info(code: InfoCode, data: u8, timestamp: u32) -> Self {
        Self {
            type_flags: LogKind::Info as u8,
            timestamp,
            payload: [code as u8, data],
        }
    }

    /// Raw sensor sample: `(pot << 10) | (raw & 0x3FF)`.
    pub fn sensor(pot: u8, raw: u16, timestamp: u32) -> Self {
        let word = ((pot as u16) << 10) | (raw & 0x3FF);
        Self {
            type_flags: LogKind::SensorData as u8,
            timestamp,
            payload: word.to_le_bytes(),
        }
    }

    pub fn kind(&self) -> Option<LogKind> {
        LogKind::from_u8(self.type_flags & KIND_MASK)
    }

    pub fn overflowed(&self) -> bool {
        self.type_flags & LOG_OVERFLOW != 0
    }

    pub fn code(&self) -> u8 {
        self.payload[0]
    }

    pub fn data(&self) -> u8 {
        self.payload[1]
    }

    pub fn sensor_word(&self) -> u16 {
        u16::from_le_bytes(self.payload)
    }

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let ts = self.timestamp.to_le_bytes();
        [
            self.type_flags,
            ts[0],
            ts[1],
            ts[2],
            ts[3],
            self.payload[0],
            self.payload[1],
        ]
    }

    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        let b = b.get(..Self::WIRE_LEN)?;
        Some(Self {
            type_flags: b[0],
            timestamp: u32::from_le_bytes([b[1], b[2], b[3], b[4]]),
            payload: [b[5], b[6]],
        })
    }
}

// ── Ring ──────────────────────────────────────────────────────

pub struct EventLog {
    items: Deque<LogItem, LOG_CAPACITY>,
    overflow: bool,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub const fn new() -> Self {
        Self {
            items: Deque::new(),
            overflow: false,
        }
    }

    pub fn append(&mut self, item: LogItem) {
        debug!(
            "log: kind={:?} code={} data={}",
            item.kind(),
            item.code(),
            item.data()
        );
        if self.items.is_full() {
            self.items.pop_front();
            self.overflow = true;
        }
        // Cannot fail: a slot was freed above if needed.
        let _ = self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<LogItem> {
        let mut item = self.items.pop_front()?;
        if self.overflow {
            item.type_flags |= LOG_OVERFLOW;
            self.overflow = false;
        }
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.overflow = false;
    }
}
