//! Application messages carried in the frame payload.
//!
//! Byte 0 of every payload is the [`MessageId`]; the body follows with
//! multi-byte fields little-endian.
//!
//! | Id | Message               | Body                                          |
//! |----|-----------------------|-----------------------------------------------|
//! |  0 | LOG                   | log item (7 B)                                |
//! |  2 | RTC                   | sec, min, hour, day, month, year, dow         |
//! |  4 | CONTR_CONF            | flags, lowest u16, highest u16                |
//! |  6 | POT_CONF              | pot, flags, min, max, from u16, to u16, dow   |
//! |  8 | POT_STATE             | pot, state, watering, raw u16, value          |
//! | 10 | POT_REM_STATE         | pot, flags                                    |
//! | 12 | MAN_MODE              | stop, manual, state, flags, start masks       |
//! |  7, 9, 11 | *_FETCH (pot) | pot                                           |
//! |  1, 3, 5, 13 | *_FETCH    | (empty)                                       |

use super::frame::PAYLOAD_LEN;
use crate::config::{GlobalConfig, POT_COUNT, PotConfig, RemanentState};
use crate::controller::PotState;
use crate::datetime::{RtcTime, TimeOfDayRange};
use crate::error::CommError;
use crate::eventlog::LogItem;
use crate::fsm::PotStateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Log = 0,
    LogFetch = 1,
    Rtc = 2,
    RtcFetch = 3,
    ContrConf = 4,
    ContrConfFetch = 5,
    PotConf = 6,
    PotConfFetch = 7,
    PotState = 8,
    PotStateFetch = 9,
    PotRemState = 10,
    PotRemStateFetch = 11,
    ManMode = 12,
    ManModeFetch = 13,
}

impl MessageId {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Log,
            1 => Self::LogFetch,
            2 => Self::Rtc,
            3 => Self::RtcFetch,
            4 => Self::ContrConf,
            5 => Self::ContrConfFetch,
            6 => Self::PotConf,
            7 => Self::PotConfFetch,
            8 => Self::PotState,
            9 => Self::PotStateFetch,
            10 => Self::PotRemState,
            11 => Self::PotRemStateFetch,
            12 => Self::ManMode,
            13 => Self::ManModeFetch,
            _ => return None,
        })
    }
}

// ── Manual mode flags ─────────────────────────────────────────

pub const MANFLG_FREEZE_CHANGE: u8 = 1 << 0;
pub const MANFLG_FREEZE_ENABLE: u8 = 1 << 1;
pub const MANFLG_NOTIFY_CHANGE: u8 = 1 << 2;
pub const MANFLG_NOTIFY_ENABLE: u8 = 1 << 3;

/// Body of MAN_MODE.  Bit `n` of each mask addresses pot `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManualMode {
    pub force_stop_mask: u8,
    pub manual_mask: u8,
    pub manual_state: u8,
    pub flags: u8,
    pub force_start_mask: u8,
}

impl ManualMode {
    /// Requested freeze state, if the message changes it.
    pub fn freeze(&self) -> Option<bool> {
        (self.flags & MANFLG_FREEZE_CHANGE != 0).then_some(self.flags & MANFLG_FREEZE_ENABLE != 0)
    }

    /// Requested notification LED state, if the message changes it.
    pub fn notify(&self) -> Option<bool> {
        (self.flags & MANFLG_NOTIFY_CHANGE != 0).then_some(self.flags & MANFLG_NOTIFY_ENABLE != 0)
    }
}

// ── Messages ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Log(LogItem),
    LogFetch,
    Rtc(RtcTime),
    RtcFetch,
    ContrConf(GlobalConfig),
    ContrConfFetch,
    PotConf { pot: u8, config: PotConfig },
    PotConfFetch { pot: u8 },
    PotState { pot: u8, state: PotState },
    PotStateFetch { pot: u8 },
    PotRemState { pot: u8, rem: RemanentState },
    PotRemStateFetch { pot: u8 },
    ManMode(ManualMode),
    ManModeFetch,
}

fn pot_nr(v: u8) -> Result<u8, CommError> {
    if usize::from(v) < POT_COUNT {
        Ok(v)
    } else {
        Err(CommError::InvalidPot(v))
    }
}

fn le16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

impl Message {
    pub fn id(&self) -> MessageId {
        match self {
            Self::Log(_) => MessageId::Log,
            Self::LogFetch => MessageId::LogFetch,
            Self::Rtc(_) => MessageId::Rtc,
            Self::RtcFetch => MessageId::RtcFetch,
            Self::ContrConf(_) => MessageId::ContrConf,
            Self::ContrConfFetch => MessageId::ContrConfFetch,
            Self::PotConf { .. } => MessageId::PotConf,
            Self::PotConfFetch { .. } => MessageId::PotConfFetch,
            Self::PotState { .. } => MessageId::PotState,
            Self::PotStateFetch { .. } => MessageId::PotStateFetch,
            Self::PotRemState { .. } => MessageId::PotRemState,
            Self::PotRemStateFetch { .. } => MessageId::PotRemStateFetch,
            Self::ManMode(_) => MessageId::ManMode,
            Self::ManModeFetch => MessageId::ManModeFetch,
        }
    }

    /// Serialize into a zero-padded payload.
    pub fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut p = [0u8; PAYLOAD_LEN];
        p[0] = self.id() as u8;
        let body = &mut p[1..];
        match self {
            Self::LogFetch | Self::RtcFetch | Self::ContrConfFetch | Self::ManModeFetch => {}
            Self::Log(item) => body[..LogItem::WIRE_LEN].copy_from_slice(&item.to_bytes()),
            Self::Rtc(t) => body[..RtcTime::WIRE_LEN].copy_from_slice(&t.to_bytes()),
            Self::ContrConf(g) => {
                body[0] = g.flags;
                body[1..3].copy_from_slice(&g.sensor_lowest_value.to_le_bytes());
                body[3..5].copy_from_slice(&g.sensor_highest_value.to_le_bytes());
            }
            Self::PotConf { pot, config } => {
                body[0] = *pot;
                body[1] = config.flags;
                body[2] = config.min_threshold;
                body[3] = config.max_threshold;
                body[4..6].copy_from_slice(&config.active_range.from.to_le_bytes());
                body[6..8].copy_from_slice(&config.active_range.to.to_le_bytes());
                body[8] = config.dow_on_mask;
            }
            Self::PotConfFetch { pot }
            | Self::PotStateFetch { pot }
            | Self::PotRemStateFetch { pot } => body[0] = *pot,
            Self::PotState { pot, state } => {
                body[0] = *pot;
                body[1] = state.state_id as u8;
                body[2] = u8::from(state.is_watering);
                body[3..5].copy_from_slice(&state.last_raw.to_le_bytes());
                body[5] = state.last_value;
            }
            Self::PotRemState { pot, rem } => {
                body[0] = *pot;
                body[1] = rem.flags;
            }
            Self::ManMode(m) => {
                body[..5].copy_from_slice(&[
                    m.force_stop_mask,
                    m.manual_mask,
                    m.manual_state,
                    m.flags,
                    m.force_start_mask,
                ]);
            }
        }
        p
    }

    /// Parse a payload.  Pot numbers are range-checked.
    pub fn decode(p: &[u8; PAYLOAD_LEN]) -> Result<Self, CommError> {
        let id = MessageId::from_u8(p[0]).ok_or(CommError::UnknownMessage(p[0]))?;
        let b = &p[1..];
        Ok(match id {
            MessageId::Log => {
                Self::Log(LogItem::from_bytes(b).ok_or(CommError::InvalidField("log item"))?)
            }
            MessageId::LogFetch => Self::LogFetch,
            MessageId::Rtc => {
                Self::Rtc(RtcTime::from_bytes(b).ok_or(CommError::InvalidField("rtc time"))?)
            }
            MessageId::RtcFetch => Self::RtcFetch,
            MessageId::ContrConf => Self::ContrConf(GlobalConfig {
                flags: b[0],
                sensor_lowest_value: le16(b, 1),
                sensor_highest_value: le16(b, 3),
            }),
            MessageId::ContrConfFetch => Self::ContrConfFetch,
            MessageId::PotConf => Self::PotConf {
                pot: pot_nr(b[0])?,
                config: PotConfig {
                    flags: b[1],
                    min_threshold: b[2],
                    max_threshold: b[3],
                    active_range: TimeOfDayRange {
                        from: le16(b, 4),
                        to: le16(b, 6),
                    },
                    dow_on_mask: b[8],
                },
            },
            MessageId::PotConfFetch => Self::PotConfFetch { pot: pot_nr(b[0])? },
            MessageId::PotState => Self::PotState {
                pot: pot_nr(b[0])?,
                state: PotState {
                    state_id: PotStateId::from_u8(b[1])
                        .ok_or(CommError::InvalidField("pot state"))?,
                    is_watering: b[2] != 0,
                    last_raw: le16(b, 3),
                    last_value: b[5],
                },
            },
            MessageId::PotStateFetch => Self::PotStateFetch { pot: pot_nr(b[0])? },
            MessageId::PotRemState => Self::PotRemState {
                pot: pot_nr(b[0])?,
                rem: RemanentState { flags: b[1] },
            },
            MessageId::PotRemStateFetch => Self::PotRemStateFetch { pot: pot_nr(b[0])? },
            MessageId::ManMode => Self::ManMode(ManualMode {
                force_stop_mask: b[0],
                manual_mask: b[1],
                manual_state: b[2],
                flags: b[3],
                force_start_mask: b[4],
            }),
            MessageId::ManModeFetch => Self::ManModeFetch,
        })
    }
}
