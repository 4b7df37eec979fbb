//! Fixed-length host frame and its checksum.
//!
//! Wire format (18 bytes):
//! ```text
//! ┌────┬─────┬──────┬──────┬──────────────────┬─────────┐
//! │ fc │ seq │ addr │ rsvd │ payload (12 B)   │ fcs LE  │
//! └────┴─────┴──────┴──────┴──────────────────┴─────────┘
//!   fc:   bit0 RESET, bit1 REQ_ACK, bit2 ACK, bits 6-7 error code
//!   addr: low nibble source, high nibble destination
//!   fcs:  CRC-16 over the first 16 bytes
//! ```

/// Bytes before the payload.
pub const HEADER_LEN: usize = 4;
/// Application payload bytes per frame.
pub const PAYLOAD_LEN: usize = 12;
/// Checksum bytes.
pub const FCS_LEN: usize = 2;
/// Total frame length on the wire.
pub const FRAME_LEN: usize = HEADER_LEN + PAYLOAD_LEN + FCS_LEN;

/// Address of this controller on the bus.
pub const LOCAL_ADDRESS: u8 = 0;

pub const FC_RESET: u8 = 1 << 0;
pub const FC_REQ_ACK: u8 = 1 << 1;
pub const FC_ACK: u8 = 1 << 2;

const FC_ERR_SHIFT: u8 = 6;
const FC_ERR_MASK: u8 = 0b11 << FC_ERR_SHIFT;

/// Result code carried in the top two frame-control bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    /// Handler rejected the request.
    Fail = 1,
    /// Checksum mismatch.
    Fcs = 2,
    /// Transmit queue overflowed.
    Queue = 3,
}

impl ErrorCode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Ok,
            1 => Self::Fail,
            2 => Self::Fcs,
            _ => Self::Queue,
        }
    }
}

/// CRC-16 with init 0xFFFF, reflected polynomial 0xA001 and final
/// complement (CRC-16/USB).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in data {
        crc ^= u16::from(b);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
        }
    }
    crc ^ 0xFFFF
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub fc: u8,
    pub seq: u8,
    pub addr: u8,
    pub reserved: u8,
    pub payload: [u8; PAYLOAD_LEN],
    pub fcs: u16,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    /// Empty frame sourced from the local address.
    pub const fn new() -> Self {
        Self {
            fc: 0,
            seq: 0,
            addr: LOCAL_ADDRESS & 0x0F,
            reserved: 0,
            payload: [0; PAYLOAD_LEN],
            fcs: 0,
        }
    }

    pub fn with_payload(payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            payload,
            ..Self::new()
        }
    }

    pub fn src(&self) -> u8 {
        self.addr & 0x0F
    }

    pub fn dst(&self) -> u8 {
        self.addr >> 4
    }

    pub fn set_src(&mut self, addr: u8) {
        self.addr = (self.addr & 0xF0) | (addr & 0x0F);
    }

    pub fn set_dst(&mut self, addr: u8) {
        self.addr = (self.addr & 0x0F) | (addr << 4);
    }

    pub fn has(&self, flag: u8) -> bool {
        self.fc & flag != 0
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_bits(self.fc >> FC_ERR_SHIFT)
    }

    pub fn set_error_code(&mut self, code: ErrorCode) {
        self.fc = (self.fc & !FC_ERR_MASK) | ((code as u8) << FC_ERR_SHIFT);
    }

    /// Checksum over everything but the fcs field.
    pub fn compute_fcs(&self) -> u16 {
        crc16(&self.to_bytes()[..FRAME_LEN - FCS_LEN])
    }

    /// Recompute and store the checksum.
    pub fn seal(&mut self) {
        self.fcs = self.compute_fcs();
    }

    pub fn fcs_ok(&self) -> bool {
        self.fcs == self.compute_fcs()
    }

    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[0] = self.fc;
        out[1] = self.seq;
        out[2] = self.addr;
        out[3] = self.reserved;
        out[HEADER_LEN..HEADER_LEN + PAYLOAD_LEN].copy_from_slice(&self.payload);
        out[FRAME_LEN - FCS_LEN..].copy_from_slice(&self.fcs.to_le_bytes());
        out
    }

    /// Reassemble a frame from raw bytes.  The checksum is taken as-is;
    /// callers check it with [`fcs_ok`](Self::fcs_ok).
    pub fn from_bytes(b: &[u8; FRAME_LEN]) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&b[HEADER_LEN..HEADER_LEN + PAYLOAD_LEN]);
        Self {
            fc: b[0],
            seq: b[1],
            addr: b[2],
            reserved: b[3],
            payload,
            fcs: u16::from_le_bytes([b[FRAME_LEN - 2], b[FRAME_LEN - 1]]),
        }
    }

    /// Decode the first frame in `data`, if it is long enough.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let bytes: &[u8; FRAME_LEN] = data.get(..FRAME_LEN)?.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }
}
