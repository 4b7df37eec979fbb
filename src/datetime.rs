//! Calendar time as kept by the real-time clock, plus the two compact
//! encodings derived from it: the packed log timestamp and the
//! time-of-day value used for pot activity windows.

use serde::{Deserialize, Serialize};

/// Time of day in units of two seconds since midnight (0..=43199).
pub type TimeOfDay = u16;

/// Wall-clock time.  All fields are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcTime {
    /// 0–59
    pub second: u8,
    /// 0–59
    pub minute: u8,
    /// 0–23
    pub hour: u8,
    /// 0–30
    pub day: u8,
    /// 0–11
    pub month: u8,
    /// Years since 2000, 0–99
    pub year: u8,
    /// 0 = Monday … 6 = Sunday
    pub day_of_week: u8,
}

impl RtcTime {
    pub const WIRE_LEN: usize = 7;

    pub fn is_valid(&self) -> bool {
        self.second <= 59
            && self.minute <= 59
            && self.hour <= 23
            && self.day <= 30
            && self.month <= 11
            && self.year <= 99
            && self.day_of_week <= 6
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        let secs = self.second as u32 + self.minute as u32 * 60 + self.hour as u32 * 3600;
        (secs / 2) as TimeOfDay
    }

    /// Bit of this weekday in a pot's day-of-week mask.
    pub fn weekday_bit(&self) -> u8 {
        1 << (self.day_of_week % 7)
    }

    /// Pack into the 32-bit log timestamp.
    ///
    /// ```text
    ///  31..26  25..22  21..17  16..12  11..6   5..0
    ///  year    month   day     hour    minute  second
    /// ```
    pub fn timestamp(&self) -> u32 {
        let sec = self.second.min(59) as u32;
        let min = self.minute.min(59) as u32;
        let hour = self.hour.min(23) as u32;
        let day = self.day.min(30) as u32;
        let month = self.month.min(11) as u32;
        let year = self.year.min(63) as u32;
        sec | (min << 6) | (hour << 12) | (day << 17) | (month << 22) | (year << 26)
    }

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        [
            self.second,
            self.minute,
            self.hour,
            self.day,
            self.month,
            self.year,
            self.day_of_week,
        ]
    }

    /// Decode the wire form.  `None` if too short or out of range.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let b = bytes.get(..Self::WIRE_LEN)?;
        let t = Self {
            second: b[0],
            minute: b[1],
            hour: b[2],
            day: b[3],
            month: b[4],
            year: b[5],
            day_of_week: b[6],
        };
        t.is_valid().then_some(t)
    }
}

/// Inclusive daily activity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDayRange {
    pub from: TimeOfDay,
    pub to: TimeOfDay,
}

impl TimeOfDayRange {
    /// The whole day.
    pub const ALWAYS: Self = Self {
        from: 0,
        to: 0xFFFF,
    };

    /// `from <= tod <= to`.  There is no wrap past midnight: a window
    /// with `from > to` matches nothing.
    pub fn contains(&self, tod: TimeOfDay) -> bool {
        tod >= self.from && tod <= self.to
    }
}

impl Default for TimeOfDayRange {
    fn default() -> Self {
        Self::ALWAYS
    }
}
