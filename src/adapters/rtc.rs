//! Real-time clock adapters.
//!
//! - **`target_os = "espidf"`**: [`SystemRtc`] keeps wall-clock time in the
//!   ESP-IDF system clock (`gettimeofday` / `settimeofday`), which the
//!   RTC domain preserves across light sleep.
//! - **`not(target_os = "espidf")`**: [`SimRtc`] holds a settable time for
//!   host tests and simulation.

use crate::app::ports::RtcPort;
use crate::datetime::RtcTime;
use crate::error::RtcError;

// ── Simulation ────────────────────────────────────────────────

/// In-memory clock.  Reads return the last written time unchanged.
#[derive(Debug, Default)]
pub struct SimRtc {
    time: RtcTime,
    fail: bool,
}

impl SimRtc {
    pub fn new(time: RtcTime) -> Self {
        Self { time, fail: false }
    }

    /// Make every subsequent access fail with [`RtcError::Unavailable`].
    pub fn set_failing(&mut self, fail: bool) {
        self.fail = fail;
    }
}

impl RtcPort for SimRtc {
    fn read_time(&mut self) -> Result<RtcTime, RtcError> {
        if self.fail {
            return Err(RtcError::Unavailable);
        }
        Ok(self.time)
    }

    fn write_time(&mut self, time: &RtcTime) -> Result<(), RtcError> {
        if self.fail {
            return Err(RtcError::Unavailable);
        }
        if !time.is_valid() {
            return Err(RtcError::InvalidTime);
        }
        self.time = *time;
        Ok(())
    }
}

// ── ESP-IDF system clock ──────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::SystemRtc;

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use esp_idf_svc::sys::{gettimeofday, gmtime_r, mktime, settimeofday, time_t, timeval, tm};
    use log::info;

    pub struct SystemRtc;

    impl SystemRtc {
        pub fn new() -> Self {
            info!("SystemRtc: using ESP-IDF system clock (UTC)");
            Self
        }
    }

    impl Default for SystemRtc {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RtcPort for SystemRtc {
        fn read_time(&mut self) -> Result<RtcTime, RtcError> {
            let mut tv = timeval { tv_sec: 0, tv_usec: 0 };
            // SAFETY: tv is a valid out-pointer; tz is unused.
            if unsafe { gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
                return Err(RtcError::Unavailable);
            }
            let secs = tv.tv_sec as time_t;
            // SAFETY: all-zero is a valid `tm`.
            let mut t: tm = unsafe { core::mem::zeroed() };
            if unsafe { gmtime_r(&secs, &mut t) }.is_null() {
                return Err(RtcError::Unavailable);
            }
            let time = RtcTime {
                second: t.tm_sec.clamp(0, 59) as u8,
                minute: t.tm_min as u8,
                hour: t.tm_hour as u8,
                day: (t.tm_mday - 1) as u8,
                month: t.tm_mon as u8,
                year: (t.tm_year - 100).clamp(0, 99) as u8,
                // tm_wday counts from Sunday.
                day_of_week: ((t.tm_wday + 6) % 7) as u8,
            };
            if time.is_valid() {
                Ok(time)
            } else {
                Err(RtcError::InvalidTime)
            }
        }

        fn write_time(&mut self, time: &RtcTime) -> Result<(), RtcError> {
            if !time.is_valid() {
                return Err(RtcError::InvalidTime);
            }
            // SAFETY: all-zero is a valid `tm`.
            let mut t: tm = unsafe { core::mem::zeroed() };
            t.tm_sec = i32::from(time.second);
            t.tm_min = i32::from(time.minute);
            t.tm_hour = i32::from(time.hour);
            t.tm_mday = i32::from(time.day) + 1;
            t.tm_mon = i32::from(time.month);
            t.tm_year = i32::from(time.year) + 100;
            // The system clock runs in UTC (TZ unset), so mktime is timegm.
            let secs = unsafe { mktime(&mut t) };
            if secs < 0 {
                return Err(RtcError::InvalidTime);
            }
            let tv = timeval { tv_sec: secs, tv_usec: 0 };
            // SAFETY: tv is a valid in-pointer; tz is unused.
            if unsafe { settimeofday(&tv, core::ptr::null()) } != 0 {
                return Err(RtcError::Unavailable);
            }
            Ok(())
        }
    }
}
