//! System tick ("jiffies") arithmetic.
//!
//! The timer interrupt advances a 32-bit counter at [`JIFFIES_PER_SECOND`].
//! The counter wraps after ~248 days, so deadlines are never compared with
//! `<`/`>` directly: use [`time_after`] / [`time_before`], which interpret
//! the wrapping difference as a signed value.

/// One tick of the 200 Hz system timer.
pub type Jiffies = u32;

/// Timer frequency.
pub const JIFFIES_PER_SECOND: u32 = 200;

/// `true` if `a` lies after `b`.
#[inline]
pub const fn time_after(a: Jiffies, b: Jiffies) -> bool {
    (b.wrapping_sub(a) as i32) < 0
}

/// `true` if `a` lies before `b`.
#[inline]
pub const fn time_before(a: Jiffies, b: Jiffies) -> bool {
    time_after(b, a)
}

/// Milliseconds to jiffies, rounded up so a delay is never shortened.
pub const fn msec_to_jiffies(ms: u32) -> Jiffies {
    ((ms as u64 * JIFFIES_PER_SECOND as u64).div_ceil(1000)) as Jiffies
}

pub const fn sec_to_jiffies(secs: u32) -> Jiffies {
    secs.wrapping_mul(JIFFIES_PER_SECOND)
}
