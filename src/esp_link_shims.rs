//! `critical-section` 1.x implementation for the ESP-IDF target.
//!
//! [`crate::irq::CriticalSectionIrq`] and the tick counter mutex both
//! lock through `critical-section`.  The tick callback runs in the
//! esp_timer task rather than a hardware ISR, so a process-wide mutex is
//! enough to exclude it.  The restore token records whether an acquire
//! took the mutex (`1`) or nested inside a section this thread already
//! holds (`0`); only the former releases it.

use core::cell::{Cell, RefCell};
use std::sync::{Mutex, MutexGuard, PoisonError};

use critical_section::RawRestoreState;

const OUTERMOST: RawRestoreState = 1;
const NESTED: RawRestoreState = 0;

static SECTION: Mutex<()> = Mutex::new(());

thread_local! {
    static HELD: Cell<bool> = const { Cell::new(false) };
    static GUARD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

struct IdfCriticalSection;
critical_section::set_impl!(IdfCriticalSection);

// SAFETY: the mutex excludes every other thread while a section is held;
// the thread-local flag makes re-entry on the owning thread a no-op.
unsafe impl critical_section::Impl for IdfCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        if HELD.with(Cell::get) {
            return NESTED;
        }
        // The guarded value is `()`; a poisoned lock carries no torn state.
        let guard = SECTION.lock().unwrap_or_else(PoisonError::into_inner);
        GUARD.with(|g| *g.borrow_mut() = Some(guard));
        HELD.with(|h| h.set(true));
        OUTERMOST
    }

    unsafe fn release(token: RawRestoreState) {
        if token != OUTERMOST {
            return;
        }
        HELD.with(|h| h.set(false));
        GUARD.with(|g| g.borrow_mut().take());
    }
}
