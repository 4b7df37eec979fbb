//! Interrupt-masking critical sections for ISR-shared state.
//!
//! Foreground code that touches data also mutated from interrupt context
//! wraps the access in an [`IrqGuard`]:
//!
//! ```text
//!   guard = IrqGuard::new(irq)   // disable, remember prior state
//!   ...mutate shared state...
//!   drop(guard)                  // restore *prior* state
//! ```
//!
//! Restoring the prior state (instead of unconditionally enabling) keeps
//! nested sections correct: an inner guard taken while interrupts are
//! already off must leave them off.
//!
//! Busy loops that need the ISR to make progress while holding a guard
//! call [`IrqGuard::breathe`], which re-opens interrupts for an instant
//! only if they were enabled when the guard was taken.

use heapless::Vec;

/// Controls the CPU interrupt-enable state.
pub trait IrqControl {
    /// Disable interrupts and return whether they were enabled before.
    fn disable_save(&mut self) -> bool;

    /// Return to the state reported by the matching [`disable_save`](Self::disable_save).
    fn restore(&mut self, was_enabled: bool);
}

// ── Guard ─────────────────────────────────────────────────────

/// RAII critical section.  Interrupts are masked for the guard's lifetime.
pub struct IrqGuard<'a, I: IrqControl> {
    irq: &'a mut I,
    was_enabled: bool,
}

impl<'a, I: IrqControl> IrqGuard<'a, I> {
    pub fn new(irq: &'a mut I) -> Self {
        let was_enabled = irq.disable_save();
        Self { irq, was_enabled }
    }

    /// Whether interrupts were enabled when this section was entered.
    pub fn irqs_were_enabled(&self) -> bool {
        self.was_enabled
    }

    /// Briefly let pending interrupts run, then mask them again.
    /// No-op when the section was entered with interrupts already off.
    pub fn breathe(&mut self) {
        if self.was_enabled {
            self.irq.restore(true);
            let _ = self.irq.disable_save();
        }
    }

    /// Enter a nested section.  Dropping it leaves interrupts masked.
    pub fn nested(&mut self) -> IrqGuard<'_, I> {
        IrqGuard::new(self.irq)
    }
}

impl<I: IrqControl> Drop for IrqGuard<'_, I> {
    fn drop(&mut self) {
        self.irq.restore(self.was_enabled);
    }
}

// ── critical-section backed control ───────────────────────────

const MAX_NESTING: usize = 8;

/// [`IrqControl`] on top of the `critical-section` crate.
///
/// Each `disable_save` acquires a section and keeps its restore token;
/// `restore` releases the most recent one.  Interrupts count as enabled
/// when no section is held.
#[derive(Default)]
pub struct CriticalSectionIrq {
    held: Vec<critical_section::RestoreState, MAX_NESTING>,
    /// Saves past `MAX_NESTING`; the outer sections already mask interrupts.
    untracked: usize,
}

impl CriticalSectionIrq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.held.len() + self.untracked
    }
}

impl IrqControl for CriticalSectionIrq {
    fn disable_save(&mut self) -> bool {
        let was_enabled = self.depth() == 0;
        if self.held.is_full() {
            // No acquire: a token we cannot store could not be released in order.
            log::warn!("irq: nesting deeper than {}", MAX_NESTING);
            self.untracked += 1;
            return was_enabled;
        }
        // SAFETY: every token pushed here is released in `restore`, in
        // reverse acquisition order; `held` has room, checked above.
        unsafe {
            let token = critical_section::acquire();
            self.held.push_unchecked(token);
        }
        was_enabled
    }

    fn restore(&mut self, _was_enabled: bool) {
        if self.untracked > 0 {
            self.untracked -= 1;
            return;
        }
        if let Some(token) = self.held.pop() {
            // SAFETY: LIFO release of a token obtained from `acquire`.
            unsafe { critical_section::release(token) };
        }
    }
}

// ── Simulation control ────────────────────────────────────────

/// A plain interrupt-enable flag, used on the host and in tests.
#[derive(Debug)]
pub struct FlagIrq {
    enabled: bool,
    reopened: u32,
}

impl FlagIrq {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            reopened: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// How many times a critical section re-enabled interrupts.
    pub fn reopened(&self) -> u32 {
        self.reopened
    }
}

impl Default for FlagIrq {
    fn default() -> Self {
        Self::new(true)
    }
}

impl IrqControl for FlagIrq {
    fn disable_save(&mut self) -> bool {
        core::mem::replace(&mut self.enabled, false)
    }

    fn restore(&mut self, was_enabled: bool) {
        if was_enabled && !self.enabled {
            self.reopened += 1;
        }
        self.enabled = was_enabled;
    }
}
