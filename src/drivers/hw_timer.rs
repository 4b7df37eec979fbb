//! System tick timer using ESP-IDF's esp_timer API.
//!
//! One periodic timer at [`JIFFIES_PER_SECOND`] advances the jiffies
//! counter in [`adapters::time`](crate::adapters::time).  On simulation
//! targets the caller advances the counter itself.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR); the
//! counter update takes the critical section.

use crate::clock::JIFFIES_PER_SECOND;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Timer period in microseconds.
pub const TICK_PERIOD_US: u64 = 1_000_000 / JIFFIES_PER_SECOND as u64;

#[cfg(target_os = "espidf")]
static mut TICK_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// SAFETY: TICK_TIMER is written once in `start_timers()` before any
/// timer callbacks fire.  Only called from the single main task.
#[cfg(target_os = "espidf")]
unsafe fn tick_timer() -> esp_timer_handle_t {
    unsafe { TICK_TIMER }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn tick_cb(_arg: *mut core::ffi::c_void) {
    crate::adapters::time::timer_tick();
}

/// Start the system tick.
#[cfg(target_os = "espidf")]
pub fn start_timers() {
    // SAFETY: TICK_TIMER is written here once at boot from the single
    // main-task context before any timer callbacks fire.
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"jiffies\0".as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&args, &raw mut TICK_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: tick timer create failed (rc={})", ret);
            return;
        }
        let ret = esp_timer_start_periodic(TICK_TIMER, TICK_PERIOD_US);
        if ret != ESP_OK {
            log::error!("hw_timer: tick timer start failed (rc={})", ret);
            return;
        }

        info!("hw_timer: jiffies@{}Hz started", JIFFIES_PER_SECOND);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers() {
    log::info!("hw_timer(sim): tick not started (caller drives jiffies)");
}

/// Stop the system tick.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: tick_timer() contract, main task only; null-check prevents
    // stopping a timer that was never created.
    unsafe {
        let t = tick_timer();
        if !t.is_null() {
            esp_timer_stop(t);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
