//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the superloop
//! stalls for more than 10 seconds.  The loop must call `feed()` on
//! every pass.  [`Watchdog::force_reset`] is the systemic recovery path:
//! it stops feeding and waits for the hardware to restart the chip.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{error, info};

pub const TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: u32,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", TIMEOUT_MS);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op");
            Self { feeds: 0 }
        }
    }

    /// Feed the watchdog.  Must be called at least every [`TIMEOUT_MS`].
    pub fn feed(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.feeds = self.feeds.wrapping_add(1);
        }
    }

    /// Number of feeds so far (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u32 {
        self.feeds
    }

    /// Unrecoverable state: restart the chip.
    pub fn force_reset(&self, reason: &str) -> ! {
        error!("Watchdog: forced reset ({})", reason);

        #[cfg(target_os = "espidf")]
        {
            unsafe { esp_restart() };
        }

        #[cfg(not(target_os = "espidf"))]
        {
            panic!("watchdog reset: {}", reason);
        }
    }
}
