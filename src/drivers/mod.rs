//! Board drivers: peripheral bring-up, the system tick, the hardware
//! watchdog and the two small human-interface devices.

pub mod hw_init;
pub mod hw_timer;
pub mod notify_led;
pub mod onoff_switch;
pub mod watchdog;
