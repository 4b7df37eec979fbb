//! GPIO / peripheral pin assignments for the irrigator main board.
//!
//! Single source of truth: every driver and adapter references this module
//! rather than hard-coding pin numbers.

use crate::config::POT_COUNT;

// ---------------------------------------------------------------------------
// Moisture sensors
// ---------------------------------------------------------------------------

/// Per-sensor supply terminal "A".
pub const SENSOR_SUPPLY_A_GPIOS: [i32; POT_COUNT] = [4, 5, 6, 7, 15, 16];
/// Return terminal "B", shared by all sensors.
pub const SENSOR_SUPPLY_B_GPIO: i32 = 17;

/// Shared sense line: ADC1 channel 0 (GPIO 1 on ESP32-S3).
pub const SENSOR_ADC_GPIO: i32 = 1;
pub const SENSOR_ADC_CHANNEL: u32 = 0;

// ---------------------------------------------------------------------------
// Valves (active-low relay inputs)
// ---------------------------------------------------------------------------

pub const VALVE_GPIOS: [i32; POT_COUNT] = [8, 9, 10, 11, 12, 13];
pub const VALVES_ACTIVE_LOW: bool = true;

// ---------------------------------------------------------------------------
// Front panel
// ---------------------------------------------------------------------------

/// Notification LED (active-high).
pub const NOTIFY_LED_GPIO: i32 = 14;
/// On/off toggle switch, active-low with pull-up.
pub const ONOFF_SWITCH_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Host link (UART1)
// ---------------------------------------------------------------------------

pub const HOST_UART_NUM: i32 = 1;
pub const HOST_UART_TX_GPIO: i32 = 39;
pub const HOST_UART_RX_GPIO: i32 = 40;
pub const HOST_UART_BAUD: u32 = 19_200;
