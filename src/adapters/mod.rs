//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                     | Connects to              |
//! |------------|--------------------------------|--------------------------|
//! | `hardware` | ValvePort, AdcPort, SerialPort | ESP32 GPIO, ADC1, UART   |
//! | `nvs`      | ConfigPort                     | NVS / in-memory store    |
//! |            | StoragePort                    |                          |
//! | `rtc`      | RtcPort                        | ESP-IDF system clock     |
//! | `time`     | (tick source)                  | 200 Hz esp_timer         |

pub mod hardware;
pub mod nvs;
pub mod rtc;
pub mod time;
