//! Soil-moisture sensing: the excitation bank and the acquisition engine
//! that turns three polarity-reversed conversions into one reading.

pub mod acquisition;
pub mod excitation;

pub use acquisition::{Acquisition, Phase, SensorEngine, SensorResult};
pub use excitation::PinExcitation;
