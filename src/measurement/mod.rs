// Measurement module - calibration, depth estimation and material classification
//
// Pipeline per raw measurement:
// 1. gate: validity checks on the raw fields
// 2. calibration: temperature-compensated signal and depth inversion
// 3. gate: negative-depth policy
// 4. classifier: material band from signal ratio and depth
// 5. calibration: confidence score

pub mod calibration;
pub mod classifier;
pub mod frequency;
pub mod gate;
pub mod reading;

pub use calibration::{calibrate_signal, confidence, estimate_depth, temperature_compensation};
pub use classifier::{classify, signal_ratio, MaterialType};
pub use frequency::{FrequencyMode, FrequencyTable, FREQUENCY_TABLE_HZ, LEGACY_FREQUENCY_RANGE};
pub use gate::{GatedDepth, MeasurementGate, MeasurementLimits, NegativeDepthPolicy};
pub use reading::{MeasurementEngine, Reading};
