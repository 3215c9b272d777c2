// Material classifier - heuristic banding over signal ratio and depth
//
// Decision procedure (first match wins, all comparisons strict):
// 1. ratio > 10 AND depth < 2  => IronMetal
// 2. ratio > 5  AND depth < 3  => Steel
// 3. ratio > 2  AND depth < 5  => Aluminum
// 4. ratio > 1  AND depth < 8  => Copper
// 5. otherwise                 => Unknown
//
// A value exactly on a boundary falls through to the next band.

use serde::{Deserialize, Serialize};

/// Material category of a probed target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    /// High conductivity, shallow
    IronMetal,
    Steel,
    Aluminum,
    Copper,
    /// No band matched
    Unknown,
}

impl MaterialType {
    pub fn display_name(&self) -> &'static str {
        match self {
            MaterialType::IronMetal => "IRON/METAL",
            MaterialType::Steel => "STEEL",
            MaterialType::Aluminum => "ALUMINUM",
            MaterialType::Copper => "COPPER",
            MaterialType::Unknown => "UNKNOWN",
        }
    }
}

/// Band thresholds in evaluation order: (min ratio, max depth, material)
const BANDS: [(f64, f64, MaterialType); 4] = [
    (10.0, 2.0, MaterialType::IronMetal),
    (5.0, 3.0, MaterialType::Steel),
    (2.0, 5.0, MaterialType::Aluminum),
    (1.0, 8.0, MaterialType::Copper),
];

/// Coarse material feature: raw signal strength per Hz of carrier
///
/// Takes the device magnitude before temperature compensation. Returns 0
/// for a non-positive frequency; the gate rejects those upstream.
pub fn signal_ratio(signal_strength: f64, frequency: f64) -> f64 {
    if frequency > 0.0 {
        signal_strength / frequency
    } else {
        0.0
    }
}

/// Classify a target from its signal ratio and depth
pub fn classify(signal_ratio: f64, depth: f64) -> MaterialType {
    BANDS
        .iter()
        .find(|(min_ratio, max_depth, _)| signal_ratio > *min_ratio && depth < *max_depth)
        .map(|(_, _, material)| *material)
        .unwrap_or(MaterialType::Unknown)
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
