use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GuardError;

/// The four fault archetypes a sensor is trained to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalyFamily {
    /// Localized high-magnitude deviations.
    Spike,
    /// Sustained level shift and/or elevated noise.
    LevelNoise,
    /// A contiguous stretch of dropped-out samples.
    PartialMissingSegment,
    /// Distorted frequency-domain energy distribution.
    PowerSpectralDistortion,
}

impl AnomalyFamily {
    /// All families in canonical (sensor, family) reporting order.
    pub const ALL: [AnomalyFamily; 4] = [
        AnomalyFamily::Spike,
        AnomalyFamily::LevelNoise,
        AnomalyFamily::PartialMissingSegment,
        AnomalyFamily::PowerSpectralDistortion,
    ];

    /// Short lowercase code used in config keys and CLI flags.
    pub fn code(&self) -> &'static str {
        match self {
            AnomalyFamily::Spike => "spike",
            AnomalyFamily::LevelNoise => "ln",
            AnomalyFamily::PartialMissingSegment => "pms",
            AnomalyFamily::PowerSpectralDistortion => "psd",
        }
    }

    /// Directory name for this family's persisted artifacts.
    pub fn dir_name(&self) -> &'static str {
        match self {
            AnomalyFamily::Spike => "Spike",
            AnomalyFamily::LevelNoise => "LN",
            AnomalyFamily::PartialMissingSegment => "PMS",
            AnomalyFamily::PowerSpectralDistortion => "PSD",
        }
    }
}

impl std::fmt::Display for AnomalyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for AnomalyFamily {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spike" => Ok(AnomalyFamily::Spike),
            "ln" | "levelnoise" | "level_noise" => Ok(AnomalyFamily::LevelNoise),
            "pms" | "partialmissingsegment" | "partial_missing_segment" => {
                Ok(AnomalyFamily::PartialMissingSegment)
            }
            "psd" | "powerspectraldistortion" | "power_spectral_distortion" => {
                Ok(AnomalyFamily::PowerSpectralDistortion)
            }
            other => Err(GuardError::UnknownFamily(other.to_string())),
        }
    }
}
