use serde::{Deserialize, Serialize};

use crate::error::GuardError;

/// Sensor identifier (normalized column name).
pub type SensorId = String;

/// Ordered real-valued samples for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub sensor: SensorId,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(sensor: impl Into<SensorId>, values: Vec<f64>) -> Self {
        Self {
            sensor: sensor.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reject empty series and series carrying NaN/inf samples.
    ///
    /// Gaps must be filled upstream; anything left here is malformed.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.values.is_empty() {
            return Err(GuardError::EmptySeries(self.sensor.clone()));
        }
        if let Some(index) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(GuardError::NonFiniteSample {
                sensor: self.sensor.clone(),
                index,
            });
        }
        Ok(())
    }
}

/// A contiguous, behaviorally homogeneous slice of a sensor series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motif {
    /// Offset of the first sample in the source series.
    pub start: usize,
    /// Decoded segmentation state shared by every sample in the motif.
    pub state: usize,
    pub values: Vec<f64>,
}

impl Motif {
    pub fn new(start: usize, state: usize, values: Vec<f64>) -> Self {
        Self {
            start,
            state,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One past the last covered sample index.
    pub fn end(&self) -> usize {
        self.start + self.values.len()
    }
}
