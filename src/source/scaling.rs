//! Register value normalization
//!
//! Most heat-pump registers store temperatures and percentages as fixed-point
//! integers in tenths. Status flags, alarm codes and power are stored as-is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::metrics::UNSCALED_METRICS;
use crate::types::Sample;

/// Converts raw register values into physical units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricScaling {
    /// Divisor applied to fixed-point metrics
    pub divisor: f64,
    /// Metrics whose raw value is already in physical units
    pub unscaled: BTreeSet<String>,
}

impl Default for MetricScaling {
    fn default() -> Self {
        Self {
            divisor: 10.0,
            unscaled: UNSCALED_METRICS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl MetricScaling {
    /// Scaling that leaves every value untouched
    pub fn identity() -> Self {
        Self {
            divisor: 1.0,
            unscaled: BTreeSet::new(),
        }
    }

    pub fn is_scaled(&self, metric: &str) -> bool {
        !self.unscaled.contains(metric)
    }

    pub fn scale(&self, metric: &str, raw: f64) -> f64 {
        if self.is_scaled(metric) && self.divisor != 0.0 {
            raw / self.divisor
        } else {
            raw
        }
    }

    pub fn apply(&self, mut sample: Sample) -> Sample {
        sample.value = self.scale(&sample.metric, sample.value);
        sample
    }
}
