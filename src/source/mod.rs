//! Telemetry source boundary
//!
//! The analytics engine never talks to a storage backend directly. Everything
//! it reads comes through [`TelemetrySource`], which returns time-ordered
//! series already normalized to physical units.

mod memory;
mod scaling;

pub use memory::MemorySource;
pub use scaling::MetricScaling;

use std::collections::BTreeMap;
use thiserror::Error;

use crate::series::Series;
use crate::types::{LatestValue, MinMax};
use crate::window::{AggregationWindow, TimeRange};

/// Failures reported by a telemetry backend
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed record at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the backend may answer the same query later
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Timeout(_) | SourceError::Unavailable(_))
    }
}

/// Read access to stored heat-pump telemetry
pub trait TelemetrySource: Send + Sync {
    /// Series for `metrics` over the trailing `range`.
    ///
    /// With a `window`, points are mean-aggregated per window. Metrics without
    /// data in the range are omitted from the result.
    fn query(
        &self,
        metrics: &[&str],
        range: TimeRange,
        window: Option<AggregationWindow>,
    ) -> Result<Vec<Series>, SourceError>;

    /// Most recent reading of every metric reported within the last hour
    fn latest(&self) -> Result<BTreeMap<String, LatestValue>, SourceError>;

    /// Per-metric extrema over the trailing `range`
    fn min_max(&self, range: TimeRange) -> Result<BTreeMap<String, MinMax>, SourceError>;
}
