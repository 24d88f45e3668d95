//! Error types for heatpump-insight

use thiserror::Error;

use crate::source::SourceError;

/// Errors that can occur during analysis
///
/// An empty query result is deliberately *not* represented here: analyses over
/// windows without data succeed with a zeroed value and
/// [`DataStatus::NoData`](crate::types::DataStatus::NoData).
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid time range format: {0:?} (expected e.g. \"24h\" or \"7d\")")]
    InvalidRangeFormat(String),

    #[error("Upstream query failed: {0}")]
    UpstreamQueryFailure(#[from] SourceError),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported brand: {0}")]
    UnsupportedBrand(String),
}

impl AnalyticsError {
    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalyticsError::UpstreamQueryFailure(e) if e.is_transient())
    }
}
