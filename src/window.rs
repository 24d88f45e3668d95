//! Time ranges and aggregation windows
//!
//! A requested range (`"24h"`, `"7d"`) is mapped to the bucket width used to
//! downsample source data before analysis. Two policies exist: a batch policy
//! for summary statistics and a finer one for COP charting.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;

/// A look-back range expressed as whole hours or whole days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeRange {
    Hours(u32),
    Days(u32),
}

impl TimeRange {
    pub fn duration(&self) -> Duration {
        match *self {
            TimeRange::Hours(h) => Duration::hours(i64::from(h)),
            TimeRange::Days(d) => Duration::days(i64::from(d)),
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.duration().num_seconds()
    }
}

impl FromStr for TimeRange {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || AnalyticsError::InvalidRangeFormat(s.to_string());

        let (digits, unit) = split_unit(trimmed).ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let count: u32 = digits.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        match unit {
            'h' => Ok(TimeRange::Hours(count)),
            'd' => Ok(TimeRange::Days(count)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for TimeRange {
    type Error = AnalyticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeRange> for String {
    fn from(range: TimeRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Hours(h) => write!(f, "{h}h"),
            TimeRange::Days(d) => write!(f, "{d}d"),
        }
    }
}

/// Bucket width used for mean-aggregation of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregationWindow {
    seconds: i64,
}

impl AggregationWindow {
    pub const fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    pub const fn minutes(minutes: i64) -> Self {
        Self::from_seconds(minutes * 60)
    }

    pub const fn hours(hours: i64) -> Self {
        Self::from_seconds(hours * 3600)
    }

    pub fn as_seconds(&self) -> i64 {
        self.seconds
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }
}

impl fmt::Display for AggregationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds > 0 && self.seconds % 3600 == 0 {
            write!(f, "{}h", self.seconds / 3600)
        } else if self.seconds > 0 && self.seconds % 60 == 0 {
            write!(f, "{}m", self.seconds / 60)
        } else {
            write!(f, "{}s", self.seconds)
        }
    }
}

impl FromStr for AggregationWindow {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || AnalyticsError::InvalidRangeFormat(s.to_string());

        let (digits, unit) = split_unit(trimmed).ok_or_else(invalid)?;
        let count: i64 = digits.parse().map_err(|_| invalid())?;
        if count <= 0 {
            return Err(invalid());
        }

        let unit_seconds = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86_400,
            _ => return Err(invalid()),
        };
        let seconds = count
            .checked_mul(unit_seconds)
            .filter(|seconds| *seconds <= Duration::max_value().num_seconds())
            .ok_or_else(invalid)?;

        Ok(Self::from_seconds(seconds))
    }
}

impl TryFrom<String> for AggregationWindow {
    type Error = AnalyticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AggregationWindow> for String {
    fn from(window: AggregationWindow) -> Self {
        window.to_string()
    }
}

/// Split `"24h"` into `("24", 'h')`
fn split_unit(s: &str) -> Option<(&str, char)> {
    let mut chars = s.chars();
    let unit = chars.next_back()?;
    Some((chars.as_str(), unit))
}

/// Which density a caller needs from the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Summary statistics: roughly 60–1000 points per range
    Batch,
    /// COP charting: denser sampling for smooth curves
    Cop,
}

impl WindowPolicy {
    pub fn select(&self, range: TimeRange) -> AggregationWindow {
        match (self, range) {
            (WindowPolicy::Batch, TimeRange::Hours(h)) => match h {
                0..=1 => AggregationWindow::minutes(1),
                2..=6 => AggregationWindow::minutes(3),
                7..=24 => AggregationWindow::minutes(5),
                _ => AggregationWindow::minutes(15),
            },
            (WindowPolicy::Batch, TimeRange::Days(d)) => match d {
                0..=1 => AggregationWindow::minutes(5),
                2..=7 => AggregationWindow::minutes(30),
                8..=30 => AggregationWindow::hours(2),
                _ => AggregationWindow::hours(6),
            },
            (WindowPolicy::Cop, TimeRange::Hours(h)) => match h {
                0..=1 => AggregationWindow::minutes(1),
                2..=6 => AggregationWindow::minutes(2),
                7..=24 => AggregationWindow::minutes(5),
                _ => AggregationWindow::minutes(10),
            },
            (WindowPolicy::Cop, TimeRange::Days(d)) => match d {
                0..=1 => AggregationWindow::minutes(5),
                2..=30 => AggregationWindow::minutes(10),
                _ => AggregationWindow::hours(1),
            },
        }
    }
}

/// Aggregation window for batch summary statistics
pub fn select_window(range: TimeRange) -> AggregationWindow {
    WindowPolicy::Batch.select(range)
}

/// Aggregation window for COP visualization
pub fn select_cop_window(range: TimeRange) -> AggregationWindow {
    WindowPolicy::Cop.select(range)
}
