//! Core types for the heat-pump analytics engine
//!
//! This module defines the records that flow in from the telemetry source
//! (samples, latest values, extrema) and the flat result structs produced by
//! each analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single raw telemetry reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Metric name (e.g. `power_consumption`)
    #[serde(alias = "name")]
    pub metric: String,
    /// When the reading was taken (UTC)
    #[serde(alias = "time")]
    pub timestamp: DateTime<Utc>,
    /// Reading in physical units
    pub value: f64,
    /// Unit label, if the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Most recent reading of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub time: DateTime<Utc>,
}

/// Extrema of a metric over a time range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

/// Why an analysis produced the value it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    /// Computed from data
    Complete,
    /// The query succeeded but returned no samples
    NoData,
    /// Valve data was present but no cycle survived detection and filtering
    NoValidCycles,
}

/// Analysis value paired with its data status
///
/// Zeroed values are only ever returned together with a non-`Complete`
/// status, so "the pump was idle" and "there was nothing to look at" stay
/// distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub value: T,
    pub status: DataStatus,
}

impl<T> Outcome<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            status: DataStatus::Complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == DataStatus::Complete
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            status: self.status,
        }
    }
}

impl<T: Default> Outcome<T> {
    pub fn no_data() -> Self {
        Self {
            value: T::default(),
            status: DataStatus::NoData,
        }
    }

    pub fn no_valid_cycles() -> Self {
        Self {
            value: T::default(),
            status: DataStatus::NoValidCycles,
        }
    }
}

/// Energy consumption and cost over a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyCostResult {
    /// Integrated energy (kWh)
    pub total_kwh: f64,
    /// Energy cost in the configured currency
    pub total_cost: f64,
    /// Mean power reading (W)
    pub avg_power: f64,
    /// Highest power reading (W)
    pub peak_power: f64,
}

impl EnergyCostResult {
    /// Display precision: energy and cost to 2 decimals, power to whole watts
    pub fn rounded(&self) -> Self {
        Self {
            total_kwh: round_to(self.total_kwh, 2),
            total_cost: round_to(self.total_cost, 2),
            avg_power: round_to(self.avg_power, 0),
            peak_power: round_to(self.peak_power, 0),
        }
    }
}

/// Compressor and auxiliary heater duty cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub compressor_runtime_hours: f64,
    pub compressor_runtime_percent: f64,
    pub aux_heater_runtime_hours: f64,
    pub aux_heater_runtime_percent: f64,
    /// Observed span of the underlying data (hours)
    pub total_hours: f64,
}

impl RuntimeStats {
    pub fn rounded(&self) -> Self {
        Self {
            compressor_runtime_hours: round_to(self.compressor_runtime_hours, 1),
            compressor_runtime_percent: round_to(self.compressor_runtime_percent, 1),
            aux_heater_runtime_hours: round_to(self.aux_heater_runtime_hours, 1),
            aux_heater_runtime_percent: round_to(self.aux_heater_runtime_percent, 1),
            total_hours: round_to(self.total_hours, 1),
        }
    }
}

/// One detected hot-water heating cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
    /// Energy drawn between start and end, inclusive (kWh)
    pub energy_kwh: f64,
    /// Power readings that fell inside the cycle window
    pub power_samples: usize,
}

/// Aggregate hot-water cycle statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub total_cycles: usize,
    pub avg_cycle_duration_minutes: f64,
    pub avg_energy_per_cycle_kwh: f64,
    pub cycles_per_day: f64,
}

impl CycleSummary {
    pub fn rounded(&self) -> Self {
        Self {
            total_cycles: self.total_cycles,
            avg_cycle_duration_minutes: round_to(self.avg_cycle_duration_minutes, 1),
            avg_energy_per_cycle_kwh: round_to(self.avg_energy_per_cycle_kwh, 2),
            cycles_per_day: round_to(self.cycles_per_day, 1),
        }
    }
}

/// Event severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

/// Subsystem an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Compressor,
    BrinePump,
    RadiatorPump,
    HotWater,
    AuxHeat,
    Alarm,
}

/// A detected state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: DateTime<Utc>,
    pub description: String,
    pub severity: Severity,
    pub category: EventCategory,
}

/// Current alarm state of the heat pump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmStatus {
    pub is_alarm: bool,
    pub alarm_code: i64,
    pub alarm_description: String,
    /// When the current alarm first became active, if it could be resolved
    pub alarm_time: Option<DateTime<Utc>>,
    /// Raw value of the alarm status register
    pub alarm_status_raw: f64,
}

impl Default for AlarmStatus {
    fn default() -> Self {
        Self {
            is_alarm: false,
            alarm_code: 0,
            alarm_description: NO_ALARM_DESCRIPTION.to_string(),
            alarm_time: None,
            alarm_status_raw: 0.0,
        }
    }
}

/// Description reported while no alarm is active
pub const NO_ALARM_DESCRIPTION: &str = "No active alarm";

/// One row of the COP series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopPoint {
    pub time: DateTime<Utc>,
    pub radiator_delta: Option<f64>,
    pub brine_delta: Option<f64>,
    pub power_consumption: Option<f64>,
    /// Clamped estimate; absent where the compressor was idle or deltas too small
    pub estimated_cop: Option<f64>,
}

/// Estimated COP over time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopSeries {
    pub points: Vec<CopPoint>,
}

impl CopSeries {
    /// Points that carry an estimate
    pub fn estimates(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.estimated_cop.map(|cop| (p.time, cop)))
    }

    /// Mean of all estimates, if any were produced
    pub fn mean_cop(&self) -> Option<f64> {
        let (sum, count) = self
            .estimates()
            .fold((0.0, 0usize), |(sum, count), (_, cop)| (sum + cop, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_matches_display_precision() {
        let result = EnergyCostResult {
            total_kwh: 12.3456,
            total_cost: 24.6912,
            avg_power: 1234.56,
            peak_power: 3000.4,
        }
        .rounded();

        assert_eq!(result.total_kwh, 12.35);
        assert_eq!(result.total_cost, 24.69);
        assert_eq!(result.avg_power, 1235.0);
        assert_eq!(result.peak_power, 3000.0);
    }

    #[test]
    fn test_outcome_statuses() {
        let empty: Outcome<CycleSummary> = Outcome::no_data();
        assert_eq!(empty.status, DataStatus::NoData);
        assert_eq!(empty.value, CycleSummary::default());
        assert!(!empty.is_complete());

        let done = Outcome::complete(3usize).map(|n| n * 2);
        assert!(done.is_complete());
        assert_eq!(done.value, 6);
    }

    #[test]
    fn test_sample_accepts_backend_field_names() {
        let sample: Sample = serde_json::from_str(
            r#"{"name": "power_consumption", "time": "2024-01-15T12:00:00Z", "value": 1500.0, "unit": "W"}"#,
        )
        .unwrap();

        assert_eq!(sample.metric, "power_consumption");
        assert_eq!(sample.unit.as_deref(), Some("W"));
    }

    #[test]
    fn test_mean_cop_ignores_missing_estimates() {
        let t = Utc::now();
        let point = |cop: Option<f64>| CopPoint {
            time: t,
            radiator_delta: None,
            brine_delta: None,
            power_consumption: None,
            estimated_cop: cop,
        };
        let series = CopSeries {
            points: vec![point(Some(3.0)), point(None), point(Some(4.0))],
        };

        assert_eq!(series.mean_cop(), Some(3.5));
        assert_eq!(CopSeries::default().mean_cop(), None);
    }
}
