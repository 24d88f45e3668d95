//! Hot-water cycle detection
//!
//! The switch valve diverts the heat pump to the domestic hot-water tank. A
//! valve reading of 1 preceded by 0 opens a cycle; the first 0 after it closes
//! the cycle. Detection is a single forward scan over an IDLE → ACTIVE → IDLE
//! state machine.
//!
//! Aggregation smears short valve blips into isolated buckets, so the minimum
//! accepted cycle length grows with the aggregation window of the valve
//! series (see [`min_cycle_duration`]).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::energy::integrate_energy;
use crate::series::{seconds_between, Series};
use crate::types::{CycleRecord, CycleSummary, DataStatus, Outcome};
use crate::window::AggregationWindow;

/// Shortest accepted cycle for fine-grained (≤ 5 min) aggregation
pub const FINE_MIN_CYCLE_MINUTES: i64 = 5;

/// Shortest accepted cycle for coarser aggregation
pub const COARSE_MIN_CYCLE_MINUTES: i64 = 10;

/// Minimum cycle duration for a valve series aggregated with `window`.
///
/// Raw or ≤ 5 minute data: 5 minutes. Coarser data: 10 minutes.
pub fn min_cycle_duration(window: Option<AggregationWindow>) -> Duration {
    match window {
        Some(w) if w > AggregationWindow::minutes(FINE_MIN_CYCLE_MINUTES) => {
            Duration::minutes(COARSE_MIN_CYCLE_MINUTES)
        }
        _ => Duration::minutes(FINE_MIN_CYCLE_MINUTES),
    }
}

/// Valve and power series were aggregated with different windows, so cycle
/// energy is integrated at a different resolution than cycle boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranularityMismatch {
    pub valve_window: AggregationWindow,
    pub power_window: AggregationWindow,
}

/// Everything a detection pass found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleDetection {
    /// Cycles that passed the duration filter
    pub cycles: Vec<CycleRecord>,
    /// 0→1 valve transitions seen
    pub transitions: usize,
    /// Closed cycles rejected as shorter than the minimum duration
    pub filtered_short: usize,
    /// Cycles still open when the window ended
    pub incomplete: usize,
    /// Threshold used by the duration filter
    pub min_duration_minutes: f64,
    /// Elapsed span of the valve series (days)
    pub valve_span_days: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity_mismatch: Option<GranularityMismatch>,
}

impl CycleDetection {
    /// Closed cycles, whether retained or filtered
    pub fn closed(&self) -> usize {
        self.cycles.len() + self.filtered_short
    }

    pub fn summary(&self) -> CycleSummary {
        let total_cycles = self.cycles.len();
        if total_cycles == 0 {
            return CycleSummary::default();
        }

        let avg_cycle_duration_minutes =
            self.cycles.iter().map(|c| c.duration_minutes).sum::<f64>() / total_cycles as f64;

        let (energy_sum, with_power) = self
            .cycles
            .iter()
            .filter(|c| c.power_samples > 0)
            .fold((0.0, 0usize), |(sum, n), c| (sum + c.energy_kwh, n + 1));
        let avg_energy_per_cycle_kwh = if with_power > 0 {
            energy_sum / with_power as f64
        } else {
            0.0
        };

        let cycles_per_day = if self.valve_span_days > 0.0 {
            total_cycles as f64 / self.valve_span_days
        } else {
            0.0
        };

        CycleSummary {
            total_cycles,
            avg_cycle_duration_minutes,
            avg_energy_per_cycle_kwh,
            cycles_per_day,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ValveState {
    Idle,
    Active { start: DateTime<Utc> },
}

/// Detects hot-water cycles and attributes energy to them
#[derive(Debug, Clone, Copy)]
pub struct HotWaterCycleDetector {
    min_duration: Duration,
}

impl HotWaterCycleDetector {
    pub fn new(min_duration: Duration) -> Self {
        Self { min_duration }
    }

    /// Detector whose duration filter matches the aggregation of the valve data
    pub fn for_window(window: Option<AggregationWindow>) -> Self {
        Self::new(min_cycle_duration(window))
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    /// Scan `valve` for cycles and integrate `power` over each accepted one
    pub fn detect(&self, valve: &Series, power: &Series) -> CycleDetection {
        let granularity_mismatch = match (valve.aggregation(), power.aggregation()) {
            (Some(valve_window), Some(power_window)) if valve_window != power_window => {
                warn!(
                    valve_window = %valve_window,
                    power_window = %power_window,
                    "valve and power series use different aggregation windows; cycle energy may be misattributed"
                );
                Some(GranularityMismatch {
                    valve_window,
                    power_window,
                })
            }
            _ => None,
        };

        let mut detection = CycleDetection {
            min_duration_minutes: self.min_duration.num_milliseconds() as f64 / 60_000.0,
            valve_span_days: valve
                .span()
                .map(|span| span.num_milliseconds() as f64 / 86_400_000.0)
                .unwrap_or(0.0),
            granularity_mismatch,
            ..Default::default()
        };

        let mut state = ValveState::Idle;
        let mut previous: Option<f64> = None;

        for point in valve.points() {
            state = match state {
                ValveState::Idle if point.value == 1.0 && previous == Some(0.0) => {
                    detection.transitions += 1;
                    ValveState::Active { start: point.time }
                }
                ValveState::Active { start } if point.value == 0.0 && point.time > start => {
                    self.close_cycle(start, point.time, power, &mut detection);
                    ValveState::Idle
                }
                unchanged => unchanged,
            };
            previous = Some(point.value);
        }

        if let ValveState::Active { start } = state {
            debug!(start = %start, "discarding hot-water cycle without a closing transition");
            detection.incomplete += 1;
        }

        detection
    }

    fn close_cycle(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        power: &Series,
        detection: &mut CycleDetection,
    ) {
        let duration = end - start;
        let duration_minutes = seconds_between(start, end) / 60.0;

        if duration < self.min_duration {
            debug!(
                start = %start,
                duration_minutes,
                min_minutes = detection.min_duration_minutes,
                "filtered short hot-water cycle"
            );
            detection.filtered_short += 1;
            return;
        }

        let cycle_power = power.slice(start, end);
        let energy = integrate_energy(&cycle_power);
        debug!(
            start = %start,
            duration_minutes,
            energy_kwh = energy.total_kwh,
            "accepted hot-water cycle"
        );

        detection.cycles.push(CycleRecord {
            start_time: start,
            end_time: end,
            duration_minutes,
            energy_kwh: energy.total_kwh,
            power_samples: cycle_power.len(),
        });
    }
}

/// Detect cycles with a filter matched to the valve series' aggregation
pub fn detect_cycles(valve: &Series, power: &Series) -> CycleDetection {
    HotWaterCycleDetector::for_window(valve.aggregation()).detect(valve, power)
}

/// Summarize hot-water cycles, distinguishing "no valve data" from "no
/// valid cycles"
pub fn analyze_hot_water_cycles(
    detector: &HotWaterCycleDetector,
    valve: &Series,
    power: &Series,
) -> Outcome<CycleSummary> {
    if valve.is_empty() {
        info!("no valve data in window; hot-water summary is empty");
        return Outcome::no_data();
    }

    let detection = detector.detect(valve, power);
    info!(
        transitions = detection.transitions,
        valid = detection.cycles.len(),
        filtered_short = detection.filtered_short,
        incomplete = detection.incomplete,
        min_minutes = detection.min_duration_minutes,
        "hot-water cycle detection finished"
    );

    if detection.cycles.is_empty() {
        warn!(
            transitions = detection.transitions,
            filtered_short = detection.filtered_short,
            incomplete = detection.incomplete,
            "no valid hot-water cycles found"
        );
        return Outcome::no_valid_cycles();
    }

    Outcome {
        value: detection.summary(),
        status: DataStatus::Complete,
    }
}
