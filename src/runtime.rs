//! Duty-cycle runtime estimation
//!
//! A component counts as running while its signal is positive. Each active
//! reading holds until the next reading arrives; the final reading, having no
//! successor, is assumed to last as long as the interval before it.

use serde::{Deserialize, Serialize};

use crate::series::{seconds_between, Series};
use crate::types::RuntimeStats;

/// Active time of one signal within a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DutyCycle {
    pub active_hours: f64,
    pub active_percent: f64,
}

/// Fraction of `total_window_seconds` during which `state` was positive.
///
/// Active time is capped at the window length. Returns zeros for an empty
/// series or a non-positive window.
pub fn runtime(state: &Series, total_window_seconds: f64) -> DutyCycle {
    let points = state.points();
    if points.is_empty() || total_window_seconds <= 0.0 {
        return DutyCycle::default();
    }

    let mut active_seconds = 0.0;
    for pair in points.windows(2) {
        if pair[0].value > 0.0 {
            active_seconds += seconds_between(pair[0].time, pair[1].time);
        }
    }

    if let [.., before_last, last] = points {
        if last.value > 0.0 {
            active_seconds += seconds_between(before_last.time, last.time);
        }
    }

    let active_seconds = active_seconds.min(total_window_seconds);
    let total_hours = total_window_seconds / 3600.0;
    let active_hours = active_seconds / 3600.0;

    DutyCycle {
        active_hours,
        active_percent: active_hours / total_hours * 100.0,
    }
}

/// Compressor and auxiliary-heater runtime over the span both series cover.
///
/// Returns `None` when the series together span no time.
pub fn runtime_stats(compressor: &Series, aux_heat: &Series) -> Option<RuntimeStats> {
    let first = [compressor.first(), aux_heat.first()]
        .into_iter()
        .flatten()
        .map(|p| p.time)
        .min();
    let last = [compressor.last(), aux_heat.last()]
        .into_iter()
        .flatten()
        .map(|p| p.time)
        .max();

    let total_seconds = match (first, last) {
        (Some(first), Some(last)) => seconds_between(first, last),
        _ => 0.0,
    };
    if total_seconds <= 0.0 {
        return None;
    }

    let compressor_cycle = runtime(compressor, total_seconds);
    let aux_cycle = runtime(aux_heat, total_seconds);

    Some(RuntimeStats {
        compressor_runtime_hours: compressor_cycle.active_hours,
        compressor_runtime_percent: compressor_cycle.active_percent,
        aux_heater_runtime_hours: aux_cycle.active_hours,
        aux_heater_runtime_percent: aux_cycle.active_percent,
        total_hours: total_seconds / 3600.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Point;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn state(readings: &[(i64, f64)]) -> Series {
        Series::new(
            "compressor_status",
            readings
                .iter()
                .map(|(minute, value)| Point::new(start() + Duration::minutes(*minute), *value))
                .collect(),
        )
    }

    #[test]
    fn test_all_off_is_zero_percent() {
        let series = state(&[(0, 0.0), (10, 0.0), (20, 0.0), (30, 0.0)]);
        let result = runtime(&series, 3600.0);
        assert_eq!(result.active_hours, 0.0);
        assert_eq!(result.active_percent, 0.0);
    }

    #[test]
    fn test_all_on_evenly_spaced_is_full_window() {
        // 6 readings every 10 minutes cover one hour
        let readings: Vec<(i64, f64)> = (0..6).map(|i| (i * 10, 1.0)).collect();
        let result = runtime(&state(&readings), 3600.0);

        assert!((result.active_hours - 1.0).abs() < 1e-9);
        assert!((result.active_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_irregular_intervals_accrue_real_time() {
        // on for 5 min, off for 25 min, on for 15 min, final reading on
        let series = state(&[(0, 1.0), (5, 0.0), (30, 1.0), (45, 1.0)]);
        let result = runtime(&series, 7200.0);

        // 5 + 15 + 15 (final reading extrapolated by the preceding 15 min)
        assert!((result.active_hours - 35.0 / 60.0).abs() < 1e-9);
        assert!((result.active_percent - 35.0 / 120.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_final_reading_off_adds_nothing() {
        let series = state(&[(0, 1.0), (20, 0.0)]);
        let result = runtime(&series, 3600.0);
        assert!((result.active_hours - 20.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_active_reading_has_no_interval() {
        let result = runtime(&state(&[(0, 1.0)]), 3600.0);
        assert_eq!(result, DutyCycle::default());
    }

    #[test]
    fn test_degenerate_inputs_are_zero() {
        assert_eq!(runtime(&Series::empty("compressor_status"), 3600.0), DutyCycle::default());
        assert_eq!(runtime(&state(&[(0, 1.0), (10, 1.0)]), 0.0), DutyCycle::default());
    }

    #[test]
    fn test_runtime_stats_uses_combined_span() {
        let compressor = state(&[(0, 1.0), (30, 0.0), (60, 0.0)]);
        let aux = Series::new(
            "additional_heat_percent",
            vec![
                Point::new(start() + Duration::minutes(90), 40.0),
                Point::new(start() + Duration::minutes(120), 40.0),
            ],
        );

        let stats = runtime_stats(&compressor, &aux).unwrap();

        assert!((stats.total_hours - 2.0).abs() < 1e-9);
        assert!((stats.compressor_runtime_hours - 0.5).abs() < 1e-9);
        assert!((stats.compressor_runtime_percent - 25.0).abs() < 1e-9);
        // 30 min plus the extrapolated final 30 min
        assert!((stats.aux_heater_runtime_hours - 1.0).abs() < 1e-9);
        assert!((stats.aux_heater_runtime_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_runtime_stats_without_span_is_none() {
        let stats = runtime_stats(&state(&[(0, 1.0)]), &Series::empty("additional_heat_percent"));
        assert_eq!(stats, None);

        let empty = runtime_stats(
            &Series::empty("compressor_status"),
            &Series::empty("additional_heat_percent"),
        );
        assert_eq!(empty, None);
    }
}
