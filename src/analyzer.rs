//! Heat-pump analyzer
//!
//! [`HeatPumpAnalyzer`] ties a [`TelemetrySource`] to the analyses: it picks
//! the aggregation window for each query, fetches the series, runs the
//! analysis and reports whether the result came from data.
//!
//! # Example
//!
//! ```no_run
//! use heatpump_insight::{AnalyzerConfig, HeatPumpAnalyzer, MemorySource, TimeRange};
//! use std::io::BufReader;
//!
//! let config = AnalyzerConfig::default();
//! let file = std::fs::File::open("telemetry.ndjson").unwrap();
//! let source = MemorySource::from_ndjson(BufReader::new(file), &config.scaling).unwrap();
//! let analyzer = HeatPumpAnalyzer::from_config(source, &config);
//!
//! let energy = analyzer.energy_costs(TimeRange::Hours(24)).unwrap();
//! println!("{:.2} kWh", energy.value.total_kwh);
//! ```

use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::alarm::{alarm_onset, resolve_alarm_status, AlarmCodeResolver};
use crate::config::AnalyzerConfig;
use crate::cop::estimate_cop_from_batch;
use crate::cycles::{analyze_hot_water_cycles, HotWaterCycleDetector};
use crate::energy::energy_cost;
use crate::error::AnalyticsError;
use crate::events::build_event_log;
use crate::metrics::{
    ADDITIONAL_HEAT_PERCENT, ALARM_CODE, COMPRESSOR_STATUS, COP_METRICS, EVENT_METRICS,
    HOT_WATER_METRICS, POWER_CONSUMPTION, RUNTIME_METRICS, SWITCH_VALVE_STATUS,
};
use crate::runtime::runtime_stats;
use crate::series::{Series, SeriesBatch};
use crate::source::TelemetrySource;
use crate::types::{
    AlarmStatus, CopSeries, CycleSummary, EnergyCostResult, EventRecord, LatestValue, MinMax,
    Outcome, RuntimeStats,
};
use crate::window::{select_cop_window, select_window, AggregationWindow, TimeRange};

/// Aggregation used for hot-water cycle detection and the event log
pub const FINE_WINDOW: AggregationWindow = AggregationWindow::minutes(1);

/// Lookback for the event log
pub const EVENT_LOG_RANGE: TimeRange = TimeRange::Hours(24);

/// Lookback when resolving when the current alarm started
pub const ALARM_LOOKBACK: TimeRange = TimeRange::Days(7);

/// Runs every analysis against one telemetry source
pub struct HeatPumpAnalyzer<S> {
    source: S,
    resolver: Box<dyn AlarmCodeResolver>,
    price_per_kwh: f64,
}

impl<S: TelemetrySource> HeatPumpAnalyzer<S> {
    pub fn new(source: S, resolver: Box<dyn AlarmCodeResolver>, price_per_kwh: f64) -> Self {
        Self {
            source,
            resolver,
            price_per_kwh,
        }
    }

    /// Analyzer using the brand, alarm table and price from `config`
    pub fn from_config(source: S, config: &AnalyzerConfig) -> Self {
        info!(brand = config.brand.display_name(), "analyzer initialized");
        Self::new(source, Box::new(config.resolver()), config.price_per_kwh)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn resolver(&self) -> &dyn AlarmCodeResolver {
        self.resolver.as_ref()
    }

    pub fn price_per_kwh(&self) -> f64 {
        self.price_per_kwh
    }

    fn query_batch(
        &self,
        metrics: &[&str],
        range: TimeRange,
        window: Option<AggregationWindow>,
    ) -> Result<SeriesBatch, AnalyticsError> {
        match self.source.query(metrics, range, window) {
            Ok(series) => Ok(SeriesBatch::new(series)),
            Err(err) => {
                error!(error = %err, range = %range, "telemetry query failed");
                Err(err.into())
            }
        }
    }

    /// Energy use and cost over `range`
    pub fn energy_costs(&self, range: TimeRange) -> Result<Outcome<EnergyCostResult>, AnalyticsError> {
        let window = select_window(range);
        let batch = self.query_batch(&[POWER_CONSUMPTION], range, Some(window))?;

        let Some(power) = batch.get(POWER_CONSUMPTION).filter(|s| !s.is_empty()) else {
            info!(range = %range, "no power data; energy cost is empty");
            return Ok(Outcome::no_data());
        };

        let result = energy_cost(power, self.price_per_kwh);
        info!(
            range = %range,
            window = %window,
            total_kwh = result.total_kwh,
            total_cost = result.total_cost,
            "energy cost computed"
        );
        Ok(Outcome::complete(result))
    }

    /// Compressor and auxiliary-heater runtime over `range`
    pub fn runtime_stats(&self, range: TimeRange) -> Result<Outcome<RuntimeStats>, AnalyticsError> {
        let window = select_window(range);
        let batch = self.query_batch(&RUNTIME_METRICS, range, Some(window))?;

        if batch.is_empty() {
            info!(range = %range, "no runtime data; runtime stats are empty");
            return Ok(Outcome::no_data());
        }

        let Some(stats) = runtime_stats(
            &batch.series_or_empty(COMPRESSOR_STATUS),
            &batch.series_or_empty(ADDITIONAL_HEAT_PERCENT),
        ) else {
            info!(range = %range, "runtime data spans no time; runtime stats are empty");
            return Ok(Outcome::no_data());
        };
        info!(
            range = %range,
            compressor_percent = stats.compressor_runtime_percent,
            aux_percent = stats.aux_heater_runtime_percent,
            total_hours = stats.total_hours,
            "runtime stats computed"
        );
        Ok(Outcome::complete(stats))
    }

    /// Every series the dashboard needs over `range`, fetched once at the
    /// batch window so cycle and COP analyses can share it
    pub fn fetch_batch(&self, range: TimeRange) -> Result<SeriesBatch, AnalyticsError> {
        let mut metrics: Vec<&str> = Vec::new();
        for metric in HOT_WATER_METRICS
            .iter()
            .chain(COP_METRICS.iter())
            .chain(RUNTIME_METRICS.iter())
        {
            if !metrics.contains(metric) {
                metrics.push(*metric);
            }
        }

        let window = select_window(range);
        let batch = self.query_batch(&metrics, range, Some(window))?;
        info!(range = %range, window = %window, metrics = batch.metrics().count(), "batch fetched");
        Ok(batch)
    }

    /// Hot-water cycles over `range`, detected on 1-minute data
    pub fn hot_water_cycles(&self, range: TimeRange) -> Result<Outcome<CycleSummary>, AnalyticsError> {
        let batch = self.query_batch(&HOT_WATER_METRICS, range, Some(FINE_WINDOW))?;
        Ok(self.hot_water_cycles_from_batch(&batch))
    }

    /// Hot-water cycles from already fetched series
    pub fn hot_water_cycles_from_batch(&self, batch: &SeriesBatch) -> Outcome<CycleSummary> {
        let valve = batch.series_or_empty(SWITCH_VALVE_STATUS);
        let power = batch.series_or_empty(POWER_CONSUMPTION);
        let detector = HotWaterCycleDetector::for_window(valve.aggregation());

        analyze_hot_water_cycles(&detector, &valve, &power)
    }

    /// Estimated COP over `range` at chart resolution
    pub fn cop(&self, range: TimeRange) -> Result<Outcome<CopSeries>, AnalyticsError> {
        let batch = self.query_batch(&COP_METRICS, range, Some(select_cop_window(range)))?;
        Ok(self.cop_from_batch(&batch))
    }

    /// Estimated COP from already fetched series
    pub fn cop_from_batch(&self, batch: &SeriesBatch) -> Outcome<CopSeries> {
        if batch.is_empty() {
            info!("no data for cop estimate");
            return Outcome::no_data();
        }

        let cop = estimate_cop_from_batch(batch);
        info!(
            rows = cop.points.len(),
            mean_cop = ?cop.mean_cop(),
            "cop series computed"
        );
        Outcome::complete(cop)
    }

    /// Current alarm state, with the time the alarm started when one is active
    pub fn alarm_status(&self) -> Result<AlarmStatus, AnalyticsError> {
        let latest = self.latest_values()?;
        let mut status = resolve_alarm_status(&latest, &Series::empty(ALARM_CODE), self.resolver());

        if status.is_alarm {
            let history = self.query_batch(&[ALARM_CODE], ALARM_LOOKBACK, None)?;
            status.alarm_time = alarm_onset(&history.series_or_empty(ALARM_CODE));
            warn!(
                code = status.alarm_code,
                description = %status.alarm_description,
                since = ?status.alarm_time,
                "heat pump alarm active"
            );
        }

        Ok(status)
    }

    /// Newest `limit` state changes over the last 24 hours
    pub fn event_log(&self, limit: usize) -> Result<Vec<EventRecord>, AnalyticsError> {
        let batch = self.query_batch(&EVENT_METRICS, EVENT_LOG_RANGE, Some(FINE_WINDOW))?;
        let events = build_event_log(&batch, self.resolver(), limit);
        info!(limit, returned = events.len(), "event log generated");
        Ok(events)
    }

    /// Most recent reading per metric
    pub fn latest_values(&self) -> Result<BTreeMap<String, LatestValue>, AnalyticsError> {
        self.source.latest().map_err(|err| {
            error!(error = %err, "latest value query failed");
            err.into()
        })
    }

    /// Per-metric extrema over `range`
    pub fn min_max(&self, range: TimeRange) -> Result<BTreeMap<String, MinMax>, AnalyticsError> {
        self.source.min_max(range).map_err(|err| {
            error!(error = %err, range = %range, "min/max query failed");
            err.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmCodeTable, Brand};
    use crate::metrics::{
        ALARM_STATUS, BRINE_IN_EVAPORATOR, BRINE_OUT_CONDENSER, BRINE_PUMP_STATUS, RADIATOR_FORWARD,
        RADIATOR_RETURN,
    };
    use crate::source::{MemorySource, SourceError};
    use crate::types::{DataStatus, Sample, Severity};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn samples(metric: &str, readings: impl IntoIterator<Item = (i64, f64)>) -> Vec<Sample> {
        readings
            .into_iter()
            .map(|(minute, value)| Sample {
                metric: metric.to_string(),
                timestamp: t(minute),
                value,
                unit: None,
            })
            .collect()
    }

    fn analyzer(samples: Vec<Sample>, now: i64) -> HeatPumpAnalyzer<MemorySource> {
        let mut codes = BTreeMap::new();
        codes.insert(3, "Low brine flow".to_string());
        HeatPumpAnalyzer::new(
            MemorySource::new(&samples, t(now)),
            Box::new(AlarmCodeTable::new(Brand::Thermia, codes)),
            2.0,
        )
    }

    struct FailingSource;

    impl TelemetrySource for FailingSource {
        fn query(
            &self,
            _metrics: &[&str],
            _range: TimeRange,
            _window: Option<AggregationWindow>,
        ) -> Result<Vec<Series>, SourceError> {
            Err(SourceError::Unavailable("connection refused".into()))
        }

        fn latest(&self) -> Result<BTreeMap<String, LatestValue>, SourceError> {
            Err(SourceError::Timeout("30s".into()))
        }

        fn min_max(&self, _range: TimeRange) -> Result<BTreeMap<String, MinMax>, SourceError> {
            Err(SourceError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn test_energy_costs_over_constant_power() {
        // 2 kW for two hours, sampled every 5 minutes
        let data = samples(POWER_CONSUMPTION, (0..=24).map(|i| (i * 5, 2000.0)));
        let analyzer = analyzer(data, 130);

        let outcome = analyzer.energy_costs(TimeRange::Hours(24)).unwrap();

        assert_eq!(outcome.status, DataStatus::Complete);
        assert_eq!(
            outcome.value.rounded(),
            EnergyCostResult {
                total_kwh: 4.0,
                total_cost: 8.0,
                avg_power: 2000.0,
                peak_power: 2000.0,
            }
        );
    }

    #[test]
    fn test_empty_source_reports_no_data() {
        let analyzer = analyzer(Vec::new(), 0);

        let energy = analyzer.energy_costs(TimeRange::Hours(24)).unwrap();
        assert_eq!(energy, Outcome::no_data());

        let runtime = analyzer.runtime_stats(TimeRange::Hours(24)).unwrap();
        assert_eq!(runtime, Outcome::no_data());

        let cycles = analyzer.hot_water_cycles(TimeRange::Days(7)).unwrap();
        assert_eq!(cycles.status, DataStatus::NoData);

        let cop = analyzer.cop(TimeRange::Hours(24)).unwrap();
        assert_eq!(cop.status, DataStatus::NoData);
        assert!(cop.value.points.is_empty());

        assert!(analyzer.event_log(10).unwrap().is_empty());
        assert_eq!(analyzer.alarm_status().unwrap(), AlarmStatus::default());
    }

    #[test]
    fn test_runtime_stats_from_source() {
        // compressor on for the first hour of two
        let mut data = samples(COMPRESSOR_STATUS, (0..=12).map(|i| (i * 10, if i < 6 { 1.0 } else { 0.0 })));
        data.extend(samples(ADDITIONAL_HEAT_PERCENT, (0..=12).map(|i| (i * 10, 0.0))));
        let analyzer = analyzer(data, 125);

        let outcome = analyzer.runtime_stats(TimeRange::Hours(24)).unwrap();

        assert_eq!(outcome.status, DataStatus::Complete);
        let stats = outcome.value.rounded();
        assert_eq!(stats.total_hours, 2.0);
        assert_eq!(stats.compressor_runtime_hours, 1.0);
        assert_eq!(stats.compressor_runtime_percent, 50.0);
        assert_eq!(stats.aux_heater_runtime_hours, 0.0);
    }

    #[test]
    fn test_single_runtime_sample_reports_no_data() {
        let analyzer = analyzer(samples(COMPRESSOR_STATUS, [(0, 1.0)]), 10);

        let outcome = analyzer.runtime_stats(TimeRange::Hours(24)).unwrap();

        assert_eq!(outcome.status, DataStatus::NoData);
        assert_eq!(outcome.value, RuntimeStats::default());
    }

    #[test]
    fn test_hot_water_cycle_on_minute_data() {
        // valve open from minute 10 to 30, 3 kW throughout
        let mut data = samples(
            SWITCH_VALVE_STATUS,
            (0..=40).map(|m| (m, if (10..30).contains(&m) { 1.0 } else { 0.0 })),
        );
        data.extend(samples(POWER_CONSUMPTION, (0..=40).map(|m| (m, 3000.0))));
        let analyzer = analyzer(data, 60);

        let outcome = analyzer.hot_water_cycles(TimeRange::Hours(2)).unwrap();

        assert_eq!(outcome.status, DataStatus::Complete);
        let summary = outcome.value.rounded();
        assert_eq!(summary.total_cycles, 1);
        assert_eq!(summary.avg_cycle_duration_minutes, 20.0);
        assert_eq!(summary.avg_energy_per_cycle_kwh, 1.0);
        // one cycle over a 40 minute valve span
        assert_eq!(summary.cycles_per_day, 36.0);
    }

    #[test]
    fn test_hot_water_without_transitions() {
        let data = samples(SWITCH_VALVE_STATUS, (0..=30).map(|m| (m, 0.0)));
        let analyzer = analyzer(data, 30);

        let outcome = analyzer.hot_water_cycles(TimeRange::Hours(1)).unwrap();

        assert_eq!(outcome, Outcome::no_valid_cycles());
    }

    #[test]
    fn test_shared_batch_feeds_cycles_and_cop() {
        let mut data = samples(COMPRESSOR_STATUS, (0..=12).map(|i| (i * 5, 1.0)));
        data.extend(samples(RADIATOR_FORWARD, (0..=12).map(|i| (i * 5, 36.0))));
        data.extend(samples(RADIATOR_RETURN, (0..=12).map(|i| (i * 5, 30.0))));
        data.extend(samples(BRINE_IN_EVAPORATOR, (0..=12).map(|i| (i * 5, 5.0))));
        data.extend(samples(BRINE_OUT_CONDENSER, (0..=12).map(|i| (i * 5, 2.0))));
        data.extend(samples(POWER_CONSUMPTION, (0..=12).map(|i| (i * 5, 1800.0))));
        let analyzer = analyzer(data, 60);

        let batch = analyzer.fetch_batch(TimeRange::Hours(6)).unwrap();

        let cop = analyzer.cop_from_batch(&batch);
        assert_eq!(cop.status, DataStatus::Complete);
        assert_eq!(cop.value.mean_cop(), Some(4.0));

        let cycles = analyzer.hot_water_cycles_from_batch(&batch);
        assert_eq!(cycles.status, DataStatus::NoData);
    }

    #[test]
    fn test_cop_uses_chart_window() {
        let mut data = Vec::new();
        for (metric, value) in [
            (COMPRESSOR_STATUS, 1.0),
            (RADIATOR_FORWARD, 36.0),
            (RADIATOR_RETURN, 30.0),
            (BRINE_IN_EVAPORATOR, 5.0),
            (BRINE_OUT_CONDENSER, 2.0),
        ] {
            data.extend(samples(metric, (0..60).map(|m| (m, value))));
        }
        let analyzer = analyzer(data, 60);

        // 6h range => 2 minute windows
        let outcome = analyzer.cop(TimeRange::Hours(6)).unwrap();

        assert_eq!(outcome.value.points.len(), 30);
        assert!(outcome.value.estimates().all(|(_, cop)| cop == 4.0));
    }

    #[test]
    fn test_alarm_status_resolves_onset() {
        let mut data = samples(ALARM_CODE, [(0, 0.0), (600, 3.0), (1200, 3.0), (1500, 3.0)]);
        data.extend(samples(ALARM_STATUS, [(1500, 1.0)]));
        let analyzer = analyzer(data, 1510);

        let status = analyzer.alarm_status().unwrap();

        assert_eq!(
            status,
            AlarmStatus {
                is_alarm: true,
                alarm_code: 3,
                alarm_description: "Low brine flow".to_string(),
                alarm_time: Some(t(600)),
                alarm_status_raw: 1.0,
            }
        );
    }

    #[test]
    fn test_event_log_covers_last_day() {
        let mut data = samples(COMPRESSOR_STATUS, [(0, 0.0), (10, 1.0), (20, 0.0)]);
        data.extend(samples(ALARM_CODE, [(0, 0.0), (15, 3.0)]));
        // outside the 24h window
        data.extend(samples(BRINE_PUMP_STATUS, [(-2000, 0.0), (-1990, 1.0)]));
        let analyzer = analyzer(data, 30);

        let events = analyzer.event_log(10).unwrap();

        let described: Vec<(&str, Severity)> = events
            .iter()
            .map(|e| (e.description.as_str(), e.severity))
            .collect();
        assert_eq!(
            described,
            vec![
                ("Compressor turned OFF", Severity::Info),
                ("Alarm: Low brine flow", Severity::Danger),
                ("Compressor turned ON", Severity::Info),
            ]
        );
    }

    #[test]
    fn test_upstream_failure_is_an_error() {
        let analyzer = HeatPumpAnalyzer::new(
            FailingSource,
            Box::new(AlarmCodeTable::empty(Brand::Ivt)),
            2.0,
        );

        let err = analyzer.energy_costs(TimeRange::Hours(24)).unwrap_err();
        assert!(matches!(err, AnalyticsError::UpstreamQueryFailure(_)));
        assert!(err.is_retryable());

        assert!(analyzer.hot_water_cycles(TimeRange::Days(7)).is_err());
        assert!(analyzer.cop(TimeRange::Days(1)).is_err());
        assert!(analyzer.event_log(10).is_err());
        assert!(analyzer.alarm_status().is_err());
        assert!(analyzer.min_max(TimeRange::Hours(1)).is_err());
    }

    #[test]
    fn test_repeated_analysis_is_identical() {
        let data = samples(POWER_CONSUMPTION, [(0, 1000.0), (7, 2500.0), (19, 1800.0), (31, 0.0)]);
        let analyzer = analyzer(data, 40);

        assert_eq!(
            analyzer.energy_costs(TimeRange::Hours(1)).unwrap(),
            analyzer.energy_costs(TimeRange::Hours(1)).unwrap()
        );
    }
}
