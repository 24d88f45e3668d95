//! In-memory telemetry source backed by NDJSON samples

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::io::BufRead;
use tracing::debug;

use super::{MetricScaling, SourceError, TelemetrySource};
use crate::series::{Series, SeriesBatch};
use crate::types::{LatestValue, MinMax, Sample};
use crate::window::{AggregationWindow, TimeRange};

/// How far back `latest` looks for a reading
const LATEST_LOOKBACK_HOURS: i64 = 1;

/// Samples held in memory, queried relative to a fixed reference time
#[derive(Debug, Clone)]
pub struct MemorySource {
    now: DateTime<Utc>,
    batch: SeriesBatch,
}

impl MemorySource {
    /// Source over samples already in physical units
    pub fn new(samples: &[Sample], now: DateTime<Utc>) -> Self {
        Self {
            now,
            batch: SeriesBatch::from_samples(samples),
        }
    }

    /// Source over raw register samples, normalized with `scaling`
    pub fn from_raw(samples: Vec<Sample>, scaling: &MetricScaling, now: DateTime<Utc>) -> Self {
        let scaled: Vec<Sample> = samples.into_iter().map(|s| scaling.apply(s)).collect();
        Self::new(&scaled, now)
    }

    /// Load raw samples from newline-delimited JSON.
    ///
    /// Blank lines are skipped. The reference time is the newest sample, or
    /// the current time when the input holds no samples.
    pub fn from_ndjson<R: BufRead>(reader: R, scaling: &MetricScaling) -> Result<Self, SourceError> {
        let mut samples = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let sample: Sample =
                serde_json::from_str(trimmed).map_err(|e| SourceError::Malformed {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            samples.push(sample);
        }

        let now = samples
            .iter()
            .map(|s| s.timestamp)
            .max()
            .unwrap_or_else(Utc::now);

        debug!(samples = samples.len(), now = %now, "loaded ndjson telemetry");
        Ok(Self::from_raw(samples, scaling, now))
    }

    /// Move the reference time
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.batch.metrics()
    }

    fn in_range(&self, metric: &str, range: TimeRange) -> Option<Series> {
        let series = self.batch.get(metric)?;
        let sliced = series.slice(self.now - range.duration(), self.now);
        (!sliced.is_empty()).then_some(sliced)
    }
}

impl TelemetrySource for MemorySource {
    fn query(
        &self,
        metrics: &[&str],
        range: TimeRange,
        window: Option<AggregationWindow>,
    ) -> Result<Vec<Series>, SourceError> {
        let mut result = Vec::with_capacity(metrics.len());

        for metric in metrics {
            let Some(series) = self.in_range(metric, range) else {
                continue;
            };
            result.push(match window {
                Some(window) => series.aggregate(window),
                None => series,
            });
        }

        Ok(result)
    }

    fn latest(&self) -> Result<BTreeMap<String, LatestValue>, SourceError> {
        let since = self.now - Duration::hours(LATEST_LOOKBACK_HOURS);
        let mut latest = BTreeMap::new();

        for series in self.batch.iter() {
            let recent = series.slice(since, self.now);
            if let Some(point) = recent.last() {
                latest.insert(
                    series.metric().to_string(),
                    LatestValue {
                        value: point.value,
                        unit: series.unit().map(str::to_string),
                        time: point.time,
                    },
                );
            }
        }

        Ok(latest)
    }

    fn min_max(&self, range: TimeRange) -> Result<BTreeMap<String, MinMax>, SourceError> {
        let mut extrema = BTreeMap::new();

        for metric in self.batch.metrics() {
            let Some(series) = self.in_range(metric, range) else {
                continue;
            };
            let values = series.points().iter().map(|p| p.value);
            let min = values.clone().fold(f64::INFINITY, f64::min);
            let max = values.fold(f64::NEG_INFINITY, f64::max);
            extrema.insert(metric.to_string(), MinMax { min, max });
        }

        Ok(extrema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{POWER_CONSUMPTION, RADIATOR_FORWARD};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn sample(metric: &str, minute: i64, value: f64) -> Sample {
        Sample {
            metric: metric.to_string(),
            timestamp: t(minute),
            value,
            unit: None,
        }
    }

    #[test]
    fn test_ndjson_loading_scales_and_anchors() {
        let input = concat!(
            r#"{"name":"radiator_forward","time":"2024-01-15T11:00:00Z","value":350,"unit":"°C"}"#,
            "\n\n",
            r#"{"metric":"power_consumption","timestamp":"2024-01-15T11:30:00Z","value":1500}"#,
            "\n",
        );

        let source = MemorySource::from_ndjson(input.as_bytes(), &MetricScaling::default()).unwrap();

        assert_eq!(source.now(), t(-30));
        let latest = source.latest().unwrap();
        assert_eq!(latest[RADIATOR_FORWARD].value, 35.0);
        assert_eq!(latest[RADIATOR_FORWARD].unit.as_deref(), Some("°C"));
        assert_eq!(latest[POWER_CONSUMPTION].value, 1500.0);
    }

    #[test]
    fn test_ndjson_reports_bad_line() {
        let input = "{\"name\":\"radiator_forward\",\"time\":\"2024-01-15T11:00:00Z\",\"value\":1}\nnot json\n";

        let err = MemorySource::from_ndjson(input.as_bytes(), &MetricScaling::default()).unwrap_err();

        assert!(matches!(err, SourceError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_query_filters_range_and_aggregates() {
        let samples = vec![
            sample(POWER_CONSUMPTION, -120, 900.0),
            sample(POWER_CONSUMPTION, -50, 1000.0),
            sample(POWER_CONSUMPTION, -49, 2000.0),
            sample(POWER_CONSUMPTION, -10, 3000.0),
        ];
        let source = MemorySource::new(&samples, t(0));

        let raw = source
            .query(&[POWER_CONSUMPTION, RADIATOR_FORWARD], TimeRange::Hours(1), None)
            .unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].len(), 3);

        let aggregated = source
            .query(&[POWER_CONSUMPTION], TimeRange::Hours(1), Some(AggregationWindow::minutes(5)))
            .unwrap();
        let points = aggregated[0].points();
        assert_eq!(points.len(), 2);
        // 11:10 and 11:11 share the 11:10-11:15 window, labelled 11:15
        assert_eq!(points[0].time, t(-45));
        assert_eq!(points[0].value, 1500.0);
        assert_eq!(points[1].time, t(-5));
    }

    #[test]
    fn test_latest_ignores_stale_metrics() {
        let samples = vec![
            sample(POWER_CONSUMPTION, -30, 1200.0),
            sample(RADIATOR_FORWARD, -90, 35.0),
        ];
        let source = MemorySource::new(&samples, t(0));

        let latest = source.latest().unwrap();

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[POWER_CONSUMPTION].time, t(-30));
    }

    #[test]
    fn test_min_max_per_metric() {
        let samples = vec![
            sample(RADIATOR_FORWARD, -300, 10.0),
            sample(RADIATOR_FORWARD, -30, 31.0),
            sample(RADIATOR_FORWARD, -20, 38.5),
            sample(RADIATOR_FORWARD, -10, 33.0),
        ];
        let source = MemorySource::new(&samples, t(0));

        let extrema = source.min_max(TimeRange::Hours(1)).unwrap();

        assert_eq!(extrema[RADIATOR_FORWARD], MinMax { min: 31.0, max: 38.5 });
    }
}
