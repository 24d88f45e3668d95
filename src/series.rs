//! Time-ordered metric series
//!
//! A [`Series`] is the unit every analysis consumes: one metric, points sorted
//! ascending by time, optionally tagged with the aggregation window it was
//! produced with. A [`SeriesBatch`] groups the series returned by a single
//! source query so several analyses can share one fetch.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Sample;
use crate::window::AggregationWindow;

/// One timestamped value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl Point {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }
}

/// Points of a single metric, sorted ascending by time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeriesRepr")]
pub struct Series {
    metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregation: Option<AggregationWindow>,
    points: Vec<Point>,
}

/// Wire form of [`Series`]; points may arrive in any order
#[derive(Deserialize)]
struct SeriesRepr {
    metric: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    aggregation: Option<AggregationWindow>,
    #[serde(default)]
    points: Vec<Point>,
}

impl From<SeriesRepr> for Series {
    fn from(repr: SeriesRepr) -> Self {
        Series::new(repr.metric, repr.points)
            .with_unit(repr.unit)
            .with_aggregation(repr.aggregation)
    }
}

impl Series {
    /// Build a series, sorting points by time. Equal timestamps keep their
    /// input order.
    pub fn new(metric: impl Into<String>, mut points: Vec<Point>) -> Self {
        points.sort_by_key(|p| p.time);
        Self {
            metric: metric.into(),
            unit: None,
            aggregation: None,
            points,
        }
    }

    /// Empty series for a metric
    pub fn empty(metric: impl Into<String>) -> Self {
        Self::new(metric, Vec::new())
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }

    /// Tag the series with the window it was aggregated with upstream
    pub fn with_aggregation(mut self, window: Option<AggregationWindow>) -> Self {
        self.aggregation = window;
        self
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn aggregation(&self) -> Option<AggregationWindow> {
        self.aggregation
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Elapsed time between the first and last point
    pub fn span(&self) -> Option<Duration> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some(last.time - first.time),
            _ => None,
        }
    }

    /// Points with `start <= time <= end`
    pub fn slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Series {
        let from = self.points.partition_point(|p| p.time < start);
        let to = self.points.partition_point(|p| p.time <= end);
        let points = if from < to {
            self.points[from..to].to_vec()
        } else {
            Vec::new()
        };

        Series {
            metric: self.metric.clone(),
            unit: self.unit.clone(),
            aggregation: self.aggregation,
            points,
        }
    }

    /// Mean-aggregate into fixed windows aligned to the Unix epoch.
    ///
    /// Each non-empty window yields one point labelled with the window's end
    /// time; empty windows are omitted. The result never contains two points
    /// with the same timestamp.
    pub fn aggregate(&self, window: AggregationWindow) -> Series {
        let width = window.as_seconds();
        if width <= 0 {
            return self.dedup_mean();
        }

        let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for point in &self.points {
            let bucket = point.time.timestamp().div_euclid(width);
            let entry = buckets.entry(bucket).or_insert((0.0, 0));
            entry.0 += point.value;
            entry.1 += 1;
        }

        let points = buckets
            .into_iter()
            .filter_map(|(bucket, (sum, count))| {
                let stop = (bucket + 1).checked_mul(width)?;
                Utc.timestamp_opt(stop, 0)
                    .single()
                    .map(|stop| Point::new(stop, sum / count as f64))
            })
            .collect();

        Series {
            metric: self.metric.clone(),
            unit: self.unit.clone(),
            aggregation: Some(window),
            points,
        }
    }

    /// Collapse points that share a timestamp into their mean
    pub fn dedup_mean(&self) -> Series {
        let mut points: Vec<Point> = Vec::with_capacity(self.points.len());
        let mut run_len = 0usize;

        for point in &self.points {
            match points.last_mut() {
                Some(last) if last.time == point.time => {
                    // running mean over the run of equal timestamps
                    run_len += 1;
                    last.value += (point.value - last.value) / run_len as f64;
                }
                _ => {
                    points.push(*point);
                    run_len = 1;
                }
            }
        }

        Series {
            metric: self.metric.clone(),
            unit: self.unit.clone(),
            aggregation: self.aggregation,
            points,
        }
    }
}

/// Seconds from `from` to `to` with microsecond resolution
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Series returned by one source query, keyed by metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesBatch {
    series: BTreeMap<String, Series>,
}

impl SeriesBatch {
    pub fn new(series: Vec<Series>) -> Self {
        let mut batch = Self::default();
        for s in series {
            batch.insert(s);
        }
        batch
    }

    /// Group a flat sample list into one series per metric
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut grouped: BTreeMap<&str, Vec<Point>> = BTreeMap::new();
        let mut units: BTreeMap<&str, String> = BTreeMap::new();
        for sample in samples {
            grouped
                .entry(sample.metric.as_str())
                .or_default()
                .push(Point::new(sample.timestamp, sample.value));
            if let Some(unit) = &sample.unit {
                units.entry(sample.metric.as_str()).or_insert_with(|| unit.clone());
            }
        }

        Self::new(
            grouped
                .into_iter()
                .map(|(metric, points)| {
                    Series::new(metric, points).with_unit(units.get(metric).cloned())
                })
                .collect(),
        )
    }

    /// Insert a series, merging points if the metric is already present
    pub fn insert(&mut self, series: Series) {
        match self.series.get_mut(series.metric()) {
            Some(existing) => {
                let mut points = std::mem::take(&mut existing.points);
                points.extend_from_slice(series.points());
                points.sort_by_key(|p| p.time);
                existing.points = points;
            }
            None => {
                self.series.insert(series.metric().to_string(), series);
            }
        }
    }

    pub fn get(&self, metric: &str) -> Option<&Series> {
        self.series.get(metric)
    }

    /// Series for `metric`, or an empty one when the source returned nothing
    pub fn series_or_empty(&self, metric: &str) -> Series {
        self.get(metric)
            .cloned()
            .unwrap_or_else(|| Series::empty(metric))
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.values()
    }

    /// True when no series holds a single point
    pub fn is_empty(&self) -> bool {
        self.series.values().all(Series::is_empty)
    }
}
