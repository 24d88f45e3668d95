//! Timestamp-aligned multi-metric frames
//!
//! Outer-joins several series on timestamp. Duplicate readings of a metric at
//! one timestamp are averaged; a metric without a reading at a timestamp is
//! simply absent from that row.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::series::Series;

/// One timestamp of an [`AlignedFrame`]
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub time: DateTime<Utc>,
    values: BTreeMap<String, f64>,
}

impl FrameRow {
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }

    /// `a - b` when both metrics are present
    pub fn delta(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.get(a)? - self.get(b)?)
    }
}

/// Rows keyed by timestamp, ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedFrame {
    rows: Vec<FrameRow>,
}

impl AlignedFrame {
    /// Outer-join `series` on timestamp
    pub fn align<'a>(series: impl IntoIterator<Item = &'a Series>) -> Self {
        let mut accumulated: BTreeMap<DateTime<Utc>, BTreeMap<&str, (f64, usize)>> =
            BTreeMap::new();

        for s in series {
            for point in s.points() {
                let cell = accumulated
                    .entry(point.time)
                    .or_default()
                    .entry(s.metric())
                    .or_insert((0.0, 0));
                cell.0 += point.value;
                cell.1 += 1;
            }
        }

        let rows = accumulated
            .into_iter()
            .map(|(time, cells)| FrameRow {
                time,
                values: cells
                    .into_iter()
                    .map(|(metric, (sum, count))| (metric.to_string(), sum / count as f64))
                    .collect(),
            })
            .collect();

        Self { rows }
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one metric per row, `None` where absent
    pub fn column(&self, metric: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.get(metric)).collect()
    }
}
