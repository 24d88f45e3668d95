//! Coefficient-of-performance estimation
//!
//! The estimate is a heuristic from temperature differentials, not a
//! calorimetric measurement: `2.0 + radiator_delta / brine_delta`, computed
//! only while the compressor runs and both differentials exceed 0.5 °C, then
//! clamped to a physically plausible range.

use tracing::debug;

use crate::frame::{AlignedFrame, FrameRow};
use crate::metrics::{
    BRINE_IN_EVAPORATOR, BRINE_OUT_CONDENSER, COMPRESSOR_STATUS, COP_METRICS, POWER_CONSUMPTION,
    RADIATOR_FORWARD, RADIATOR_RETURN,
};
use crate::series::SeriesBatch;
use crate::types::{CopPoint, CopSeries};

pub const MIN_COP: f64 = 1.5;
pub const MAX_COP: f64 = 6.0;
/// Smallest temperature differential (°C) treated as real heat transfer
pub const MIN_DELTA: f64 = 0.5;

const COP_BASELINE: f64 = 2.0;

/// Clamp a raw estimate into `[MIN_COP, MAX_COP]`
pub fn clamp_cop(raw: f64) -> f64 {
    raw.clamp(MIN_COP, MAX_COP)
}

/// Estimate for one row, `None` when the row is outside the mask
fn estimate_row(compressor: Option<f64>, radiator_delta: Option<f64>, brine_delta: Option<f64>) -> Option<f64> {
    let running = compressor? > 0.0;
    let radiator_delta = radiator_delta?;
    let brine_delta = brine_delta?;

    if running && radiator_delta > MIN_DELTA && brine_delta > MIN_DELTA {
        Some(clamp_cop(COP_BASELINE + radiator_delta / brine_delta))
    } else {
        None
    }
}

fn cop_point(row: &FrameRow) -> CopPoint {
    let radiator_delta = row.delta(RADIATOR_FORWARD, RADIATOR_RETURN);
    let brine_delta = row.delta(BRINE_IN_EVAPORATOR, BRINE_OUT_CONDENSER);

    CopPoint {
        time: row.time,
        radiator_delta,
        brine_delta,
        power_consumption: row.get(POWER_CONSUMPTION),
        estimated_cop: estimate_row(row.get(COMPRESSOR_STATUS), radiator_delta, brine_delta),
    }
}

/// Per-timestamp COP estimates over an aligned frame
pub fn estimate_cop(frame: &AlignedFrame) -> CopSeries {
    let points: Vec<CopPoint> = frame.rows().iter().map(cop_point).collect();

    debug!(
        rows = points.len(),
        estimated = points.iter().filter(|p| p.estimated_cop.is_some()).count(),
        "cop estimated"
    );

    CopSeries { points }
}

/// Align the COP input metrics of `batch` and estimate
pub fn estimate_cop_from_batch(batch: &SeriesBatch) -> CopSeries {
    let frame = AlignedFrame::align(COP_METRICS.iter().filter_map(|metric| batch.get(metric)));
    estimate_cop(&frame)
}
