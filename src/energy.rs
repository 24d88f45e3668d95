//! Energy integration
//!
//! Power readings (W) are integrated over the real elapsed time between
//! consecutive readings, so the result holds for any sampling rate. Each
//! reading is weighted by the time since the previous one.

use serde::{Deserialize, Serialize};

use crate::series::{seconds_between, Point, Series};
use crate::types::EnergyCostResult;

/// Energy drawn over a power series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyIntegral {
    /// Integrated energy (kWh)
    pub total_kwh: f64,
    /// Mean power reading (W)
    pub avg_power: f64,
    /// Highest power reading (W)
    pub peak_power: f64,
}

/// Integrate a power series (W) into kWh.
///
/// Each reading contributes `power[i] * (t[i] - t[i-1])`; the first reading
/// has no predecessor and contributes nothing. An empty series integrates to
/// all zeros.
pub fn integrate_energy(power: &Series) -> EnergyIntegral {
    let points = power.points();
    if points.is_empty() {
        return EnergyIntegral::default();
    }

    let mut watt_hours = 0.0;
    let mut sum = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut previous: Option<&Point> = None;

    for point in points {
        if let Some(prev) = previous {
            let hours = seconds_between(prev.time, point.time) / 3600.0;
            watt_hours += point.value * hours;
        }
        sum += point.value;
        peak = peak.max(point.value);
        previous = Some(point);
    }

    EnergyIntegral {
        total_kwh: watt_hours / 1000.0,
        avg_power: sum / points.len() as f64,
        peak_power: peak,
    }
}

/// Energy use and its cost at `price_per_kwh`
pub fn energy_cost(power: &Series, price_per_kwh: f64) -> EnergyCostResult {
    let integral = integrate_energy(power);
    EnergyCostResult {
        total_kwh: integral.total_kwh,
        total_cost: integral.total_kwh * price_per_kwh,
        avg_power: integral.avg_power,
        peak_power: integral.peak_power,
    }
}
