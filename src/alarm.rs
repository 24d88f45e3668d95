//! Brand-specific alarm decoding and alarm status resolution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;
use crate::metrics::{ALARM_CODE, ALARM_STATUS};
use crate::series::Series;
use crate::types::{AlarmStatus, LatestValue, NO_ALARM_DESCRIPTION};

/// Supported heat-pump brands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    #[default]
    Thermia,
    Ivt,
}

impl Brand {
    pub fn display_name(&self) -> &'static str {
        match self {
            Brand::Thermia => "Thermia",
            Brand::Ivt => "IVT",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Thermia => "thermia",
            Brand::Ivt => "ivt",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Brand {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thermia" => Ok(Brand::Thermia),
            "ivt" => Ok(Brand::Ivt),
            other => Err(AnalyticsError::UnsupportedBrand(other.to_string())),
        }
    }
}

/// Turns brand alarm codes into human-readable descriptions
pub trait AlarmCodeResolver: Send + Sync {
    /// Brand this resolver decodes for
    fn brand(&self) -> Brand;

    /// Description of a known code
    fn describe(&self, code: i64) -> Option<&str>;

    /// Description of `code`, with a generic fallback for unknown codes
    fn decode(&self, code: i64) -> String {
        match self.describe(code) {
            Some(description) => description.to_string(),
            None => format!("Unknown alarm code {code}"),
        }
    }
}

/// Table-backed resolver for one brand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmCodeTable {
    brand: Brand,
    codes: BTreeMap<i64, String>,
}

impl AlarmCodeTable {
    pub fn new(brand: Brand, codes: BTreeMap<i64, String>) -> Self {
        Self { brand, codes }
    }

    /// Resolver with no known codes; every code decodes to the fallback
    pub fn empty(brand: Brand) -> Self {
        Self::new(brand, BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl AlarmCodeResolver for AlarmCodeTable {
    fn brand(&self) -> Brand {
        self.brand
    }

    fn describe(&self, code: i64) -> Option<&str> {
        self.codes.get(&code).map(String::as_str)
    }
}

/// Start of the most recent run of positive alarm codes.
///
/// Scans backward from the newest positive reading until a non-positive
/// reading or the start of the series.
pub fn alarm_onset(alarm_codes: &Series) -> Option<DateTime<Utc>> {
    let points = alarm_codes.points();
    let newest_active = points.iter().rposition(|p| p.value > 0.0)?;

    let onset = points[..=newest_active]
        .iter()
        .rev()
        .take_while(|p| p.value > 0.0)
        .last()?;

    Some(onset.time)
}

/// Build the current alarm status from the latest register values.
///
/// `alarm_history` is the alarm-code series of the lookback window and is only
/// consulted while an alarm is active.
pub fn resolve_alarm_status(
    latest: &BTreeMap<String, LatestValue>,
    alarm_history: &Series,
    resolver: &dyn AlarmCodeResolver,
) -> AlarmStatus {
    let status_raw = latest.get(ALARM_STATUS).map(|v| v.value).unwrap_or(0.0);
    let code = latest
        .get(ALARM_CODE)
        .map(|v| v.value.trunc() as i64)
        .unwrap_or(0);

    let is_alarm = status_raw > 0.0 || code > 0;

    let alarm_description = if code > 0 {
        resolver.decode(code)
    } else {
        NO_ALARM_DESCRIPTION.to_string()
    };

    let alarm_time = if is_alarm {
        alarm_onset(alarm_history)
    } else {
        None
    };

    AlarmStatus {
        is_alarm,
        alarm_code: code,
        alarm_description,
        alarm_time,
        alarm_status_raw: status_raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Point;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn table() -> AlarmCodeTable {
        let mut codes = BTreeMap::new();
        codes.insert(2, "High pressure switch".to_string());
        codes.insert(10, "Low brine temperature".to_string());
        AlarmCodeTable::new(Brand::Thermia, codes)
    }

    fn latest(status: f64, code: f64) -> BTreeMap<String, LatestValue> {
        let mut values = BTreeMap::new();
        values.insert(
            ALARM_STATUS.to_string(),
            LatestValue { value: status, unit: None, time: t(48) },
        );
        values.insert(
            ALARM_CODE.to_string(),
            LatestValue { value: code, unit: None, time: t(48) },
        );
        values
    }

    fn history(values: &[(i64, f64)]) -> Series {
        Series::new(
            ALARM_CODE,
            values.iter().map(|(h, v)| Point::new(t(*h), *v)).collect(),
        )
    }

    #[test]
    fn test_brand_parsing() {
        assert_eq!("thermia".parse::<Brand>().unwrap(), Brand::Thermia);
        assert_eq!(" IVT ".parse::<Brand>().unwrap(), Brand::Ivt);
        assert!(matches!(
            "nibe".parse::<Brand>(),
            Err(AnalyticsError::UnsupportedBrand(b)) if b == "nibe"
        ));
    }

    #[test]
    fn test_decode_known_and_unknown_codes() {
        let resolver = table();
        assert_eq!(resolver.decode(2), "High pressure switch");
        assert_eq!(resolver.decode(99), "Unknown alarm code 99");
        assert_eq!(AlarmCodeTable::empty(Brand::Ivt).decode(2), "Unknown alarm code 2");
    }

    #[test]
    fn test_onset_is_start_of_latest_run() {
        let series = history(&[(0, 0.0), (1, 2.0), (2, 0.0), (10, 10.0), (11, 10.0), (12, 10.0)]);
        assert_eq!(alarm_onset(&series), Some(t(10)));
    }

    #[test]
    fn test_onset_after_clear_points_at_last_run() {
        let series = history(&[(0, 0.0), (3, 2.0), (4, 2.0), (5, 0.0)]);
        assert_eq!(alarm_onset(&series), Some(t(3)));
    }

    #[test]
    fn test_onset_without_positive_codes() {
        assert_eq!(alarm_onset(&history(&[(0, 0.0), (1, 0.0)])), None);
        assert_eq!(alarm_onset(&Series::empty(ALARM_CODE)), None);
    }

    #[test]
    fn test_active_alarm_status() {
        let status = resolve_alarm_status(
            &latest(1.0, 10.0),
            &history(&[(20, 0.0), (30, 10.0), (48, 10.0)]),
            &table(),
        );

        assert_eq!(
            status,
            AlarmStatus {
                is_alarm: true,
                alarm_code: 10,
                alarm_description: "Low brine temperature".to_string(),
                alarm_time: Some(t(30)),
                alarm_status_raw: 1.0,
            }
        );
    }

    #[test]
    fn test_no_alarm_status() {
        let status = resolve_alarm_status(&latest(0.0, 0.0), &history(&[(1, 2.0)]), &table());
        assert_eq!(status, AlarmStatus::default());
    }

    #[test]
    fn test_missing_registers_mean_no_alarm() {
        let status = resolve_alarm_status(&BTreeMap::new(), &Series::empty(ALARM_CODE), &table());
        assert_eq!(status, AlarmStatus::default());
    }

    #[test]
    fn test_status_flag_without_code() {
        let status = resolve_alarm_status(&latest(1.0, 0.0), &Series::empty(ALARM_CODE), &table());

        assert!(status.is_alarm);
        assert_eq!(status.alarm_code, 0);
        assert_eq!(status.alarm_description, NO_ALARM_DESCRIPTION);
        assert_eq!(status.alarm_time, None);
    }
}
