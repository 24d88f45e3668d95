//! Analyzer configuration
//!
//! Loaded from a JSON file, then overridden by environment variables:
//!
//! ```json
//! {
//!   "brand": "thermia",
//!   "price_per_kwh": 1.85,
//!   "alarm_codes": { "2": "High pressure switch" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::alarm::{AlarmCodeTable, Brand};
use crate::error::AnalyticsError;
use crate::source::MetricScaling;

pub const BRAND_ENV: &str = "HEATPUMP_BRAND";
pub const PRICE_ENV: &str = "HEATPUMP_PRICE_PER_KWH";

pub const DEFAULT_PRICE_PER_KWH: f64 = 2.0;

fn default_price() -> f64 {
    DEFAULT_PRICE_PER_KWH
}

/// Settings shared by every analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub brand: Brand,
    /// Electricity price per kWh
    #[serde(default = "default_price")]
    pub price_per_kwh: f64,
    /// Alarm code descriptions for `brand`
    #[serde(default)]
    pub alarm_codes: BTreeMap<i64, String>,
    #[serde(default)]
    pub scaling: MetricScaling,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            brand: Brand::default(),
            price_per_kwh: DEFAULT_PRICE_PER_KWH,
            alarm_codes: BTreeMap::new(),
            scaling: MetricScaling::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json(json: &str) -> Result<Self, AnalyticsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, AnalyticsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path).map_err(|e| {
            AnalyticsError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&json)?;
        info!(path = %path.display(), brand = %config.brand, "loaded config");
        Ok(config)
    }

    /// Apply `HEATPUMP_BRAND` and `HEATPUMP_PRICE_PER_KWH` when set
    pub fn with_env_overrides(self) -> Result<Self, AnalyticsError> {
        let brand = std::env::var(BRAND_ENV).ok();
        let price = std::env::var(PRICE_ENV).ok();
        self.with_overrides(brand.as_deref(), price.as_deref())
    }

    pub fn with_overrides(
        mut self,
        brand: Option<&str>,
        price_per_kwh: Option<&str>,
    ) -> Result<Self, AnalyticsError> {
        if let Some(brand) = brand {
            self.brand = brand.parse()?;
        }
        if let Some(price) = price_per_kwh {
            self.price_per_kwh = price.trim().parse().map_err(|_| {
                AnalyticsError::ConfigError(format!("invalid price per kWh: {price:?}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if !self.price_per_kwh.is_finite() || self.price_per_kwh < 0.0 {
            return Err(AnalyticsError::ConfigError(format!(
                "price per kWh must be a non-negative number, got {}",
                self.price_per_kwh
            )));
        }
        Ok(())
    }

    /// Alarm code resolver for the configured brand
    pub fn resolver(&self) -> AlarmCodeTable {
        AlarmCodeTable::new(self.brand, self.alarm_codes.clone())
    }
}
