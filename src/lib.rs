//! Heatpump Insight - analytics engine for heat-pump telemetry
//!
//! Turns irregularly sampled heat-pump readings into operational insight:
//! energy cost, duty-cycle runtime, hot-water heating cycles, an estimated
//! COP series and a chronological event log with alarm decoding. Every
//! computation uses the real elapsed time between readings, so no fixed
//! sample rate is assumed.
//!
//! ## Modules
//!
//! - **Analyses**: [`energy`], [`runtime`], [`cycles`], [`cop`], [`events`], [`alarm`]
//! - **Data model**: [`series`], [`frame`], [`window`], [`types`]
//! - **Access**: [`source`] (telemetry backends) and [`analyzer`] (the facade)

pub mod alarm;
pub mod analyzer;
pub mod config;
pub mod cop;
pub mod cycles;
pub mod energy;
pub mod error;
pub mod events;
pub mod frame;
pub mod metrics;
pub mod runtime;
pub mod series;
pub mod source;
pub mod types;
pub mod window;

pub use alarm::{AlarmCodeResolver, AlarmCodeTable, Brand};
pub use analyzer::HeatPumpAnalyzer;
pub use config::AnalyzerConfig;
pub use error::AnalyticsError;
pub use series::{Point, Series, SeriesBatch};
pub use source::{MemorySource, MetricScaling, SourceError, TelemetrySource};
pub use types::{DataStatus, Outcome};
pub use window::{select_cop_window, select_window, AggregationWindow, TimeRange};

/// Crate version reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
