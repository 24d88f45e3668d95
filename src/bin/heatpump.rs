//! heatpump-insight CLI - Command-line interface for the heat-pump analytics engine
//!
//! Commands:
//! - window: Show the aggregation window selected for a time range
//! - energy: Energy use and cost
//! - runtime: Compressor and auxiliary-heater runtime
//! - cycles: Hot-water heating cycles
//! - cop: Estimated coefficient of performance
//! - events: Recent state changes and alarms
//! - alarm: Current alarm status

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use heatpump_insight::analyzer::FINE_WINDOW;
use heatpump_insight::cycles::detect_cycles;
use heatpump_insight::metrics::{HOT_WATER_METRICS, POWER_CONSUMPTION, SWITCH_VALVE_STATUS};
use heatpump_insight::window::WindowPolicy;
use heatpump_insight::{
    AnalyticsError, AnalyzerConfig, HeatPumpAnalyzer, MemorySource, SeriesBatch, SourceError,
    TelemetrySource, TimeRange, VERSION,
};

/// Heat-pump telemetry analytics
#[derive(Parser)]
#[command(name = "heatpump-insight")]
#[command(version = VERSION)]
#[command(about = "Derive energy, runtime, cycle, COP and event insight from heat-pump telemetry", long_about = None)]
struct Cli {
    /// Config file (JSON); missing file means defaults
    #[arg(long, global = true, default_value = "heatpump-insight.json")]
    config: PathBuf,

    /// Output format
    #[arg(long, global = true, default_value = "json-pretty")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct InputArgs {
    /// NDJSON telemetry file (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Reference time for relative ranges (defaults to the newest sample)
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the aggregation window selected for a time range
    Window {
        /// Time range, e.g. 24h or 7d
        range: String,

        /// Selection policy
        #[arg(long, default_value = "batch")]
        policy: PolicyArg,
    },

    /// Energy use and cost
    Energy {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long, default_value = "24h")]
        range: String,

        /// Price per kWh (overrides config)
        #[arg(long)]
        price: Option<f64>,
    },

    /// Compressor and auxiliary-heater runtime
    Runtime {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long, default_value = "24h")]
        range: String,
    },

    /// Hot-water heating cycles
    Cycles {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long, default_value = "7d")]
        range: String,

        /// Include every detected cycle and the detection counters
        #[arg(long)]
        details: bool,
    },

    /// Estimated coefficient of performance
    Cop {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long, default_value = "24h")]
        range: String,
    },

    /// Recent state changes and alarms (last 24 hours)
    Events {
        #[command(flatten)]
        input: InputArgs,

        /// Maximum number of events
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Current alarm status
    Alarm {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Summary statistics
    Batch,
    /// COP charting
    Cop,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HeatpumpCliError> {
    let config = AnalyzerConfig::load(&cli.config)?.with_env_overrides()?;

    match cli.command {
        Commands::Window { range, policy } => cmd_window(&range, policy, &cli.format),
        Commands::Energy { input, range, price } => cmd_energy(&config, &input, &range, price, &cli.format),
        Commands::Runtime { input, range } => cmd_runtime(&config, &input, &range, &cli.format),
        Commands::Cycles {
            input,
            range,
            details,
        } => cmd_cycles(&config, &input, &range, details, &cli.format),
        Commands::Cop { input, range } => cmd_cop(&config, &input, &range, &cli.format),
        Commands::Events { input, limit } => cmd_events(&config, &input, limit, &cli.format),
        Commands::Alarm { input } => cmd_alarm(&config, &input, &cli.format),
    }
}

fn cmd_window(range: &str, policy: PolicyArg, format: &OutputFormat) -> Result<(), HeatpumpCliError> {
    let range: TimeRange = range.parse()?;
    let (name, policy) = match policy {
        PolicyArg::Batch => ("batch", WindowPolicy::Batch),
        PolicyArg::Cop => ("cop", WindowPolicy::Cop),
    };

    let report = WindowReport {
        range: range.to_string(),
        policy: name,
        window: policy.select(range).to_string(),
    };
    print_json(&report, format)
}

fn cmd_energy(
    config: &AnalyzerConfig,
    input: &InputArgs,
    range: &str,
    price: Option<f64>,
    format: &OutputFormat,
) -> Result<(), HeatpumpCliError> {
    let range: TimeRange = range.parse()?;
    let mut config = config.clone();
    if let Some(price) = price {
        config.price_per_kwh = price;
        config.validate()?;
    }

    let analyzer = open_analyzer(&config, input)?;
    let outcome = analyzer.energy_costs(range)?;
    print_json(&outcome.map(|v| v.rounded()), format)
}

fn cmd_runtime(
    config: &AnalyzerConfig,
    input: &InputArgs,
    range: &str,
    format: &OutputFormat,
) -> Result<(), HeatpumpCliError> {
    let range: TimeRange = range.parse()?;
    let analyzer = open_analyzer(config, input)?;
    let outcome = analyzer.runtime_stats(range)?;
    print_json(&outcome.map(|v| v.rounded()), format)
}

fn cmd_cycles(
    config: &AnalyzerConfig,
    input: &InputArgs,
    range: &str,
    details: bool,
    format: &OutputFormat,
) -> Result<(), HeatpumpCliError> {
    let range: TimeRange = range.parse()?;
    let analyzer = open_analyzer(config, input)?;

    if !details {
        let outcome = analyzer.hot_water_cycles(range)?;
        return print_json(&outcome.map(|v| v.rounded()), format);
    }

    let batch = SeriesBatch::new(
        analyzer
            .source()
            .query(&HOT_WATER_METRICS, range, Some(FINE_WINDOW))?,
    );
    let summary = analyzer.hot_water_cycles_from_batch(&batch);
    let detection = detect_cycles(
        &batch.series_or_empty(SWITCH_VALVE_STATUS),
        &batch.series_or_empty(POWER_CONSUMPTION),
    );

    print_json(
        &serde_json::json!({
            "summary": summary.map(|v| v.rounded()),
            "detection": detection,
        }),
        format,
    )
}

fn cmd_cop(
    config: &AnalyzerConfig,
    input: &InputArgs,
    range: &str,
    format: &OutputFormat,
) -> Result<(), HeatpumpCliError> {
    let range: TimeRange = range.parse()?;
    let analyzer = open_analyzer(config, input)?;
    let outcome = analyzer.cop(range)?;

    let report = CopReport {
        mean_cop: outcome.value.mean_cop(),
        status: outcome.status,
        points: outcome.value.points,
    };
    print_json(&report, format)
}

fn cmd_events(
    config: &AnalyzerConfig,
    input: &InputArgs,
    limit: usize,
    format: &OutputFormat,
) -> Result<(), HeatpumpCliError> {
    let analyzer = open_analyzer(config, input)?;
    let events = analyzer.event_log(limit)?;
    print_json(&events, format)
}

fn cmd_alarm(
    config: &AnalyzerConfig,
    input: &InputArgs,
    format: &OutputFormat,
) -> Result<(), HeatpumpCliError> {
    let analyzer = open_analyzer(config, input)?;
    let status = analyzer.alarm_status()?;
    print_json(&status, format)
}

// Helper functions

fn open_analyzer(
    config: &AnalyzerConfig,
    input: &InputArgs,
) -> Result<HeatPumpAnalyzer<MemorySource>, HeatpumpCliError> {
    let mut source = load_source(&input.input, config)?;
    if let Some(now) = input.now {
        source = source.with_now(now);
    }
    Ok(HeatPumpAnalyzer::from_config(source, config))
}

fn load_source(input: &Path, config: &AnalyzerConfig) -> Result<MemorySource, HeatpumpCliError> {
    let source = if input.to_string_lossy() == "-" {
        MemorySource::from_ndjson(io::stdin().lock(), &config.scaling)?
    } else {
        let file = File::open(input)?;
        MemorySource::from_ndjson(BufReader::new(file), &config.scaling)?
    };
    Ok(source)
}

fn print_json<T: Serialize>(value: &T, format: &OutputFormat) -> Result<(), HeatpumpCliError> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    println!("{}", output);
    Ok(())
}

// Error types

#[derive(Debug)]
enum HeatpumpCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Analytics(AnalyticsError),
}

impl From<io::Error> for HeatpumpCliError {
    fn from(e: io::Error) -> Self {
        HeatpumpCliError::Io(e)
    }
}

impl From<serde_json::Error> for HeatpumpCliError {
    fn from(e: serde_json::Error) -> Self {
        HeatpumpCliError::Json(e)
    }
}

impl From<AnalyticsError> for HeatpumpCliError {
    fn from(e: AnalyticsError) -> Self {
        HeatpumpCliError::Analytics(e)
    }
}

impl From<SourceError> for HeatpumpCliError {
    fn from(e: SourceError) -> Self {
        HeatpumpCliError::Analytics(AnalyticsError::from(e))
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HeatpumpCliError> for CliError {
    fn from(e: HeatpumpCliError) -> Self {
        match e {
            HeatpumpCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HeatpumpCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            HeatpumpCliError::Analytics(e) => {
                let (code, hint) = match &e {
                    AnalyticsError::InvalidRangeFormat(_) => {
                        ("INVALID_RANGE", "Use a whole number of hours or days, e.g. 24h or 7d")
                    }
                    AnalyticsError::UpstreamQueryFailure(SourceError::Malformed { .. }) => {
                        ("MALFORMED_INPUT", "Each line must be a JSON sample with name, time and value")
                    }
                    AnalyticsError::UpstreamQueryFailure(_) => {
                        ("UPSTREAM_ERROR", "Check that the telemetry input is readable")
                    }
                    AnalyticsError::JsonError(_) | AnalyticsError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Check the config file and HEATPUMP_* environment variables")
                    }
                    AnalyticsError::UnsupportedBrand(_) => {
                        ("UNSUPPORTED_BRAND", "Supported brands: thermia, ivt")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
        }
    }
}

// Report types

#[derive(Serialize)]
struct WindowReport {
    range: String,
    policy: &'static str,
    window: String,
}

#[derive(Serialize)]
struct CopReport {
    status: heatpump_insight::DataStatus,
    mean_cop: Option<f64>,
    points: Vec<heatpump_insight::types::CopPoint>,
}
