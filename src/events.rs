//! Event log generation
//!
//! Every watched signal is scanned once in time order and each reading is
//! compared with its predecessor. The resulting transitions from all signals
//! are merged newest-first.

use tracing::debug;

use crate::alarm::AlarmCodeResolver;
use crate::metrics::{
    ADDITIONAL_HEAT_PERCENT, ALARM_CODE, BRINE_PUMP_STATUS, COMPRESSOR_STATUS,
    RADIATOR_PUMP_STATUS, SWITCH_VALVE_STATUS,
};
use crate::series::{Point, Series, SeriesBatch};
use crate::types::{EventCategory, EventRecord, Severity};

/// Aux-heat steps larger than this many percentage points are reported
pub const AUX_HEAT_STEP_PERCENT: f64 = 10.0;

/// How a watched signal's transitions are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// On/off component reported by name
    Switch {
        label: &'static str,
        category: EventCategory,
    },
    AuxHeat,
    HotWaterValve,
    AlarmCode,
}

impl SignalKind {
    /// Kind of a known metric, `None` for metrics the event log ignores
    pub fn for_metric(metric: &str) -> Option<Self> {
        let kind = match metric {
            COMPRESSOR_STATUS => SignalKind::Switch {
                label: "Compressor",
                category: EventCategory::Compressor,
            },
            BRINE_PUMP_STATUS => SignalKind::Switch {
                label: "Brine pump",
                category: EventCategory::BrinePump,
            },
            RADIATOR_PUMP_STATUS => SignalKind::Switch {
                label: "Radiator pump",
                category: EventCategory::RadiatorPump,
            },
            ADDITIONAL_HEAT_PERCENT => SignalKind::AuxHeat,
            SWITCH_VALVE_STATUS => SignalKind::HotWaterValve,
            ALARM_CODE => SignalKind::AlarmCode,
            _ => return None,
        };
        Some(kind)
    }
}

fn event(at: &Point, description: String, severity: Severity, category: EventCategory) -> EventRecord {
    EventRecord {
        time: at.time,
        description,
        severity,
        category,
    }
}

fn transition(
    kind: SignalKind,
    previous: f64,
    current: &Point,
    resolver: &dyn AlarmCodeResolver,
) -> Option<EventRecord> {
    let value = current.value;

    match kind {
        SignalKind::Switch { label, category } => {
            if value > 0.0 && previous == 0.0 {
                Some(event(current, format!("{label} turned ON"), Severity::Info, category))
            } else if value == 0.0 && previous > 0.0 {
                Some(event(current, format!("{label} turned OFF"), Severity::Info, category))
            } else {
                None
            }
        }
        SignalKind::AuxHeat => {
            let percent = value.trunc() as i64;
            if value > 0.0 && previous == 0.0 {
                Some(event(
                    current,
                    format!("Aux heat turned ON ({percent}%)"),
                    Severity::Warning,
                    EventCategory::AuxHeat,
                ))
            } else if value == 0.0 && previous > 0.0 {
                Some(event(
                    current,
                    "Aux heat turned OFF".to_string(),
                    Severity::Info,
                    EventCategory::AuxHeat,
                ))
            } else if value > 0.0 && previous > 0.0 && (value - previous).abs() > AUX_HEAT_STEP_PERCENT {
                Some(event(
                    current,
                    format!("Aux heat changed to {percent}%"),
                    Severity::Warning,
                    EventCategory::AuxHeat,
                ))
            } else {
                None
            }
        }
        SignalKind::HotWaterValve => {
            if value == 1.0 && previous == 0.0 {
                Some(event(
                    current,
                    "Hot water cycle start".to_string(),
                    Severity::Info,
                    EventCategory::HotWater,
                ))
            } else if value == 0.0 && previous == 1.0 {
                Some(event(
                    current,
                    "Hot water cycle stop".to_string(),
                    Severity::Info,
                    EventCategory::HotWater,
                ))
            } else {
                None
            }
        }
        SignalKind::AlarmCode => {
            if value > 0.0 && previous == 0.0 {
                let description = resolver.decode(value.trunc() as i64);
                Some(event(
                    current,
                    format!("Alarm: {description}"),
                    Severity::Danger,
                    EventCategory::Alarm,
                ))
            } else if value == 0.0 && previous > 0.0 {
                Some(event(
                    current,
                    "Alarm cleared".to_string(),
                    Severity::Success,
                    EventCategory::Alarm,
                ))
            } else {
                None
            }
        }
    }
}

/// Transitions of one signal, oldest first
pub fn detect_transitions(
    kind: SignalKind,
    series: &Series,
    resolver: &dyn AlarmCodeResolver,
) -> Vec<EventRecord> {
    series
        .points()
        .windows(2)
        .filter_map(|pair| transition(kind, pair[0].value, &pair[1], resolver))
        .collect()
}

/// Newest `limit` events across every watched signal in `batch`.
///
/// Events sharing a timestamp keep the order of their signals' metric names.
pub fn build_event_log(
    batch: &SeriesBatch,
    resolver: &dyn AlarmCodeResolver,
    limit: usize,
) -> Vec<EventRecord> {
    let mut events = Vec::new();

    for series in batch.iter() {
        let Some(kind) = SignalKind::for_metric(series.metric()) else {
            continue;
        };
        let detected = detect_transitions(kind, series, resolver);
        debug!(
            metric = series.metric(),
            samples = series.len(),
            changes = detected.len(),
            "signal scanned"
        );
        events.extend(detected);
    }

    let total = events.len();
    events.sort_by(|a, b| b.time.cmp(&a.time));
    events.truncate(limit);

    debug!(total, returned = events.len(), "event log built");
    events
}
