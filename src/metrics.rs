//! Metric names used by the analytics engine
//!
//! These are the series names the telemetry backend stores per register.

pub const POWER_CONSUMPTION: &str = "power_consumption";
pub const COMPRESSOR_STATUS: &str = "compressor_status";
pub const BRINE_PUMP_STATUS: &str = "brine_pump_status";
pub const RADIATOR_PUMP_STATUS: &str = "radiator_pump_status";
pub const SWITCH_VALVE_STATUS: &str = "switch_valve_status";
pub const ADDITIONAL_HEAT_PERCENT: &str = "additional_heat_percent";
pub const ALARM_STATUS: &str = "alarm_status";
pub const ALARM_CODE: &str = "alarm_code";
pub const OPERATING_MODE: &str = "operating_mode";
pub const EXTERNAL_CONTROL: &str = "external_control";

pub const RADIATOR_FORWARD: &str = "radiator_forward";
pub const RADIATOR_RETURN: &str = "radiator_return";
pub const BRINE_IN_EVAPORATOR: &str = "brine_in_evaporator";
pub const BRINE_OUT_CONDENSER: &str = "brine_out_condenser";
pub const HOT_WATER_TOP: &str = "hot_water_top";

/// Inputs of the COP estimate
pub const COP_METRICS: [&str; 6] = [
    RADIATOR_FORWARD,
    RADIATOR_RETURN,
    BRINE_IN_EVAPORATOR,
    BRINE_OUT_CONDENSER,
    POWER_CONSUMPTION,
    COMPRESSOR_STATUS,
];

/// Inputs of hot-water cycle detection
pub const HOT_WATER_METRICS: [&str; 3] = [SWITCH_VALVE_STATUS, HOT_WATER_TOP, POWER_CONSUMPTION];

/// Inputs of the runtime statistics
pub const RUNTIME_METRICS: [&str; 2] = [COMPRESSOR_STATUS, ADDITIONAL_HEAT_PERCENT];

/// Signals watched by the event log
pub const EVENT_METRICS: [&str; 6] = [
    COMPRESSOR_STATUS,
    BRINE_PUMP_STATUS,
    RADIATOR_PUMP_STATUS,
    SWITCH_VALVE_STATUS,
    ADDITIONAL_HEAT_PERCENT,
    ALARM_CODE,
];

/// Metrics stored as unscaled status flags, codes, or watts
pub const UNSCALED_METRICS: [&str; 9] = [
    COMPRESSOR_STATUS,
    BRINE_PUMP_STATUS,
    RADIATOR_PUMP_STATUS,
    SWITCH_VALVE_STATUS,
    ALARM_STATUS,
    ALARM_CODE,
    OPERATING_MODE,
    EXTERNAL_CONTROL,
    POWER_CONSUMPTION,
];
