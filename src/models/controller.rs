//! Thermostat controller state as reported by the cloud API.
//!
//! Field names mirror the vendor's GraphQL schema (camelCase on the
//! wire). Most numeric fields are optional: the API returns null for
//! sensors a given installation does not have.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cloud connectivity of the device's location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Online,
    Offline,
    #[default]
    Initializing,
}

/// Operating mode of the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemMode {
    #[default]
    Off,
    Auto,
    Heat,
    Cool,
    Eheat,
    Maxheat,
    Maxcool,
}

/// Fan setting. The numbered variants are minutes-per-hour duty cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanMode {
    #[default]
    Auto,
    Fifteen,
    Thirty,
    Fortyfive,
    Always,
}

/// What the system is actively doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActiveDemand {
    #[default]
    Off,
    Heat,
    Cool,
}

/// Which setpoint a change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Setpoint {
    Heat,
    Cool,
}

/// Duration of a manual schedule override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleOverride {
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "NEXT_EVENT")]
    NextEvent,
    #[serde(rename = "HOURS_01")]
    Hours01,
    #[serde(rename = "HOURS_02")]
    Hours02,
    #[serde(rename = "HOURS_03")]
    Hours03,
    #[serde(rename = "HOURS_04")]
    Hours04,
    #[serde(rename = "HOURS_05")]
    Hours05,
    #[serde(rename = "HOURS_06")]
    Hours06,
    #[serde(rename = "HOURS_07")]
    Hours07,
    #[serde(rename = "HOURS_08")]
    Hours08,
    #[serde(rename = "HOURS_09")]
    Hours09,
    #[serde(rename = "HOURS_10")]
    Hours10,
    #[serde(rename = "HOURS_11")]
    Hours11,
    #[serde(rename = "HOURS_12")]
    Hours12,
}

/// Temperature unit reported for the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    F,
    C,
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SystemMode::Off => "OFF",
            SystemMode::Auto => "AUTO",
            SystemMode::Heat => "HEAT",
            SystemMode::Cool => "COOL",
            SystemMode::Eheat => "EHEAT",
            SystemMode::Maxheat => "MAXHEAT",
            SystemMode::Maxcool => "MAXCOOL",
        };
        f.write_str(s)
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FanMode::Auto => "AUTO",
            FanMode::Fifteen => "FIFTEEN",
            FanMode::Thirty => "THIRTY",
            FanMode::Fortyfive => "FORTYFIVE",
            FanMode::Always => "ALWAYS",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ActiveDemand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActiveDemand::Off => "OFF",
            ActiveDemand::Heat => "HEAT",
            ActiveDemand::Cool => "COOL",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Online => "ONLINE",
            ConnectionStatus::Offline => "OFFLINE",
            ConnectionStatus::Initializing => "INITIALIZING",
        };
        f.write_str(s)
    }
}

/// Heat and cool targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SetpointPair {
    pub heat: f64,
    pub cool: f64,
}

/// Allowed setpoint range for a mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TempRange {
    pub min: f64,
    pub max: f64,
}

impl TempRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwayState {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub setpoints: Option<SetpointPair>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanState {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub cfm: Option<f64>,
    #[serde(default)]
    pub mode: FanMode,
    #[serde(default)]
    pub modes: Vec<FanMode>,
    #[serde(rename = "override", default)]
    pub override_active: Option<bool>,
}

/// Humidifier or dehumidifier configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HumidityControl {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// A point in the weekly schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotTime {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub fan_mode: Option<FanMode>,
    #[serde(default)]
    pub setpoints: Option<SetpointPair>,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub start: Option<SlotTime>,
    #[serde(default)]
    pub stop: Option<SlotTime>,
}

/// One day of the programmed schedule, with the four named slots plus
/// any extra events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaySchedule {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub awake: Option<ScheduleEvent>,
    #[serde(default)]
    pub leave: Option<ScheduleEvent>,
    #[serde(default)]
    pub arrive: Option<ScheduleEvent>,
    #[serde(default)]
    pub bed: Option<ScheduleEvent>,
    #[serde(default)]
    pub events: Vec<ScheduleEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRange {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneSensor {
    #[serde(default)]
    pub sensor: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Connectivity as nested under `location` in the controller payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStatus {
    #[serde(default)]
    pub connection_status: ConnectionStatus,
}

/// Full controller state from the API's controller fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub active_demand: Option<ActiveDemand>,
    #[serde(default)]
    pub active_schedule_event: Option<ScheduleEvent>,
    #[serde(default)]
    pub airflow: Option<f64>,
    #[serde(default)]
    pub airflow_test_active: Option<bool>,
    #[serde(default)]
    pub away: AwayState,
    #[serde(default)]
    pub cool_range: TempRange,
    #[serde(default)]
    pub heat_range: TempRange,
    #[serde(default)]
    pub deadband: Option<f64>,
    #[serde(default)]
    pub dehumidification: Option<HumidityControl>,
    #[serde(default)]
    pub humidification: Option<HumidityControl>,
    #[serde(default)]
    pub fan: FanState,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub indoor_temp: Option<f64>,
    #[serde(default)]
    pub outdoor_temp: Option<f64>,
    #[serde(default)]
    pub location: LocationStatus,
    #[serde(default)]
    pub mode: SystemMode,
    #[serde(default)]
    pub modes: Vec<SystemMode>,
    #[serde(default)]
    pub schedule: Vec<DaySchedule>,
    #[serde(default)]
    pub schedule_override: Option<ScheduleOverride>,
    #[serde(default)]
    pub setpoints: SetpointPair,
    #[serde(default)]
    pub temp_override: Option<f64>,
    #[serde(default)]
    pub zone: Option<i64>,
    #[serde(default)]
    pub zone_sensor: Option<ZoneSensor>,
    #[serde(default)]
    pub zoning: Option<bool>,
    #[serde(default)]
    pub humidity_notification: Option<NotificationRange>,
    #[serde(default)]
    pub temperature_notification: Option<NotificationRange>,
    #[serde(default)]
    pub access_level: Option<String>,
}

impl ControllerData {
    /// Whether the device is enabled and reachable through the cloud.
    pub fn is_online(&self) -> bool {
        !self.disabled && self.location.connection_status == ConnectionStatus::Online
    }

    /// What the system is doing right now; OFF when the API reports null.
    pub fn active_demand(&self) -> ActiveDemand {
        self.active_demand.unwrap_or(ActiveDemand::Off)
    }
}
