//! Data models for Hx 3 thermostat entities.
//!
//! This module contains the data structures returned by the cloud API:
//!
//! - `ControllerData`: the full per-thermostat state snapshot
//! - `LocationData`: a site with its embedded controllers
//! - Mode enums: `SystemMode`, `FanMode`, `ActiveDemand`, etc.

pub mod controller;
pub mod location;

pub use controller::{
    ActiveDemand, AwayState, ConnectionStatus, ControllerData, DaySchedule, FanMode, FanState,
    HumidityControl, NotificationRange, ScheduleEvent, ScheduleOverride, Setpoint, SetpointPair,
    SlotTime, SystemMode, TempRange, TemperatureUnit, ZoneSensor,
};
pub use location::{FirmwareVersion, LocationData};
