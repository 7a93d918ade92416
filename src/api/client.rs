//! High-level client for the Hx cloud API.
//!
//! `Hx3Client` pairs the GraphQL transport with the token lifecycle
//! manager: every data call gets a fresh bearer token first, and a stale
//! token reported by the server triggers exactly one refresh-and-replay
//! before the error surfaces.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::error::{ApiError, AuthError};
use crate::api::transport::GraphqlTransport;
use crate::auth::{Credential, SessionData, TokenManager};
use crate::models::{
    ControllerData, FanMode, FirmwareVersion, LocationData, Setpoint, SystemMode, TemperatureUnit,
};

/// Fields requested for every controller. Matches the vendor schema.
const CONTROLLER_FRAGMENT: &str = "\
{
  id
  activeDemand
  activeScheduleEvent {
    day
    fanMode
    setpoints { heat cool }
    slot
    start { day hour minute }
    stop { day hour minute }
  }
  airflow
  airflowTestActive
  away {
    active
    setpoints { heat cool }
  }
  coolRange { min max }
  deadband
  dehumidification { max min mode value }
  disabled
  fan { active cfm mode modes override }
  heatRange { min max }
  humidification { max min mode value }
  humidity
  indoorTemp
  location { connectionStatus }
  mode
  modes
  name
  outdoorTemp
  schedule {
    day
    awake { day fanMode setpoints { heat cool } slot start { day hour minute } stop { day hour minute } }
    leave { day fanMode setpoints { heat cool } slot start { day hour minute } stop { day hour minute } }
    arrive { day fanMode setpoints { heat cool } slot start { day hour minute } stop { day hour minute } }
    bed { day fanMode setpoints { heat cool } slot start { day hour minute } stop { day hour minute } }
    events { day fanMode setpoints { heat cool } slot start { day hour minute } stop { day hour minute } }
  }
  scheduleOverride
  setpoints { heat cool }
  tempOverride
  zone
  zoneSensor { sensor version }
  zoning
  humidityNotification { enabled min max }
  temperatureNotification { enabled min max }
  accessLevel
}";

const ME_QUERY: &str = "\
{
  me {
    temperatureUnit
  }
}";

pub struct Hx3Client {
    transport: Arc<GraphqlTransport>,
    manager: TokenManager<Arc<GraphqlTransport>>,
}

impl Hx3Client {
    /// Build a client for an account. A previously persisted session may
    /// be resumed; otherwise the one-time share code is exchanged on the
    /// first authenticated call.
    pub fn new(credential: Credential, session: Option<SessionData>) -> Result<Self, ApiError> {
        let transport = Arc::new(GraphqlTransport::new()?);
        let manager = match session {
            Some(session) => {
                TokenManager::with_session(Arc::clone(&transport), credential, session)
            }
            None => TokenManager::new(Arc::clone(&transport), credential),
        };
        Ok(Self { transport, manager })
    }

    pub fn manager(&self) -> &TokenManager<Arc<GraphqlTransport>> {
        &self.manager
    }

    /// Establish (or resume) the session up front, so callers learn about
    /// a bad credential before their first data call.
    pub async fn connect(&self) -> Result<SessionData, AuthError> {
        let session = self.manager.ensure_session().await?;
        info!(
            valid_for_secs = session.seconds_until_expiry(Utc::now()),
            "connected to Hx cloud"
        );
        Ok(session)
    }

    /// Run an authenticated query. If the server rejects the access token
    /// anyway, refresh once and replay once.
    async fn execute_authed(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        let token = self.manager.access_token().await?;
        match self
            .transport
            .execute(Some(&token), query, variables.clone())
            .await
        {
            Err(ApiError::Unauthorized) => {
                warn!("access token rejected mid-session, refreshing once");
                let token = self.manager.refresh().await?.access_token;
                self.transport.execute(Some(&token), query, variables).await
            }
            other => other,
        }
    }

    /// The account's temperature unit.
    pub async fn temperature_unit(&self) -> Result<Option<TemperatureUnit>, ApiError> {
        let data = self.execute_authed(ME_QUERY, json!({})).await?;
        let unit = data["me"]
            .get("temperatureUnit")
            .filter(|v| !v.is_null())
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ApiError::InvalidResponse(format!("bad temperatureUnit: {}", e)))?;
        Ok(unit)
    }

    /// All locations on the account, with their controllers embedded.
    pub async fn locations(&self) -> Result<Vec<LocationData>, ApiError> {
        let query = format!(
            "{{
  locations {{
    id
    brand
    lat
    lng
    model
    name
    controllers {}
    version {{
      application
      bootloader
      outdoorControl
    }}
  }}
}}",
            CONTROLLER_FRAGMENT
        );
        let data = self.execute_authed(&query, json!({})).await?;
        serde_json::from_value(data["locations"].clone())
            .map_err(|e| ApiError::InvalidResponse(format!("bad locations payload: {}", e)))
    }

    /// Current state of one controller.
    pub async fn controller_data(&self, controller_id: &str) -> Result<ControllerData, ApiError> {
        let query = format!(
            "query controller($id: ID!) {{\n  controller(id: $id) {}\n}}",
            CONTROLLER_FRAGMENT
        );
        let data = self
            .execute_authed(&query, json!({"id": controller_id}))
            .await?;
        if data["controller"].is_null() {
            return Err(ApiError::NotFound(format!(
                "API reported failure to query device {}",
                controller_id
            )));
        }
        serde_json::from_value(data["controller"].clone())
            .map_err(|e| ApiError::InvalidResponse(format!("bad controller payload: {}", e)))
    }

    /// Discover the account: build live handles for every location and
    /// controller from the state embedded in the locations query.
    pub async fn discover(self: &Arc<Self>) -> Result<Vec<Location>, ApiError> {
        let mut locations = Vec::new();
        for data in self.locations().await? {
            debug!(location = %data.id, controllers = data.controllers.len(), "discovered location");
            locations.push(Location::from_data(Arc::clone(self), data));
        }
        Ok(locations)
    }

    /// Run one of the vendor's change mutations. The error fragments come
    /// from the schema per operation; a returned message means rejection.
    async fn mutate(
        &self,
        func: &str,
        input_type: &str,
        input: Value,
        error_types: &[&str],
    ) -> Result<(), ApiError> {
        let mutation = build_mutation(func, input_type, error_types);
        let data = self.execute_authed(&mutation, json!({"input": input})).await?;
        let payload = &data[func];
        if let Some(message) = payload.get("message").and_then(|m| m.as_str()) {
            let typename = payload
                .get("__typename")
                .and_then(|t| t.as_str())
                .unwrap_or("");
            warn!(func, typename, message, "mutation rejected");
            return Err(mutation_error(typename, message));
        }
        Ok(())
    }

    pub async fn change_mode(&self, id: &str, mode: SystemMode) -> Result<(), ApiError> {
        self.mutate(
            "changeMode",
            "ChangeModeInput!",
            json!({"id": id, "mode": mode}),
            &["NotFound"],
        )
        .await
    }

    pub async fn change_fan_mode(&self, id: &str, mode: FanMode) -> Result<(), ApiError> {
        self.mutate(
            "changeFanMode",
            "ChangeFanModeInput!",
            json!({"id": id, "mode": mode}),
            &["NotFound", "NotSupported"],
        )
        .await
    }

    pub async fn change_setpoint(
        &self,
        id: &str,
        setpoint: Setpoint,
        value: f64,
    ) -> Result<(), ApiError> {
        self.mutate(
            "changeSetpoint",
            "ChangeSetpointInput!",
            json!({"id": id, "setpoint": setpoint, "value": value}),
            &["NotFound", "AwayModeActive", "VacationModeActive"],
        )
        .await
    }

    pub async fn change_away(&self, id: &str, active: bool) -> Result<(), ApiError> {
        self.mutate(
            "changeAway",
            "ChangeAwayInput!",
            json!({"id": id, "active": active}),
            &["NotFound"],
        )
        .await
    }
}

fn build_mutation(func: &str, input_type: &str, error_types: &[&str]) -> String {
    let fragments = error_types
        .iter()
        .map(|e| format!("... on {} {{ __typename message }}", e))
        .collect::<Vec<_>>()
        .join("\n    ");
    format!(
        "mutation {func}($input: {input_type}) {{\n  {func}(input: $input) {{\n    {fragments}\n  }}\n}}",
        func = func,
        input_type = input_type,
        fragments = fragments
    )
}

fn mutation_error(typename: &str, message: &str) -> ApiError {
    match typename {
        "NotFound" => ApiError::NotFound(message.to_string()),
        "NotSupported" => ApiError::NotSupported(message.to_string()),
        "AwayModeActive" | "VacationModeActive" => ApiError::ModeLocked(message.to_string()),
        _ => ApiError::Api(message.to_string()),
    }
}

/// A physical site with live controller handles.
pub struct Location {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub version: Option<FirmwareVersion>,
    pub controllers: Vec<Controller>,
}

impl Location {
    fn from_data(client: Arc<Hx3Client>, data: LocationData) -> Self {
        let controllers = data
            .controllers
            .into_iter()
            .map(|c| Controller::new(Arc::clone(&client), c))
            .collect();
        Self {
            id: data.id,
            name: data.name,
            brand: data.brand,
            model: data.model,
            version: data.version,
            controllers,
        }
    }

    pub fn controller_by_id(&self, id: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.id() == id)
    }
}

/// Live handle on one thermostat.
///
/// Holds the last fetched state snapshot; setters validate against the
/// advertised ranges and mode lists before calling the API, and update
/// the snapshot on success.
pub struct Controller {
    client: Arc<Hx3Client>,
    data: ControllerData,
    last_refresh: Option<DateTime<Utc>>,
}

impl Controller {
    pub fn new(client: Arc<Hx3Client>, data: ControllerData) -> Self {
        Self {
            client,
            data,
            last_refresh: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    /// The user-set name of this device
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Whether the device is enabled and reachable
    pub fn is_alive(&self) -> bool {
        self.data.is_online()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// The last fetched state snapshot
    pub fn data(&self) -> &ControllerData {
        &self.data
    }

    /// Re-fetch this device's state from the cloud.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        self.data = self.client.controller_data(&self.data.id).await?;
        self.last_refresh = Some(Utc::now());
        Ok(())
    }

    pub fn system_mode(&self) -> SystemMode {
        self.data.mode
    }

    pub async fn set_system_mode(&mut self, mode: SystemMode) -> Result<(), ApiError> {
        if !self.data.modes.contains(&mode) {
            return Err(ApiError::NotSupported(format!(
                "system mode {} not offered by device",
                mode
            )));
        }
        if self.data.mode == mode {
            return Ok(());
        }
        self.client.change_mode(&self.data.id, mode).await?;
        self.data.mode = mode;
        Ok(())
    }

    pub fn fan_mode(&self) -> FanMode {
        self.data.fan.mode
    }

    pub async fn set_fan_mode(&mut self, mode: FanMode) -> Result<(), ApiError> {
        if !self.data.fan.modes.contains(&mode) {
            return Err(ApiError::NotSupported(format!(
                "fan mode {} not offered by device",
                mode
            )));
        }
        if self.data.fan.mode == mode {
            return Ok(());
        }
        self.client.change_fan_mode(&self.data.id, mode).await?;
        self.data.fan.mode = mode;
        Ok(())
    }

    pub fn setpoint_heat(&self) -> f64 {
        self.data.setpoints.heat
    }

    pub async fn set_setpoint_heat(&mut self, temp: f64) -> Result<(), ApiError> {
        let range = self.data.heat_range;
        if !range.contains(temp) {
            return Err(ApiError::NotSupported(format!(
                "setpoint {} outside range {}-{}",
                temp, range.min, range.max
            )));
        }
        self.client
            .change_setpoint(&self.data.id, Setpoint::Heat, temp)
            .await?;
        self.data.setpoints.heat = temp;
        Ok(())
    }

    pub fn setpoint_cool(&self) -> f64 {
        self.data.setpoints.cool
    }

    pub async fn set_setpoint_cool(&mut self, temp: f64) -> Result<(), ApiError> {
        let range = self.data.cool_range;
        if !range.contains(temp) {
            return Err(ApiError::NotSupported(format!(
                "setpoint {} outside range {}-{}",
                temp, range.min, range.max
            )));
        }
        self.client
            .change_setpoint(&self.data.id, Setpoint::Cool, temp)
            .await?;
        self.data.setpoints.cool = temp;
        Ok(())
    }

    pub fn away(&self) -> bool {
        self.data.away.active
    }

    pub async fn set_away(&mut self, active: bool) -> Result<(), ApiError> {
        if self.data.away.active == active {
            return Ok(());
        }
        self.client.change_away(&self.data.id, active).await?;
        self.data.away.active = active;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_mutation_shape() {
        let mutation = build_mutation(
            "changeSetpoint",
            "ChangeSetpointInput!",
            &["NotFound", "AwayModeActive"],
        );
        assert!(mutation.starts_with("mutation changeSetpoint($input: ChangeSetpointInput!)"));
        assert!(mutation.contains("changeSetpoint(input: $input)"));
        assert!(mutation.contains("... on NotFound { __typename message }"));
        assert!(mutation.contains("... on AwayModeActive { __typename message }"));
    }

    #[test]
    fn test_mutation_error_mapping() {
        assert!(matches!(
            mutation_error("NotFound", "no such device"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            mutation_error("NotSupported", "no such fan mode"),
            ApiError::NotSupported(_)
        ));
        assert!(matches!(
            mutation_error("AwayModeActive", "away"),
            ApiError::ModeLocked(_)
        ));
        assert!(matches!(
            mutation_error("VacationModeActive", "vacation"),
            ApiError::ModeLocked(_)
        ));
        assert!(matches!(mutation_error("", "other"), ApiError::Api(_)));
    }

    #[test]
    fn test_controller_fragment_covers_core_fields() {
        for field in [
            "indoorTemp",
            "outdoorTemp",
            "humidity",
            "setpoints",
            "heatRange",
            "coolRange",
            "connectionStatus",
            "scheduleOverride",
        ] {
            assert!(
                CONTROLLER_FRAGMENT.contains(field),
                "fragment missing {}",
                field
            );
        }
    }
}
