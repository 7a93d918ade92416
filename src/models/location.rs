use serde::{Deserialize, Serialize};

use super::ControllerData;

/// Installed firmware versions for a location's equipment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareVersion {
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub bootloader: Option<String>,
    #[serde(default)]
    pub outdoor_control: Option<String>,
}

/// A physical site on the account, with its controllers embedded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub version: Option<FirmwareVersion>,
    #[serde(default)]
    pub controllers: Vec<ControllerData>,
}

impl LocationData {
    pub fn bootloader_version(&self) -> Option<&str> {
        self.version.as_ref()?.bootloader.as_deref()
    }
}
