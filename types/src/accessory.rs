//! Host-facing description of a switch.

use serde::{Deserialize, Serialize};

use crate::{Characteristic, ServiceKind, SwitchName};

/// Information block announced alongside each switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_revision: String,
}

impl Default for AccessoryInfo {
    fn default() -> Self {
        Self {
            manufacturer: "Toggle".to_string(),
            model: "Toggle Button".to_string(),
            serial_number: "TBW01".to_string(),
            firmware_revision: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Pure data export of a switch for the host to surface to its clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Representation {
    pub name: SwitchName,
    pub kind: ServiceKind,
    pub service_type: &'static str,
    pub characteristic: Characteristic,
    pub info: AccessoryInfo,
}

impl Representation {
    #[must_use]
    pub fn new(name: SwitchName, kind: ServiceKind, info: AccessoryInfo) -> Self {
        Self {
            name,
            kind,
            service_type: kind.service_type(),
            characteristic: kind.characteristic(),
            info,
        }
    }
}
