//! Server settings sent by the client in `initializationOptions`

use log::warn;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Answer reference requests on handler functions
    pub handler_references: bool,
    /// Offer integration/business event publishers for `On...` names
    pub event_publishers: bool,
    /// Generated procedures raise a "not implemented" error instead of an empty body
    pub not_implemented_body: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handler_references: true,
            event_publishers: true,
            not_implemented_body: true,
        }
    }
}

impl ServerConfig {
    /// Read the settings, keeping defaults for anything missing or malformed
    pub fn from_initialization_options(options: Option<&Value>) -> Self {
        let Some(options) = options.filter(|o| !o.is_null()) else {
            return Self::default();
        };
        match serde_json::from_value(options.clone()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring invalid initializationOptions: {}", e);
                Self::default()
            }
        }
    }
}
