//! RelayConfig - top-level key → raw configuration map

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use validator::Validate;

use contracts::{ContractError, RelaySettings};

use crate::validator::validation_error;

/// Key holding the sink configuration blobs
pub const SINKS_KEY: &str = "sinks";

/// Key holding the [`RelaySettings`]
pub const RELAY_KEY: &str = "relay";

/// Loaded configuration, includes already inlined
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RelayConfig {
    keys: Map<String, Value>,
}

impl RelayConfig {
    pub fn new(keys: Map<String, Value>) -> Self {
        Self { keys }
    }

    /// True when nothing was configured (e.g. missing config file)
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Top-level keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Raw configuration of one key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keys.get(key)
    }

    /// Raw configuration of one key, failing if absent
    pub fn require(&self, key: &str) -> Result<&Value, ContractError> {
        self.get(key)
            .ok_or_else(|| ContractError::config_validation(key, "key not found"))
    }

    /// Deserialize one key into a typed section; `None` if absent
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ContractError> {
        self.get(key)
            .map(|raw| {
                T::deserialize(raw).map_err(|e| ContractError::config_validation(key, e.to_string()))
            })
            .transpose()
    }

    /// The `sinks` object (name → sink config blob)
    pub fn sinks(&self) -> Result<&Value, ContractError> {
        let sinks = self.require(SINKS_KEY)?;
        if !sinks.is_object() {
            return Err(ContractError::config_validation(
                SINKS_KEY,
                "must be an object of name -> sink config",
            ));
        }
        Ok(sinks)
    }

    /// The `relay` section, defaults when absent
    pub fn relay_settings(&self) -> Result<RelaySettings, ContractError> {
        let settings: RelaySettings = self.section(RELAY_KEY)?.unwrap_or_default();
        settings
            .validate()
            .map_err(|e| validation_error(RELAY_KEY, &e))?;
        Ok(settings)
    }
}
