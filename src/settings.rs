//! Serde model of the configuration file.
//!
//! ```json
//! {
//!   "connections": { "main": { "type": "sqlite", "value": "Data Source=app.db" } },
//!   "dbConfigurationProviders": { "settings": { "connection": "main", "table": "settings" } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SqlClientError;

/// Default key/value table read by a configuration provider.
pub const DEFAULT_SETTINGS_TABLE: &str = "settings";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub connections: HashMap<String, ConnectionEntry>,
    #[serde(default, rename = "dbConfigurationProviders")]
    pub configuration_providers: HashMap<String, DbConfigurationProviderEntry>,
}

/// A named connection: provider type name plus connection string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    #[serde(rename = "type", default)]
    pub provider_type: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// A named configuration provider reading `table` through `connection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfigurationProviderEntry {
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_SETTINGS_TABLE.to_string()
}

impl AppSettings {
    /// # Errors
    /// Returns `SqlClientError::Json` if the text is not a valid settings document.
    pub fn from_json_str(json: &str) -> Result<Self, SqlClientError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// I/O failures reading the file, or invalid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SqlClientError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Provider type and connection string of connection `name`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the entry or either of its keys is missing.
    pub fn connection(&self, name: &str) -> Result<(&str, &str), SqlClientError> {
        let entry = self.connections.get(name).ok_or_else(|| {
            SqlClientError::ConfigError(format!("no connection named '{name}' is configured"))
        })?;
        let provider_type = entry.provider_type.as_deref().ok_or_else(|| {
            SqlClientError::ConfigError(format!("connection '{name}' is missing 'type'"))
        })?;
        let value = entry.value.as_deref().ok_or_else(|| {
            SqlClientError::ConfigError(format!("connection '{name}' is missing 'value'"))
        })?;
        Ok((provider_type, value))
    }

    /// # Errors
    /// Returns `ConfigError` if no configuration provider is named `name`.
    pub fn configuration_provider(
        &self,
        name: &str,
    ) -> Result<&DbConfigurationProviderEntry, SqlClientError> {
        self.configuration_providers.get(name).ok_or_else(|| {
            SqlClientError::ConfigError(format!(
                "no configuration provider named '{name}' is configured"
            ))
        })
    }
}
