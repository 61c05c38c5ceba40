//! The composition root: named client factories and configuration providers.

use std::collections::HashMap;

use crate::client::DbClient;
use crate::config_provider::DbConfigurationProvider;
use crate::error::SqlClientError;
use crate::factory::{ClientSettings, DbClientFactory, ProviderRegistry};
use crate::settings::AppSettings;

/// Owns every registration made at startup.
///
/// Names are unique per kind: registering a second client or configuration
/// provider under a taken name fails and leaves the first one in place.
/// Dropping the value drops all registrations.
#[derive(Debug, Default)]
pub struct DbServices {
    registry: ProviderRegistry,
    clients: HashMap<String, DbClientFactory>,
    configuration_providers: HashMap<String, DbConfigurationProvider>,
}

impl DbServices {
    /// Services resolving provider names through the built-in registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(ProviderRegistry::with_builtin())
    }

    #[must_use]
    pub fn with_registry(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            clients: HashMap::new(),
            configuration_providers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.registry
    }

    /// Register a client factory for connection `name`.
    ///
    /// # Errors
    /// Returns `DuplicateRegistration` if `name` is already registered.
    pub fn add_db_client(
        &mut self,
        name: &str,
        settings: ClientSettings,
    ) -> Result<&DbClientFactory, SqlClientError> {
        if self.clients.contains_key(name) {
            return Err(SqlClientError::DuplicateRegistration {
                kind: "connection",
                name: name.to_string(),
            });
        }
        tracing::debug!("registering connection {}", name);
        Ok(self
            .clients
            .entry(name.to_string())
            .or_insert(DbClientFactory::new(settings)))
    }

    /// Register connection `name` as described under `connections` in `settings`.
    ///
    /// # Errors
    /// `DuplicateRegistration`, `ConfigError` for a missing entry or key, or
    /// `UnknownProvider` for an unregistered provider type.
    pub fn add_db_client_from_settings(
        &mut self,
        name: &str,
        settings: &AppSettings,
    ) -> Result<&DbClientFactory, SqlClientError> {
        if self.clients.contains_key(name) {
            return Err(SqlClientError::DuplicateRegistration {
                kind: "connection",
                name: name.to_string(),
            });
        }
        let (provider_type, connection_string) = settings.connection(name)?;
        let provider = self.registry.resolve(provider_type)?;
        self.add_db_client(name, ClientSettings::new(provider, connection_string))
    }

    /// Register configuration provider `name` as described under
    /// `dbConfigurationProviders` in `settings`. Its connection must already
    /// be registered. The provider is returned unloaded.
    ///
    /// # Errors
    /// `DuplicateRegistration`, or `ConfigError` for a missing entry, a missing
    /// `connection` key, or an unregistered connection.
    pub fn add_db_configuration_provider(
        &mut self,
        name: &str,
        settings: &AppSettings,
    ) -> Result<DbConfigurationProvider, SqlClientError> {
        if self.configuration_providers.contains_key(name) {
            return Err(SqlClientError::DuplicateRegistration {
                kind: "configuration provider",
                name: name.to_string(),
            });
        }
        let entry = settings.configuration_provider(name)?;
        let connection = entry.connection.as_deref().ok_or_else(|| {
            SqlClientError::ConfigError(format!(
                "configuration provider '{name}' is missing 'connection'"
            ))
        })?;
        let factory = self.clients.get(connection).ok_or_else(|| {
            SqlClientError::ConfigError(format!(
                "configuration provider '{name}' uses unregistered connection '{connection}'"
            ))
        })?;
        let provider =
            DbConfigurationProvider::new(factory.clone(), entry.schema.clone(), entry.table.clone());
        self.configuration_providers
            .insert(name.to_string(), provider.clone());
        Ok(provider)
    }

    #[must_use]
    pub fn client_factory(&self, name: &str) -> Option<&DbClientFactory> {
        self.clients.get(name)
    }

    /// A new client for connection `name`.
    ///
    /// # Errors
    /// `ConfigError` if `name` is not registered, or the provider's error.
    pub fn create_client(&self, name: &str) -> Result<DbClient, SqlClientError> {
        self.client_factory(name)
            .ok_or_else(|| SqlClientError::ConfigError(format!("no connection named '{name}' is registered")))?
            .create_client()
    }

    #[must_use]
    pub fn configuration_provider(&self, name: &str) -> Option<&DbConfigurationProvider> {
        self.configuration_providers.get(name)
    }
}
