//! Building clients from settings, and resolving providers by type name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;

use crate::client::DbClient;
use crate::error::SqlClientError;
use crate::provider::ProviderFactory;
use crate::types::ProviderKind;

impl ProviderKind {
    /// Shared factory for this built-in provider.
    #[must_use]
    pub fn factory(self) -> Arc<dyn ProviderFactory> {
        match self {
            #[cfg(feature = "sqlite")]
            ProviderKind::Sqlite => Arc::new(crate::sqlite::SqliteProviderFactory),
            #[cfg(feature = "mssql")]
            ProviderKind::Mssql => Arc::new(crate::mssql::MssqlProviderFactory),
        }
    }
}

/// Provider factories keyed by type name (case-insensitive).
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every compiled-in provider under its names and aliases
    /// (`sqlite`/`rusqlite`, `mssql`/`sqlserver`/`tiberius`).
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for kind in ProviderKind::value_variants() {
            let Some(value) = kind.to_possible_value() else {
                continue;
            };
            let factory = kind.factory();
            for name in value.get_name_and_aliases() {
                registry
                    .factories
                    .insert(name.to_ascii_lowercase(), Arc::clone(&factory));
            }
        }
        registry
    }

    /// Register `factory` under `name`.
    ///
    /// # Errors
    /// Returns `DuplicateRegistration` if the name is taken; the existing
    /// entry is kept.
    pub fn register(
        &mut self,
        name: &str,
        factory: Arc<dyn ProviderFactory>,
    ) -> Result<(), SqlClientError> {
        let key = name.to_ascii_lowercase();
        if self.factories.contains_key(&key) {
            return Err(SqlClientError::DuplicateRegistration {
                kind: "provider",
                name: name.to_string(),
            });
        }
        self.factories.insert(key, factory);
        Ok(())
    }

    /// # Errors
    /// Returns `UnknownProvider` if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderFactory>, SqlClientError> {
        self.factories
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| SqlClientError::UnknownProvider(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ProviderRegistry")
            .field("names", &names)
            .finish()
    }
}

/// Everything needed to build a [`DbClient`].
#[derive(Clone)]
pub struct ClientSettings {
    pub connection_string: String,
    pub provider: Arc<dyn ProviderFactory>,
    pub owns_connection: bool,
}

impl ClientSettings {
    /// Settings for a client that owns its connection.
    #[must_use]
    pub fn new(provider: Arc<dyn ProviderFactory>, connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            provider,
            owns_connection: true,
        }
    }

    #[must_use]
    pub fn with_owns_connection(mut self, owns_connection: bool) -> Self {
        self.owns_connection = owns_connection;
        self
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field(
                "connection_string",
                &self.provider.redact_connection_string(&self.connection_string),
            )
            .field("provider", &self.provider.name())
            .field("owns_connection", &self.owns_connection)
            .finish()
    }
}

/// Builds clients for one named connection.
#[derive(Debug, Clone)]
pub struct DbClientFactory {
    settings: ClientSettings,
}

impl DbClientFactory {
    #[must_use]
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// A new client with its own (closed) connection.
    ///
    /// # Errors
    /// Returns the provider's error if it rejects the connection string.
    pub fn create_client(&self) -> Result<DbClient, SqlClientError> {
        DbClient::new(
            Arc::clone(&self.settings.provider),
            self.settings.connection_string.clone(),
            self.settings.owns_connection,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedProvider;

    #[test]
    fn lookups_ignore_case() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("Scripted", Arc::new(ScriptedProvider::new()))
            .unwrap();
        assert!(registry.contains("SCRIPTED"));
        assert_eq!(registry.resolve("scripted").unwrap().name(), "scripted");
    }

    #[test]
    fn second_registration_is_rejected() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("scripted", Arc::new(ScriptedProvider::new()))
            .unwrap();
        let err = registry
            .register("SCRIPTED", Arc::new(ScriptedProvider::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            SqlClientError::DuplicateRegistration { kind: "provider", .. }
        ));
    }

    #[test]
    fn unknown_name_is_reported() {
        let registry = ProviderRegistry::with_builtin();
        assert!(matches!(
            registry.resolve("oracle"),
            Err(SqlClientError::UnknownProvider(name)) if name == "oracle"
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn builtin_sqlite_answers_to_aliases() {
        let registry = ProviderRegistry::with_builtin();
        assert_eq!(registry.resolve("SQLite").unwrap().name(), "sqlite");
        assert_eq!(registry.resolve("rusqlite").unwrap().name(), "sqlite");
    }

    #[test]
    fn settings_debug_is_redacted() {
        let settings = ClientSettings::new(
            Arc::new(ScriptedProvider::new()),
            "Server=db;User ID=sa;Password=hunter2",
        );
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sa;"));
    }
}
