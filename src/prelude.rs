//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::client::{DbClient, Transaction};
pub use crate::command::{Command, CommandKind, Parameter, ParameterDirection};
pub use crate::config_provider::DbConfigurationProvider;
pub use crate::error::SqlClientError;
pub use crate::factory::{ClientSettings, DbClientFactory, ProviderRegistry};
pub use crate::identifier::{FullyQualifiedIdentifier, IdentifierQuoter, QuotedIdentifier};
pub use crate::provider::ProviderFactory;
pub use crate::results::{CustomDbRow, ExecuteResult, ResultSet, ResultSetReader, TableRows};
pub use crate::services::DbServices;
pub use crate::settings::AppSettings;
pub use crate::types::{
    CommandBehavior, ConnectionState, IsolationLevel, ProviderKind, RowValues,
};

pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "sqlite")]
pub use crate::exports::SqliteProviderFactory;

#[cfg(feature = "mssql")]
pub use crate::exports::MssqlProviderFactory;
