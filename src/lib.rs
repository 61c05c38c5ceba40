//! A convenience layer over relational-database drivers.
//!
//! [`DbClient`] wraps one provider connection: it opens lazily, logs commands
//! and connection strings (with credentials redacted), runs [`Command`]s as
//! non-queries or readers, calls stored procedures, and starts transactions,
//! each in a blocking and an async form. [`DbServices`] registers named client
//! factories from an [`AppSettings`] file, and [`DbConfigurationProvider`]
//! serves key/value settings read from a database table.
//!
//! ```rust,no_run
//! use sql_facade::prelude::*;
//!
//! # fn main() -> Result<(), SqlClientError> {
//! let settings = AppSettings::from_json_str(
//!     r#"{ "connections": { "main": { "type": "sqlite", "value": "Data Source=app.db" } } }"#,
//! )?;
//! let mut services = DbServices::new();
//! services.add_db_client_from_settings("main", &settings)?;
//!
//! let mut client = services.create_client("main")?;
//! let result = client.execute(
//!     &Command::text("UPDATE users SET active = :active WHERE id = :id")
//!         .with_parameter(Parameter::input(":active", true))
//!         .with_parameter(Parameter::input(":id", 42)),
//! )?;
//! println!("{} rows", result.code());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config_provider;
pub mod connection_string;
pub mod error;
pub mod exports;
pub mod factory;
pub mod identifier;
pub mod prelude;
pub mod provider;
pub mod results;
pub mod services;
pub mod settings;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{DbClient, Transaction};
pub use command::{Command, CommandKind, Parameter, ParameterDirection};
pub use config_provider::DbConfigurationProvider;
pub use connection_string::ConnectionStringBuilder;
pub use error::SqlClientError;
pub use factory::{ClientSettings, DbClientFactory, ProviderRegistry};
pub use identifier::{FullyQualifiedIdentifier, IdentifierQuoter, QuotedIdentifier};
pub use provider::{DbConnection, DbCursor, FieldInfo, NonQueryOutcome, ProviderFactory};
pub use results::{CustomDbRow, ExecuteResult, ResultSet, ResultSetReader, TableRows};
pub use services::DbServices;
pub use settings::AppSettings;
pub use types::{
    CommandBehavior, ConnectionState, IsolationLevel, ProviderKind, RowValues,
};
