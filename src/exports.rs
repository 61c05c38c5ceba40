//! Provider-specific type exports.
//!
//! This module contains all the conditional feature exports for the built-in
//! providers, keeping them organized in one place.

// SQLite exports
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDbConnection;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteOptions;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteProviderFactory;

// SQL Server exports
#[cfg(feature = "mssql")]
pub use crate::mssql::MssqlClient;
#[cfg(feature = "mssql")]
pub use crate::mssql::MssqlDbConnection;
#[cfg(feature = "mssql")]
pub use crate::mssql::MssqlOptions;
#[cfg(feature = "mssql")]
pub use crate::mssql::MssqlProviderFactory;
#[cfg(feature = "mssql")]
pub use crate::mssql::create_mssql_client;
