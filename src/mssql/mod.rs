// SQL Server provider - tiberius behind the provider traits
//
// - config: connection options parsed from an ADO.NET string
// - client: TCP connect and login
// - params: rendering a command into a T-SQL batch
// - query: batch execution and result extraction
// - connection: the `DbConnection` implementation

pub mod client;
pub mod config;
mod connection;
pub mod params;
pub mod query;

pub use client::create_mssql_client;
pub use config::{MssqlClient, MssqlOptions};
pub use connection::MssqlDbConnection;

use crate::error::SqlClientError;
use crate::identifier::{IdentifierQuoter, QuotedIdentifier, quote_bracket};
use crate::provider::{DbConnection, ProviderFactory};

/// Provider factory for SQL Server.
///
/// Identifiers are quoted as `[name]` with embedded `]` doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlProviderFactory;

impl IdentifierQuoter for MssqlProviderFactory {
    fn quote_identifier(&self, raw: &str) -> QuotedIdentifier {
        quote_bracket(raw)
    }
}

impl ProviderFactory for MssqlProviderFactory {
    fn name(&self) -> &str {
        "mssql"
    }

    fn create_connection(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn DbConnection>, SqlClientError> {
        let options = MssqlOptions::from_connection_string(connection_string)?;
        Ok(Box::new(MssqlDbConnection::new(options)))
    }
}
