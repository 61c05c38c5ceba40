// SQLite provider - rusqlite behind the provider traits
//
// - config: connection-string options and open flags
// - params: parameter conversion and binding
// - query: statement execution and result extraction
// - connection: the `DbConnection` implementation

pub mod config;
mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteOpenMode, SqliteOptions};
pub use connection::SqliteDbConnection;

use crate::error::SqlClientError;
use crate::identifier::{IdentifierQuoter, QuotedIdentifier, quote_double};
use crate::provider::{DbConnection, ProviderFactory};

/// Provider factory for `SQLite` databases.
///
/// Identifiers are quoted as `"name"` with embedded quotes doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteProviderFactory;

impl IdentifierQuoter for SqliteProviderFactory {
    fn quote_identifier(&self, raw: &str) -> QuotedIdentifier {
        quote_double(raw)
    }
}

impl ProviderFactory for SqliteProviderFactory {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn create_connection(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn DbConnection>, SqlClientError> {
        let options = SqliteOptions::from_connection_string(connection_string)?;
        Ok(Box::new(SqliteDbConnection::new(options)))
    }
}
