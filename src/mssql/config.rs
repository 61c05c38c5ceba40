use std::fmt;
use std::time::Duration;

use tiberius::Config as TiberiusConfig;
use tokio::net::TcpStream;
use tokio_util::compat::Compat;

use crate::connection_string::ConnectionStringBuilder;
use crate::error::SqlClientError;

/// Type alias for SQL Server client
pub type MssqlClient = tiberius::Client<Compat<TcpStream>>;

/// Login timeout applied when the connection string sets none.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const CONNECT_TIMEOUT_KEYS: [&str; 2] = ["Connect Timeout", "Connection Timeout"];

/// Options for opening a SQL Server connection, read from an ADO.NET string.
///
/// Everything tiberius understands is parsed by `Config::from_ado_string`;
/// `Connect Timeout` (seconds) bounds the TCP connect and login.
#[derive(Clone)]
pub struct MssqlOptions {
    pub config: TiberiusConfig,
    pub connect_timeout: Duration,
}

impl MssqlOptions {
    /// # Errors
    /// `MssqlError` if tiberius rejects the string, `ConfigError` for a bad timeout.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, SqlClientError> {
        let config = TiberiusConfig::from_ado_string(connection_string)?;
        let builder = ConnectionStringBuilder::parse(connection_string)?;
        let connect_timeout = match builder.get_any(&CONNECT_TIMEOUT_KEYS) {
            Some(value) => Duration::from_secs(value.trim().parse().map_err(|_| {
                SqlClientError::ConfigError(format!("invalid value '{value}' for 'Connect Timeout'"))
            })?),
            None => DEFAULT_CONNECT_TIMEOUT,
        };
        Ok(Self {
            config,
            connect_timeout,
        })
    }
}

impl fmt::Debug for MssqlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlOptions")
            .field("addr", &self.config.get_addr())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
