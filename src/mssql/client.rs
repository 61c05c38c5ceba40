use tiberius::Client;
use tiberius::SqlBrowser;
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

use super::config::{MssqlClient, MssqlOptions};
use crate::error::SqlClientError;

/// Connect and log in, following one server redirect (Azure SQL gateways).
///
/// # Errors
/// `ConnectionError` on timeout, otherwise the driver's I/O or login error.
pub async fn create_mssql_client(options: &MssqlOptions) -> Result<MssqlClient, SqlClientError> {
    tokio::time::timeout(options.connect_timeout, connect(options))
        .await
        .map_err(|_| {
            SqlClientError::ConnectionError(format!(
                "SQL Server connection timed out after {:?}",
                options.connect_timeout
            ))
        })?
}

async fn connect(options: &MssqlOptions) -> Result<MssqlClient, SqlClientError> {
    let mut config = options.config.clone();

    // Named instances are resolved through the SQL Browser service.
    let tcp = TcpStream::connect_named(&config).await?;
    tcp.set_nodelay(true)?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            config.host(&host);
            config.port(port);
            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Ok(Client::connect(config, tcp.compat_write()).await?)
        }
        Err(e) => Err(e.into()),
    }
}
