//! `DbClient`: one connection plus the convenience operations layered on it.

mod transaction;

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::command::{Command, CommandKind, Parameter};
use crate::error::SqlClientError;
use crate::identifier::FullyQualifiedIdentifier;
use crate::provider::{DbConnection, ProviderFactory};
use crate::results::{ExecuteResult, ResultSetReader, TableRows};
use crate::types::{CommandBehavior, ConnectionState, IsolationLevel};

pub use transaction::Transaction;

const CLIENT: &str = "DbClient";

/// A database client bound to a single provider connection.
///
/// The client opens its connection lazily: every operation first opens it if
/// it is closed or broken. Methods take `&mut self`, so one command is in
/// flight at a time and readers borrow the client until they are dropped.
///
/// An owning client closes its connection on [`DbClient::dispose`] (or drop).
/// A non-owning client leaves the connection open and hands it back through
/// [`DbClient::into_connection`].
pub struct DbClient {
    connection: Option<Box<dyn DbConnection>>,
    provider: Arc<dyn ProviderFactory>,
    connection_string: String,
    owns_connection: bool,
    disposed: bool,
}

impl DbClient {
    /// Create a client over a fresh provider connection.
    ///
    /// # Errors
    /// Returns the provider's error if it rejects the connection string.
    pub fn new(
        provider: Arc<dyn ProviderFactory>,
        connection_string: impl Into<String>,
        owns_connection: bool,
    ) -> Result<Self, SqlClientError> {
        let connection_string = connection_string.into();
        let connection = provider.create_connection(&connection_string)?;
        Ok(Self::from_connection(
            provider,
            connection,
            connection_string,
            owns_connection,
        ))
    }

    /// Wrap an existing connection.
    #[must_use]
    pub fn from_connection(
        provider: Arc<dyn ProviderFactory>,
        connection: Box<dyn DbConnection>,
        connection_string: impl Into<String>,
        owns_connection: bool,
    ) -> Self {
        Self {
            connection: Some(connection),
            provider,
            connection_string: connection_string.into(),
            owns_connection,
            disposed: false,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ProviderFactory> {
        &self.provider
    }

    #[must_use]
    pub fn owns_connection(&self) -> bool {
        self.owns_connection
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// # Errors
    /// Returns `ObjectDisposed` after [`DbClient::dispose`].
    pub fn connection_state(&self) -> Result<ConnectionState, SqlClientError> {
        self.ensure_live()?;
        self.connection
            .as_ref()
            .map(|c| c.state())
            .ok_or(SqlClientError::ObjectDisposed(CLIENT))
    }

    /// Open the connection unless it is already open or connecting.
    ///
    /// # Errors
    /// `ObjectDisposed`, or the provider's connect error.
    pub fn open_connection(&mut self) -> Result<(), SqlClientError> {
        if !self.connection_state()?.needs_open() {
            return Ok(());
        }
        self.log_open();
        self.live_connection()?.open()
    }

    /// # Errors
    /// `ObjectDisposed`, `Cancelled`, or the provider's connect error.
    pub async fn open_connection_async(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(), SqlClientError> {
        if !self.connection_state()?.needs_open() {
            return Ok(());
        }
        self.log_open();
        self.live_connection()?.open_async(cancel).await
    }

    /// Run `command` as a non-query.
    ///
    /// # Errors
    /// `ObjectDisposed`, provider failures, or a malformed return value.
    pub fn execute(&mut self, command: &Command) -> Result<ExecuteResult, SqlClientError> {
        self.open_connection()?;
        self.execute_opened(command)
    }

    /// # Errors
    /// `ObjectDisposed`, `Cancelled`, provider failures, or a malformed return value.
    pub async fn execute_async(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<ExecuteResult, SqlClientError> {
        self.open_connection_async(cancel).await?;
        self.execute_opened_async(command, cancel).await
    }

    /// Run `command` and return a reader over its result sets.
    ///
    /// # Errors
    /// `ObjectDisposed` or provider failures.
    pub fn execute_reader(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
    ) -> Result<ResultSetReader<'_>, SqlClientError> {
        self.open_connection()?;
        self.execute_reader_opened(command, behavior)
    }

    /// # Errors
    /// `ObjectDisposed`, `Cancelled`, or provider failures.
    pub async fn execute_reader_async(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
        cancel: &CancellationToken,
    ) -> Result<ResultSetReader<'_>, SqlClientError> {
        self.open_connection_async(cancel).await?;
        self.execute_reader_opened_async(command, behavior, cancel)
            .await
    }

    /// Command calling `schema.name` as a stored procedure, quoted for this
    /// client's provider. Parameters are attached unchanged.
    #[must_use]
    pub fn stored_procedure_command(
        &self,
        schema: &str,
        name: &str,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Command {
        let procedure = FullyQualifiedIdentifier::schema_object(&*self.provider, schema, name);
        Command::new(procedure.to_string(), CommandKind::StoredProcedure).with_parameters(parameters)
    }

    /// # Errors
    /// See [`DbClient::execute`].
    pub fn execute_stored_procedure(
        &mut self,
        schema: &str,
        name: &str,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Result<ExecuteResult, SqlClientError> {
        let command = self.stored_procedure_command(schema, name, parameters);
        self.execute(&command)
    }

    /// # Errors
    /// See [`DbClient::execute_async`].
    pub async fn execute_stored_procedure_async(
        &mut self,
        schema: &str,
        name: &str,
        parameters: impl IntoIterator<Item = Parameter>,
        cancel: &CancellationToken,
    ) -> Result<ExecuteResult, SqlClientError> {
        let command = self.stored_procedure_command(schema, name, parameters);
        self.execute_async(&command, cancel).await
    }

    /// Read every row of `schema.name` (`select * from …`), first result set only.
    ///
    /// # Errors
    /// `ObjectDisposed` or provider failures.
    pub fn enumerate_table_or_view(
        &mut self,
        schema: &str,
        name: &str,
    ) -> Result<TableRows<'_>, SqlClientError> {
        let command = self.table_command(schema, name);
        let reader = self.execute_reader(&command, table_behavior())?;
        Ok(TableRows::new(reader))
    }

    /// # Errors
    /// `ObjectDisposed`, `Cancelled`, or provider failures.
    pub async fn enumerate_table_or_view_async(
        &mut self,
        schema: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<TableRows<'_>, SqlClientError> {
        let command = self.table_command(schema, name);
        let reader = self
            .execute_reader_async(&command, table_behavior(), cancel)
            .await?;
        Ok(TableRows::new(reader))
    }

    /// Start a transaction at `level`.
    ///
    /// # Errors
    /// `ObjectDisposed` or provider failures.
    pub fn begin_transaction(
        &mut self,
        level: IsolationLevel,
    ) -> Result<Transaction<'_>, SqlClientError> {
        self.open_connection()?;
        tracing::debug!("beginning transaction with isolation level {}", level);
        self.live_connection()?.begin_transaction(level)?;
        Ok(Transaction::new(self, level))
    }

    /// # Errors
    /// `ObjectDisposed`, `Cancelled`, or provider failures.
    pub async fn begin_transaction_async(
        &mut self,
        level: IsolationLevel,
        cancel: &CancellationToken,
    ) -> Result<Transaction<'_>, SqlClientError> {
        self.open_connection_async(cancel).await?;
        tracing::debug!("beginning transaction with isolation level {}", level);
        self.live_connection()?
            .begin_transaction_async(level, cancel)
            .await?;
        Ok(Transaction::new(self, level))
    }

    /// Release the client. Idempotent.
    ///
    /// An owned connection is closed and dropped; a borrowed one is kept for
    /// [`DbClient::into_connection`].
    ///
    /// # Errors
    /// The provider's close error. The client is disposed regardless.
    pub fn dispose(&mut self) -> Result<(), SqlClientError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if self.owns_connection {
            if let Some(mut connection) = self.connection.take() {
                connection.close()?;
            }
        }
        Ok(())
    }

    /// Hand the connection back without closing it. Returns `None` if an
    /// owning client already closed it.
    #[must_use]
    pub fn into_connection(mut self) -> Option<Box<dyn DbConnection>> {
        self.disposed = true;
        self.connection.take()
    }

    pub(crate) fn execute_opened(
        &mut self,
        command: &Command,
    ) -> Result<ExecuteResult, SqlClientError> {
        log_command(command);
        let outcome = self.live_connection()?.execute_non_query(command)?;
        ExecuteResult::from_outcome(outcome)
    }

    pub(crate) async fn execute_opened_async(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<ExecuteResult, SqlClientError> {
        log_command(command);
        let outcome = self
            .live_connection()?
            .execute_non_query_async(command, cancel)
            .await?;
        ExecuteResult::from_outcome(outcome)
    }

    pub(crate) fn execute_reader_opened(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
    ) -> Result<ResultSetReader<'_>, SqlClientError> {
        log_command(command);
        let cursor = self.live_connection()?.execute_reader(command, behavior)?;
        Ok(ResultSetReader::from_cursor(cursor))
    }

    pub(crate) async fn execute_reader_opened_async(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
        cancel: &CancellationToken,
    ) -> Result<ResultSetReader<'_>, SqlClientError> {
        log_command(command);
        let cursor = self
            .live_connection()?
            .execute_reader_async(command, behavior, cancel)
            .await?;
        Ok(ResultSetReader::from_cursor(cursor))
    }

    pub(crate) fn live_connection(&mut self) -> Result<&mut dyn DbConnection, SqlClientError> {
        self.ensure_live()?;
        match self.connection.as_deref_mut() {
            Some(connection) => Ok(connection),
            None => Err(SqlClientError::ObjectDisposed(CLIENT)),
        }
    }

    fn ensure_live(&self) -> Result<(), SqlClientError> {
        if self.disposed {
            Err(SqlClientError::ObjectDisposed(CLIENT))
        } else {
            Ok(())
        }
    }

    fn table_command(&self, schema: &str, name: &str) -> Command {
        let table = FullyQualifiedIdentifier::schema_object(&*self.provider, schema, name);
        Command::text(format!("select * from {table};"))
    }

    fn log_open(&self) {
        if tracing::enabled!(Level::DEBUG) {
            let redacted = self
                .provider
                .redact_connection_string(&self.connection_string);
            tracing::debug!(
                "opening {} connection: {}",
                self.provider.name(),
                redacted
            );
        }
    }
}

fn table_behavior() -> CommandBehavior {
    CommandBehavior::SINGLE_RESULT | CommandBehavior::SEQUENTIAL_ACCESS
}

fn log_command(command: &Command) {
    tracing::debug!(
        timeout = ?command.timeout(),
        kind = ?command.kind(),
        "executing command: {}",
        command.command_text()
    );
}

impl fmt::Debug for DbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbClient")
            .field("provider", &self.provider.name())
            .field("owns_connection", &self.owns_connection)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Drop for DbClient {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            tracing::warn!("failed to close connection while dropping client: {}", e);
        }
    }
}
