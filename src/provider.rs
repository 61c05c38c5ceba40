//! The capability set a database driver has to provide.
//!
//! Everything that touches the wire lives behind these traits: the client
//! only sequences calls, logs, and maps results. Built-in implementations
//! live in the `sqlite` and `mssql` modules; tests use
//! `test_utils::ScriptedProvider`.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::{Command, Parameter};
use crate::connection_string::ConnectionStringBuilder;
use crate::error::SqlClientError;
use crate::identifier::IdentifierQuoter;
use crate::types::{CommandBehavior, ConnectionState, IsolationLevel, RowValues};

/// Logged in place of a connection string the provider cannot parse.
pub const UNPARSEABLE_CONNECTION_STRING: &str = "<unparseable connection string>";

/// Column metadata reported by a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub declared_type: Option<String>,
    pub ordinal: usize,
}

impl FieldInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, declared_type: Option<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            declared_type,
            ordinal,
        }
    }

    /// Untyped fields named in order.
    #[must_use]
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Vec<FieldInfo> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| FieldInfo::new(name.as_ref(), None, i))
            .collect()
    }
}

/// Holds a connection in `Connecting` while an open is in flight.
///
/// Dropping the guard puts a still-`Connecting` state back to `Closed`, so an
/// open whose future was abandoned is retried on next use.
pub(crate) struct OpeningGuard<'a> {
    state: &'a mut ConnectionState,
}

impl<'a> OpeningGuard<'a> {
    pub(crate) fn begin(state: &'a mut ConnectionState) -> Self {
        *state = ConnectionState::Connecting;
        Self { state }
    }
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if *self.state == ConnectionState::Connecting {
            *self.state = ConnectionState::Closed;
        }
    }
}

/// What a provider reports after running a non-query.
///
/// `parameters` holds the command's non-input parameters carrying their
/// post-execution values, in command order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NonQueryOutcome {
    /// Affected rows, or -1 when the command did not modify rows.
    pub rows_affected: i64,
    pub parameters: Vec<Parameter>,
}

impl NonQueryOutcome {
    #[must_use]
    pub fn rows(rows_affected: i64) -> Self {
        Self {
            rows_affected,
            parameters: Vec::new(),
        }
    }
}

/// Entry point of a driver: creates connections and knows its quoting and
/// connection-string rules.
pub trait ProviderFactory: IdentifierQuoter + fmt::Debug + Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Create a closed connection for `connection_string`.
    ///
    /// # Errors
    /// Returns an error if the connection string is not usable by this provider.
    fn create_connection(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn DbConnection>, SqlClientError>;

    /// Parse a connection string with this provider's rules.
    ///
    /// # Errors
    /// Returns `SqlClientError::ConfigError` if the string is malformed.
    fn connection_string_builder(
        &self,
        connection_string: &str,
    ) -> Result<ConnectionStringBuilder, SqlClientError> {
        ConnectionStringBuilder::parse(connection_string)
    }

    /// Connection string with credentials removed, suitable for logs.
    fn redact_connection_string(&self, connection_string: &str) -> String {
        match self.connection_string_builder(connection_string) {
            Ok(mut builder) => {
                builder.redact();
                builder.to_string()
            }
            Err(_) => UNPARSEABLE_CONNECTION_STRING.to_string(),
        }
    }
}

/// A single driver connection. One command is in flight at a time.
///
/// Async methods receive the caller's cancellation token and are responsible
/// for aborting the underlying call when it fires.
#[async_trait]
pub trait DbConnection: Send {
    fn state(&self) -> ConnectionState;

    /// # Errors
    /// Provider failures while connecting.
    fn open(&mut self) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while connecting, or `Cancelled`.
    async fn open_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while closing.
    fn close(&mut self) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while starting the transaction.
    fn begin_transaction(&mut self, level: IsolationLevel) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while starting the transaction, or `Cancelled`.
    async fn begin_transaction_async(
        &mut self,
        level: IsolationLevel,
        cancel: &CancellationToken,
    ) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while committing.
    fn commit(&mut self) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while committing, or `Cancelled`.
    async fn commit_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while rolling back.
    fn rollback(&mut self) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while rolling back, or `Cancelled`.
    async fn rollback_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError>;

    /// # Errors
    /// Provider failures while executing.
    fn execute_non_query(&mut self, command: &Command) -> Result<NonQueryOutcome, SqlClientError>;

    /// # Errors
    /// Provider failures while executing, or `Cancelled`.
    async fn execute_non_query_async(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<NonQueryOutcome, SqlClientError>;

    /// # Errors
    /// Provider failures while executing.
    fn execute_reader(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
    ) -> Result<Box<dyn DbCursor>, SqlClientError>;

    /// # Errors
    /// Provider failures while executing, or `Cancelled`.
    async fn execute_reader_async(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn DbCursor>, SqlClientError>;
}

/// Forward-only cursor over one or more result sets.
///
/// A fresh cursor is positioned on its first result set (if any).
#[async_trait]
pub trait DbCursor: Send {
    /// Fields of the current result set; empty when there is none.
    fn fields(&self) -> &[FieldInfo];

    /// Next row of the current result set, every field in ordinal order.
    ///
    /// # Errors
    /// Provider failures, or `CursorClosed`.
    fn read(&mut self) -> Result<Option<Vec<RowValues>>, SqlClientError>;

    /// Skip the rest of the current result set and move to the next one.
    ///
    /// # Errors
    /// Provider failures, or `CursorClosed`.
    fn next_result(&mut self) -> Result<bool, SqlClientError>;

    /// # Errors
    /// Provider failures while releasing the cursor.
    fn close(&mut self) -> Result<(), SqlClientError>;

    fn is_closed(&self) -> bool;

    /// # Errors
    /// See [`DbCursor::read`].
    async fn read_async(
        &mut self,
        _cancel: &CancellationToken,
    ) -> Result<Option<Vec<RowValues>>, SqlClientError> {
        self.read()
    }

    /// # Errors
    /// See [`DbCursor::next_result`].
    async fn next_result_async(
        &mut self,
        _cancel: &CancellationToken,
    ) -> Result<bool, SqlClientError> {
        self.next_result()
    }
}
