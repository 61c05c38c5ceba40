use tokio_util::sync::CancellationToken;

use super::DbClient;
use crate::command::Command;
use crate::error::SqlClientError;
use crate::results::{ExecuteResult, ResultSetReader};
use crate::types::{CommandBehavior, IsolationLevel};

/// An open transaction on a [`DbClient`].
///
/// Commands run on the client's connection without re-opening it. Finish with
/// [`Transaction::commit`] or [`Transaction::rollback`]; dropping the value
/// does neither, and the connection stays mid-transaction.
#[derive(Debug)]
pub struct Transaction<'c> {
    client: &'c mut DbClient,
    isolation_level: IsolationLevel,
}

impl<'c> Transaction<'c> {
    pub(super) fn new(client: &'c mut DbClient, isolation_level: IsolationLevel) -> Self {
        Self {
            client,
            isolation_level,
        }
    }

    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// # Errors
    /// Provider failures, or a malformed return value.
    pub fn execute(&mut self, command: &Command) -> Result<ExecuteResult, SqlClientError> {
        self.client.execute_opened(command)
    }

    /// # Errors
    /// Provider failures, `Cancelled`, or a malformed return value.
    pub async fn execute_async(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<ExecuteResult, SqlClientError> {
        self.client.execute_opened_async(command, cancel).await
    }

    /// # Errors
    /// Provider failures.
    pub fn execute_reader(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
    ) -> Result<ResultSetReader<'_>, SqlClientError> {
        self.client.execute_reader_opened(command, behavior)
    }

    /// # Errors
    /// Provider failures, or `Cancelled`.
    pub async fn execute_reader_async(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
        cancel: &CancellationToken,
    ) -> Result<ResultSetReader<'_>, SqlClientError> {
        self.client
            .execute_reader_opened_async(command, behavior, cancel)
            .await
    }

    /// # Errors
    /// Provider failures while committing.
    pub fn commit(self) -> Result<(), SqlClientError> {
        self.client.live_connection()?.commit()
    }

    /// # Errors
    /// Provider failures while committing, or `Cancelled`.
    pub async fn commit_async(self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        self.client.live_connection()?.commit_async(cancel).await
    }

    /// # Errors
    /// Provider failures while rolling back.
    pub fn rollback(self) -> Result<(), SqlClientError> {
        self.client.live_connection()?.rollback()
    }

    /// # Errors
    /// Provider failures while rolling back, or `Cancelled`.
    pub async fn rollback_async(self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        self.client.live_connection()?.rollback_async(cancel).await
    }
}
