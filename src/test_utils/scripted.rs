use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::error::SqlClientError;
use crate::identifier::{IdentifierQuoter, QuotedIdentifier, quote_double};
use crate::provider::{DbConnection, DbCursor, NonQueryOutcome, ProviderFactory};
use crate::results::{BufferedCursor, BufferedResult};
use crate::types::{CommandBehavior, ConnectionState, IsolationLevel};

/// Everything the scripted connections were asked to do, in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    pub connection_strings: Vec<String>,
    pub opens: usize,
    pub closes: usize,
    pub commands: Vec<Command>,
    pub behaviors: Vec<CommandBehavior>,
    pub transactions: Vec<IsolationLevel>,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Default)]
struct Script {
    non_queries: VecDeque<NonQueryOutcome>,
    readers: VecDeque<Vec<BufferedResult>>,
    failures: VecDeque<String>,
    fail_close: bool,
}

#[derive(Debug, Default)]
struct Shared {
    log: ScriptLog,
    script: Script,
}

/// Provider whose connections replay queued responses and record every call.
///
/// Clones share the queue and the log. Non-queries answer with the next queued
/// [`NonQueryOutcome`] (0 rows when the queue is empty), readers with the next
/// queued result sets (none when empty). A queued failure is returned by the
/// next command of either kind. Identifiers are quoted with double quotes.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    shared: Arc<Mutex<Shared>>,
    initial_state: ConnectionState,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            initial_state: ConnectionState::Closed,
        }
    }

    /// State new connections start in.
    #[must_use]
    pub fn with_initial_state(mut self, state: ConnectionState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn push_non_query(&self, outcome: NonQueryOutcome) {
        self.lock().script.non_queries.push_back(outcome);
    }

    pub fn push_reader(&self, results: Vec<BufferedResult>) {
        self.lock().script.readers.push_back(results);
    }

    /// Fail the next command with `ExecutionError(message)`.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock().script.failures.push_back(message.into());
    }

    /// Make every close fail with `ConnectionError`.
    pub fn fail_close(&self, fail: bool) {
        self.lock().script.fail_close = fail;
    }

    /// Copy of the call log.
    #[must_use]
    pub fn log(&self) -> ScriptLog {
        self.lock().log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentifierQuoter for ScriptedProvider {
    fn quote_identifier(&self, raw: &str) -> QuotedIdentifier {
        quote_double(raw)
    }
}

impl ProviderFactory for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create_connection(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn DbConnection>, SqlClientError> {
        self.lock()
            .log
            .connection_strings
            .push(connection_string.to_string());
        Ok(Box::new(ScriptedConnection {
            shared: Arc::clone(&self.shared),
            state: self.initial_state,
        }))
    }
}

/// Connection handed out by [`ScriptedProvider`].
#[derive(Debug)]
pub struct ScriptedConnection {
    shared: Arc<Mutex<Shared>>,
    state: ConnectionState,
}

impl ScriptedConnection {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, command: &Command, behavior: Option<CommandBehavior>) -> Result<(), SqlClientError> {
        let mut shared = self.lock();
        shared.log.commands.push(command.clone());
        if let Some(behavior) = behavior {
            shared.log.behaviors.push(behavior);
        }
        match shared.script.failures.pop_front() {
            Some(message) => Err(SqlClientError::ExecutionError(message)),
            None => Ok(()),
        }
    }
}

fn check_cancel(cancel: &CancellationToken) -> Result<(), SqlClientError> {
    if cancel.is_cancelled() {
        Err(SqlClientError::Cancelled)
    } else {
        Ok(())
    }
}

#[async_trait]
impl DbConnection for ScriptedConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<(), SqlClientError> {
        self.lock().log.opens += 1;
        self.state = ConnectionState::Open;
        Ok(())
    }

    async fn open_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        check_cancel(cancel)?;
        self.open()
    }

    fn close(&mut self) -> Result<(), SqlClientError> {
        let mut shared = self.lock();
        shared.log.closes += 1;
        if shared.script.fail_close {
            return Err(SqlClientError::ConnectionError("scripted close failure".into()));
        }
        drop(shared);
        self.state = ConnectionState::Closed;
        Ok(())
    }

    fn begin_transaction(&mut self, level: IsolationLevel) -> Result<(), SqlClientError> {
        self.lock().log.transactions.push(level);
        Ok(())
    }

    async fn begin_transaction_async(
        &mut self,
        level: IsolationLevel,
        cancel: &CancellationToken,
    ) -> Result<(), SqlClientError> {
        check_cancel(cancel)?;
        self.begin_transaction(level)
    }

    fn commit(&mut self) -> Result<(), SqlClientError> {
        self.lock().log.commits += 1;
        Ok(())
    }

    async fn commit_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        check_cancel(cancel)?;
        self.commit()
    }

    fn rollback(&mut self) -> Result<(), SqlClientError> {
        self.lock().log.rollbacks += 1;
        Ok(())
    }

    async fn rollback_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        check_cancel(cancel)?;
        self.rollback()
    }

    fn execute_non_query(&mut self, command: &Command) -> Result<NonQueryOutcome, SqlClientError> {
        self.record(command, None)?;
        Ok(self
            .lock()
            .script
            .non_queries
            .pop_front()
            .unwrap_or_else(|| NonQueryOutcome::rows(0)))
    }

    async fn execute_non_query_async(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<NonQueryOutcome, SqlClientError> {
        check_cancel(cancel)?;
        self.execute_non_query(command)
    }

    fn execute_reader(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
    ) -> Result<Box<dyn DbCursor>, SqlClientError> {
        self.record(command, Some(behavior))?;
        let results = self.lock().script.readers.pop_front().unwrap_or_default();
        Ok(Box::new(BufferedCursor::new(results, behavior)))
    }

    async fn execute_reader_async(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn DbCursor>, SqlClientError> {
        check_cancel(cancel)?;
        self.execute_reader(command, behavior)
    }
}
