use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::client::create_mssql_client;
use super::config::{MssqlClient, MssqlOptions};
use super::query;
use crate::command::Command;
use crate::error::SqlClientError;
use crate::provider::{DbConnection, DbCursor, NonQueryOutcome, OpeningGuard};
use crate::results::BufferedCursor;
use crate::types::{CommandBehavior, ConnectionState, IsolationLevel};

/// A tiberius client driven through the provider traits.
///
/// Only the async forms are supported. A cancelled or timed-out request is
/// abandoned mid-stream, so the connection is marked `Broken` and reopened on
/// next use.
pub struct MssqlDbConnection {
    options: MssqlOptions,
    client: Option<MssqlClient>,
    state: ConnectionState,
}

impl MssqlDbConnection {
    #[must_use]
    pub fn new(options: MssqlOptions) -> Self {
        Self {
            options,
            client: None,
            state: ConnectionState::Closed,
        }
    }

    fn parts(&mut self) -> Result<(&mut MssqlClient, &mut ConnectionState), SqlClientError> {
        if self.state != ConnectionState::Open {
            return Err(SqlClientError::ConnectionError(format!(
                "SQL Server connection is {:?}",
                self.state
            )));
        }
        match self.client.as_mut() {
            Some(client) => Ok((client, &mut self.state)),
            None => Err(SqlClientError::ConnectionError(
                "SQL Server connection is not open".into(),
            )),
        }
    }

    async fn run_control(&mut self, sql: String, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        let (client, state) = self.parts()?;
        drive(state, None, cancel, query::execute_simple(client, &sql)).await
    }
}

/// Await `fut` unless `cancel` fires or `timeout` elapses first. An abandoned
/// request, or an I/O failure, leaves the connection `Broken`.
async fn drive<R>(
    state: &mut ConnectionState,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<R, SqlClientError>>,
) -> Result<R, SqlClientError> {
    if cancel.is_cancelled() {
        return Err(SqlClientError::Cancelled);
    }
    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                SqlClientError::ExecutionError(format!(
                    "SQL Server command timed out after {limit:?}"
                ))
            }),
            None => Ok(fut.await),
        }
    };
    let outcome = tokio::select! {
        finished = bounded => finished,
        () = cancel.cancelled() => Err(SqlClientError::Cancelled),
    };
    match outcome {
        Ok(result) => {
            if let Err(SqlClientError::MssqlError(tiberius::error::Error::Io { .. })) = &result {
                *state = ConnectionState::Broken;
            }
            result
        }
        Err(abandoned) => {
            *state = ConnectionState::Broken;
            Err(abandoned)
        }
    }
}

fn async_only(operation: &str) -> SqlClientError {
    SqlClientError::Unimplemented(format!(
        "SQL Server {operation} is only available through the async API"
    ))
}

fn begin_sql(level: IsolationLevel) -> String {
    let isolation = match level {
        IsolationLevel::Unspecified => None,
        IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
        IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
        IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
        IsolationLevel::Serializable => Some("SERIALIZABLE"),
        IsolationLevel::Snapshot => Some("SNAPSHOT"),
    };
    match isolation {
        Some(isolation) => {
            format!("SET TRANSACTION ISOLATION LEVEL {isolation}; BEGIN TRANSACTION;")
        }
        None => "BEGIN TRANSACTION;".to_string(),
    }
}

#[async_trait]
impl DbConnection for MssqlDbConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<(), SqlClientError> {
        Err(async_only("open"))
    }

    async fn open_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        self.client = None;
        let connected = {
            let _opening = OpeningGuard::begin(&mut self.state);
            tokio::select! {
                client = create_mssql_client(&self.options) => client,
                () = cancel.cancelled() => Err(SqlClientError::Cancelled),
            }
        };
        self.client = Some(connected?);
        self.state = ConnectionState::Open;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlClientError> {
        self.client = None;
        self.state = ConnectionState::Closed;
        Ok(())
    }

    fn begin_transaction(&mut self, _level: IsolationLevel) -> Result<(), SqlClientError> {
        Err(async_only("begin_transaction"))
    }

    async fn begin_transaction_async(
        &mut self,
        level: IsolationLevel,
        cancel: &CancellationToken,
    ) -> Result<(), SqlClientError> {
        self.run_control(begin_sql(level), cancel).await
    }

    fn commit(&mut self) -> Result<(), SqlClientError> {
        Err(async_only("commit"))
    }

    async fn commit_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        self.run_control("COMMIT TRANSACTION;".to_string(), cancel)
            .await
    }

    fn rollback(&mut self) -> Result<(), SqlClientError> {
        Err(async_only("rollback"))
    }

    async fn rollback_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        self.run_control("ROLLBACK TRANSACTION;".to_string(), cancel)
            .await
    }

    fn execute_non_query(&mut self, _command: &Command) -> Result<NonQueryOutcome, SqlClientError> {
        Err(async_only("execute"))
    }

    async fn execute_non_query_async(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<NonQueryOutcome, SqlClientError> {
        let (client, state) = self.parts()?;
        drive(
            state,
            command.timeout(),
            cancel,
            query::execute_non_query(client, command),
        )
        .await
    }

    fn execute_reader(
        &mut self,
        _command: &Command,
        _behavior: CommandBehavior,
    ) -> Result<Box<dyn DbCursor>, SqlClientError> {
        Err(async_only("execute_reader"))
    }

    async fn execute_reader_async(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn DbCursor>, SqlClientError> {
        let (client, state) = self.parts()?;
        let results = drive(
            state,
            command.timeout(),
            cancel,
            query::execute_reader(client, command),
        )
        .await?;
        Ok(Box::new(BufferedCursor::new(results, behavior)))
    }
}

impl fmt::Debug for MssqlDbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlDbConnection")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_levels_render() {
        assert_eq!(begin_sql(IsolationLevel::Unspecified), "BEGIN TRANSACTION;");
        assert_eq!(
            begin_sql(IsolationLevel::Snapshot),
            "SET TRANSACTION ISOLATION LEVEL SNAPSHOT; BEGIN TRANSACTION;"
        );
    }

    #[test]
    fn blocking_forms_are_rejected() {
        let options =
            MssqlOptions::from_connection_string("Server=tcp:localhost;Database=app").unwrap();
        let mut conn = MssqlDbConnection::new(options);
        assert!(matches!(conn.open(), Err(SqlClientError::Unimplemented(_))));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(conn.close().is_ok());
    }

    #[tokio::test]
    async fn timed_out_request_breaks_the_connection() {
        let mut state = ConnectionState::Open;
        let cancel = CancellationToken::new();
        let result = drive(
            &mut state,
            Some(Duration::from_millis(10)),
            &cancel,
            std::future::pending::<Result<(), SqlClientError>>(),
        )
        .await;
        assert!(matches!(result, Err(SqlClientError::ExecutionError(_))));
        assert_eq!(state, ConnectionState::Broken);
    }

    #[tokio::test]
    async fn cancelled_request_breaks_the_connection() {
        let mut state = ConnectionState::Open;
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let result = drive(
            &mut state,
            None,
            &cancel,
            std::future::pending::<Result<(), SqlClientError>>(),
        )
        .await;
        assert!(matches!(result, Err(SqlClientError::Cancelled)));
        assert_eq!(state, ConnectionState::Broken);
    }

    #[tokio::test]
    async fn completed_request_keeps_the_connection_open() {
        let mut state = ConnectionState::Open;
        let cancel = CancellationToken::new();
        let value = drive(&mut state, None, &cancel, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(state, ConnectionState::Open);
    }

    #[tokio::test]
    async fn abandoned_open_reports_closed() {
        let options =
            MssqlOptions::from_connection_string("Server=tcp:127.0.0.1,1;Database=app").unwrap();
        let mut conn = MssqlDbConnection::new(options);
        let cancel = CancellationToken::new();
        tokio::select! {
            biased;
            _ = conn.open_async(&cancel) => {}
            () = std::future::ready(()) => {}
        }
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
