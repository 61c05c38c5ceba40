use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, InterruptHandle};
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;

use super::config::SqliteOptions;
use super::query;
use crate::command::Command;
use crate::error::SqlClientError;
use crate::provider::{DbConnection, DbCursor, NonQueryOutcome, OpeningGuard};
use crate::results::BufferedCursor;
use crate::types::{CommandBehavior, ConnectionState, IsolationLevel};

type SharedSqliteConnection = Arc<Mutex<Option<Connection>>>;

/// A rusqlite connection driven through the provider traits.
///
/// Async forms run the driver call on the blocking pool; cancelling the token
/// interrupts the running statement.
pub struct SqliteDbConnection {
    options: SqliteOptions,
    conn: SharedSqliteConnection,
    interrupt: Option<Arc<InterruptHandle>>,
    state: ConnectionState,
    reset_read_uncommitted: bool,
}

impl SqliteDbConnection {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self {
            options,
            conn: Arc::new(Mutex::new(None)),
            interrupt: None,
            state: ConnectionState::Closed,
            reset_read_uncommitted: false,
        }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    /// Run synchronous `rusqlite` logic against the open connection.
    ///
    /// # Errors
    /// `ConnectionError` if the connection is not open, or whatever `func` returns.
    pub fn with_connection<F, R>(&mut self, func: F) -> Result<R, SqlClientError>
    where
        F: FnOnce(&mut Connection) -> Result<R, SqlClientError>,
    {
        let result = {
            let mut guard = lock(&self.conn)?;
            let conn = guard.as_mut().ok_or_else(not_open)?;
            func(conn)
        };
        self.track(&result);
        result
    }

    /// Run `func` on the blocking pool, interrupting it if `cancel` fires.
    async fn run_blocking<F, R>(
        &mut self,
        cancel: &CancellationToken,
        func: F,
    ) -> Result<R, SqlClientError>
    where
        F: FnOnce(&mut Connection) -> Result<R, SqlClientError> + Send + 'static,
        R: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(SqlClientError::Cancelled);
        }
        let handle = Arc::clone(&self.conn);
        let mut task = spawn_blocking(move || {
            let mut guard = lock(&handle)?;
            let conn = guard.as_mut().ok_or_else(not_open)?;
            func(conn)
        });

        let result = tokio::select! {
            joined = &mut task => joined.map_err(join_error)?,
            () = cancel.cancelled() => {
                if let Some(interrupt) = &self.interrupt {
                    interrupt.interrupt();
                }
                match task.await.map_err(join_error)? {
                    Err(e) if is_interrupted(&e) => Err(SqlClientError::Cancelled),
                    other => other,
                }
            }
        };
        self.track(&result);
        result
    }

    fn opened(&mut self, conn: Connection) -> Result<(), SqlClientError> {
        self.interrupt = Some(Arc::new(conn.get_interrupt_handle()));
        *lock(&self.conn)? = Some(conn);
        self.state = ConnectionState::Open;
        Ok(())
    }

    fn track<R>(&mut self, result: &Result<R, SqlClientError>) {
        if let Err(SqlClientError::ConnectionError(_)) = result {
            if self.state == ConnectionState::Open {
                self.state = ConnectionState::Broken;
            }
        }
    }

    fn begin_sql(&mut self, level: IsolationLevel) -> Result<&'static str, SqlClientError> {
        let sql = match level {
            IsolationLevel::ReadUncommitted => "PRAGMA read_uncommitted = 1; BEGIN DEFERRED;",
            IsolationLevel::Serializable => "BEGIN IMMEDIATE;",
            IsolationLevel::Unspecified
            | IsolationLevel::ReadCommitted
            | IsolationLevel::RepeatableRead => "BEGIN DEFERRED;",
            IsolationLevel::Snapshot => {
                return Err(SqlClientError::Unimplemented(
                    "SQLite does not support snapshot isolation".into(),
                ));
            }
        };
        self.reset_read_uncommitted = level == IsolationLevel::ReadUncommitted;
        Ok(sql)
    }

    fn end_sql(&mut self, verb: &str) -> String {
        if std::mem::take(&mut self.reset_read_uncommitted) {
            format!("{verb}; PRAGMA read_uncommitted = 0;")
        } else {
            format!("{verb};")
        }
    }

    fn busy_timeout(&self, command: &Command) -> BusyTimeout {
        BusyTimeout {
            command: command.timeout(),
            default: self.options.busy_timeout,
        }
    }
}

/// A command timeout applied as the busy timeout for one call.
#[derive(Debug, Clone, Copy)]
struct BusyTimeout {
    command: Option<Duration>,
    default: Duration,
}

impl BusyTimeout {
    fn run<R>(
        self,
        conn: &Connection,
        func: impl FnOnce(&Connection) -> Result<R, SqlClientError>,
    ) -> Result<R, SqlClientError> {
        let Some(timeout) = self.command else {
            return func(conn);
        };
        conn.busy_timeout(timeout)?;
        let result = func(conn);
        conn.busy_timeout(self.default)?;
        result
    }
}

fn open_connection(options: &SqliteOptions) -> Result<Connection, SqlClientError> {
    let conn = Connection::open_with_flags(options.open_path(), options.open_flags())?;
    conn.busy_timeout(options.busy_timeout)?;
    let pragmas = options.init_pragmas();
    if !pragmas.is_empty() {
        conn.execute_batch(&pragmas)?;
    }
    Ok(conn)
}

fn lock(conn: &SharedSqliteConnection) -> Result<MutexGuard<'_, Option<Connection>>, SqlClientError> {
    conn.lock().map_err(|_| {
        SqlClientError::ConnectionError("sqlite connection lock poisoned".into())
    })
}

fn not_open() -> SqlClientError {
    SqlClientError::ConnectionError("sqlite connection is not open".into())
}

fn join_error(e: tokio::task::JoinError) -> SqlClientError {
    SqlClientError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
}

fn is_interrupted(err: &SqlClientError) -> bool {
    matches!(
        err,
        SqlClientError::SqliteError(e) if e.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
    )
}

#[async_trait]
impl DbConnection for SqliteDbConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<(), SqlClientError> {
        let conn = open_connection(&self.options)?;
        self.opened(conn)
    }

    async fn open_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        let options = self.options.clone();
        let conn = {
            let _opening = OpeningGuard::begin(&mut self.state);
            let opening = spawn_blocking(move || open_connection(&options));
            tokio::select! {
                joined = opening => joined.map_err(join_error),
                () = cancel.cancelled() => Err(SqlClientError::Cancelled),
            }
        };
        self.opened(conn.and_then(|c| c)?)
    }

    fn close(&mut self) -> Result<(), SqlClientError> {
        self.interrupt = None;
        self.state = ConnectionState::Closed;
        let conn = lock(&self.conn)?.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| SqlClientError::SqliteError(e))?;
        }
        Ok(())
    }

    fn begin_transaction(&mut self, level: IsolationLevel) -> Result<(), SqlClientError> {
        let sql = self.begin_sql(level)?;
        self.with_connection(|conn| Ok(conn.execute_batch(sql)?))
    }

    async fn begin_transaction_async(
        &mut self,
        level: IsolationLevel,
        cancel: &CancellationToken,
    ) -> Result<(), SqlClientError> {
        let sql = self.begin_sql(level)?;
        self.run_blocking(cancel, move |conn| Ok(conn.execute_batch(sql)?))
            .await
    }

    fn commit(&mut self) -> Result<(), SqlClientError> {
        let sql = self.end_sql("COMMIT");
        self.with_connection(|conn| Ok(conn.execute_batch(&sql)?))
    }

    async fn commit_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        let sql = self.end_sql("COMMIT");
        self.run_blocking(cancel, move |conn| Ok(conn.execute_batch(&sql)?))
            .await
    }

    fn rollback(&mut self) -> Result<(), SqlClientError> {
        let sql = self.end_sql("ROLLBACK");
        self.with_connection(|conn| Ok(conn.execute_batch(&sql)?))
    }

    async fn rollback_async(&mut self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        let sql = self.end_sql("ROLLBACK");
        self.run_blocking(cancel, move |conn| Ok(conn.execute_batch(&sql)?))
            .await
    }

    fn execute_non_query(&mut self, command: &Command) -> Result<NonQueryOutcome, SqlClientError> {
        let timeout = self.busy_timeout(command);
        self.with_connection(|conn| {
            timeout.run(conn, |conn| query::execute_non_query(conn, command))
        })
    }

    async fn execute_non_query_async(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<NonQueryOutcome, SqlClientError> {
        let timeout = self.busy_timeout(command);
        let command = command.clone();
        self.run_blocking(cancel, move |conn| {
            timeout.run(conn, |conn| query::execute_non_query(conn, &command))
        })
        .await
    }

    fn execute_reader(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
    ) -> Result<Box<dyn DbCursor>, SqlClientError> {
        let timeout = self.busy_timeout(command);
        let results = self.with_connection(|conn| {
            timeout.run(conn, |conn| {
                query::execute_reader(conn, command, behavior)
            })
        })?;
        Ok(Box::new(BufferedCursor::new(results, behavior)))
    }

    async fn execute_reader_async(
        &mut self,
        command: &Command,
        behavior: CommandBehavior,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn DbCursor>, SqlClientError> {
        let timeout = self.busy_timeout(command);
        let command = command.clone();
        let results = self
            .run_blocking(cancel, move |conn| {
                timeout.run(conn, |conn| {
                    query::execute_reader(conn, &command, behavior)
                })
            })
            .await?;
        Ok(Box::new(BufferedCursor::new(results, behavior)))
    }
}

impl fmt::Debug for SqliteDbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDbConnection")
            .field("db_path", &self.options.db_path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
