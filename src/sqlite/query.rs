use std::borrow::Cow;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::types::Value;
use rusqlite::{Batch, Connection};

use super::params::{bind_parameters, check_directions};
use crate::command::{Command, CommandKind};
use crate::error::SqlClientError;
use crate::provider::{FieldInfo, NonQueryOutcome};
use crate::results::BufferedResult;
use crate::types::{CommandBehavior, RowValues};

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqlClientError` if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, SqlClientError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// SQL to run for `command`.
///
/// # Errors
/// `Unimplemented` for stored procedures, `ParameterError` for non-input parameters.
pub fn statement_text(command: &Command) -> Result<Cow<'_, str>, SqlClientError> {
    check_directions(command.parameters())?;
    match command.kind() {
        CommandKind::Text => Ok(Cow::Borrowed(command.command_text())),
        CommandKind::TableDirect => Ok(Cow::Owned(format!(
            "SELECT * FROM {}",
            command.command_text()
        ))),
        CommandKind::StoredProcedure => Err(SqlClientError::Unimplemented(
            "SQLite does not support stored procedures".into(),
        )),
    }
}

/// Run every statement of `command` and total the rows they changed.
///
/// `rows_affected` stays -1 when no statement could modify rows.
///
/// # Errors
/// The first failing statement's error; earlier statements stay applied.
pub fn execute_non_query(
    conn: &Connection,
    command: &Command,
) -> Result<NonQueryOutcome, SqlClientError> {
    let sql = statement_text(command)?;
    let mut rows_affected: i64 = -1;
    let mut before = total_changes(conn)?;

    let mut batch = Batch::new(conn, &sql);
    while let Some(mut stmt) = batch.next()? {
        bind_parameters(&mut stmt, command.parameters())?;
        let writes = !stmt.readonly();
        if stmt.column_count() == 0 {
            stmt.raw_execute()?;
        } else {
            let mut rows = stmt.raw_query();
            while rows.next()?.is_some() {}
        }
        if writes {
            let after = total_changes(conn)?;
            rows_affected = rows_affected.max(0) + (after - before);
            before = after;
        }
    }

    Ok(NonQueryOutcome::rows(rows_affected))
}

/// Run `command`, buffering one result per row-returning statement.
///
/// With `SINGLE_RESULT` the batch stops after the first result; later
/// statements are not run.
///
/// # Errors
/// The first failing statement's error.
pub fn execute_reader(
    conn: &Connection,
    command: &Command,
    behavior: CommandBehavior,
) -> Result<Vec<BufferedResult>, SqlClientError> {
    let sql = statement_text(command)?;
    let mut results = Vec::new();

    let mut batch = Batch::new(conn, &sql);
    while let Some(mut stmt) = batch.next()? {
        bind_parameters(&mut stmt, command.parameters())?;
        let column_count = stmt.column_count();
        if column_count == 0 {
            stmt.raw_execute()?;
            continue;
        }

        let fields = stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                FieldInfo::new(column.name(), column.decl_type().map(str::to_string), i)
            })
            .collect();
        let mut result = BufferedResult::new(fields, Vec::new());

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(sqlite_extract_value_sync(row, i)?);
            }
            result.rows.push_back(values);
            if behavior.single_row() {
                break;
            }
        }
        results.push(result);

        if behavior.single_result() {
            break;
        }
    }

    Ok(results)
}

fn total_changes(conn: &Connection) -> Result<i64, SqlClientError> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}
