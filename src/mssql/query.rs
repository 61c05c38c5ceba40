use chrono::NaiveDateTime;
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{Query, QueryItem};

use super::config::MssqlClient;
use super::params::{RenderedBatch, render_batch};
use crate::command::Command;
use crate::error::SqlClientError;
use crate::provider::{FieldInfo, NonQueryOutcome};
use crate::results::BufferedResult;
use crate::types::RowValues;

/// Run `command` as a non-query.
///
/// Without captured parameters the affected rows are summed over every
/// statement. With them, the count is the last statement's `@@ROWCOUNT` and
/// captured values are read from the trailing row.
///
/// # Errors
/// Parameter rendering failures or the driver's error.
pub async fn execute_non_query(
    client: &mut MssqlClient,
    command: &Command,
) -> Result<NonQueryOutcome, SqlClientError> {
    let batch = render_batch(command, true)?;
    if !batch.has_trailer() {
        let result = bind_query_params(&batch).execute(client).await?;
        let rows: u64 = result.rows_affected().iter().sum();
        return Ok(NonQueryOutcome::rows(convert_affected_rows(rows)?));
    }

    let results = bind_query_params(&batch)
        .query(client)
        .await?
        .into_results()
        .await?;
    let trailer = results
        .last()
        .and_then(|rows| rows.first())
        .ok_or_else(|| {
            SqlClientError::ExecutionError("SQL Server batch returned no output row".into())
        })?;

    let rows_affected = match extract_value(trailer, 0)? {
        RowValues::Int(n) => n,
        _ => -1,
    };
    let mut parameters = Vec::with_capacity(batch.captures.len());
    for capture in &batch.captures {
        let value = extract_value(trailer, capture.column)?;
        parameters.push(capture.parameter.with_value(value));
    }
    Ok(NonQueryOutcome {
        rows_affected,
        parameters,
    })
}

/// Run `command` and buffer every result set it produces.
///
/// # Errors
/// Parameter rendering failures or the driver's error.
pub async fn execute_reader(
    client: &mut MssqlClient,
    command: &Command,
) -> Result<Vec<BufferedResult>, SqlClientError> {
    let batch = render_batch(command, false)?;
    let mut stream = bind_query_params(&batch).query(client).await?;
    let mut results: Vec<BufferedResult> = Vec::new();

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                let fields = meta
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        FieldInfo::new(col.name(), Some(format!("{:?}", col.column_type())), i)
                    })
                    .collect();
                results.push(BufferedResult::new(fields, Vec::new()));
            }
            QueryItem::Row(row) => {
                let Some(current) = results.last_mut() else {
                    return Err(SqlClientError::ExecutionError(
                        "SQL Server sent a row before its metadata".into(),
                    ));
                };
                let mut values = Vec::with_capacity(current.fields.len());
                for idx in 0..current.fields.len() {
                    values.push(extract_value(&row, idx)?);
                }
                current.rows.push_back(values);
            }
        }
    }
    Ok(results)
}

/// Run transaction-control text as a plain SQL batch.
///
/// # Errors
/// The driver's error.
pub async fn execute_simple(client: &mut MssqlClient, sql: &str) -> Result<(), SqlClientError> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}

/// Extract a value from a row at a specific index
fn extract_value(row: &tiberius::Row, idx: usize) -> Result<RowValues, SqlClientError> {
    if let Ok(Some(val)) = row.try_get::<u8, _>(idx) {
        return Ok(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<i16, _>(idx) {
        return Ok(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return Ok(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return Ok(RowValues::Int(val));
    }

    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return Ok(RowValues::Float(f64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return Ok(RowValues::Float(val));
    }
    if let Ok(Some(val)) = row.try_get::<Numeric, _>(idx) {
        return Ok(RowValues::Float(f64::from(val)));
    }

    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return Ok(RowValues::Bool(val));
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return Ok(RowValues::Timestamp(val));
    }

    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return Ok(RowValues::Text(val.to_string()));
    }

    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return Ok(RowValues::Blob(val.to_vec()));
    }

    // NULL of any type, or a type with no RowValues counterpart
    Ok(RowValues::Null)
}

/// Bind the rendered values to `@P1..@Pn`.
fn bind_query_params(batch: &RenderedBatch) -> Query<'_> {
    let mut query_builder = Query::new(batch.sql.as_str());

    for param in &batch.values {
        match param {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.as_str()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => query_builder.bind(*dt),
            RowValues::Null => query_builder.bind(Option::<&str>::None),
            RowValues::JSON(jsval) => query_builder.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query_builder.bind(bytes.as_slice()),
        }
    }

    query_builder
}

fn convert_affected_rows(rows: u64) -> Result<i64, SqlClientError> {
    i64::try_from(rows).map_err(|e| {
        SqlClientError::ExecutionError(format!("SQL Server affected rows conversion error: {e}"))
    })
}
