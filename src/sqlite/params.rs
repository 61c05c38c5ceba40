use rusqlite::Statement;
use rusqlite::types::Value;

use crate::command::Parameter;
use crate::error::SqlClientError;
use crate::types::RowValues;

const SIGILS: [char; 3] = [':', '@', '$'];

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// `SQLite` only has input parameters.
///
/// # Errors
/// Returns `ParameterError` naming the first non-input parameter.
pub fn check_directions(params: &[Parameter]) -> Result<(), SqlClientError> {
    match params.iter().find(|p| p.direction().is_captured()) {
        Some(p) => Err(SqlClientError::ParameterError(format!(
            "SQLite does not support {:?} parameter '{}'",
            p.direction(),
            p.name()
        ))),
        None => Ok(()),
    }
}

/// Bind `params` to one statement of a batch.
///
/// Named parameters bind to `:name`, `@name` or `$name` (or exactly the given
/// name when it carries a sigil); parameters the statement does not mention
/// are skipped. Unnamed parameters fill the statement's `?` slots in order.
///
/// # Errors
/// Returns `ParameterError` if a statement parameter is left without a value.
pub fn bind_parameters(stmt: &mut Statement<'_>, params: &[Parameter]) -> Result<(), SqlClientError> {
    let count = stmt.parameter_count();
    let mut bound = vec![false; count + 1];

    let positional_slots: Vec<usize> = (1..=count)
        .filter(|&idx| stmt.parameter_name(idx).is_none_or(|name| name.starts_with('?')))
        .collect();
    let mut next_slot = positional_slots.iter();

    for param in params {
        let index = if param.name().is_empty() {
            next_slot.next().copied()
        } else {
            named_index(stmt, param.name())?
        };
        if let Some(idx) = index {
            stmt.raw_bind_parameter(idx, row_value_to_sqlite_value(param.value()))?;
            bound[idx] = true;
        }
    }

    if let Some(missing) = (1..=count).find(|&idx| !bound[idx]) {
        let name = stmt
            .parameter_name(missing)
            .map_or_else(|| format!("?{missing}"), str::to_string);
        return Err(SqlClientError::ParameterError(format!(
            "no value supplied for parameter {name}"
        )));
    }
    Ok(())
}

fn named_index(stmt: &Statement<'_>, name: &str) -> Result<Option<usize>, SqlClientError> {
    if name.starts_with(SIGILS) {
        return Ok(stmt.parameter_index(name)?);
    }
    for sigil in SIGILS {
        if let Some(idx) = stmt.parameter_index(&format!("{sigil}{name}"))? {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}
