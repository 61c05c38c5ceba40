//! Rendering a [`Command`] into one T-SQL batch.
//!
//! tiberius only binds positional `@P1..@Pn` values, so named parameters are
//! declared as local variables initialised from those values, stored
//! procedures are wrapped in `EXEC @__rv = …`, and for non-queries that
//! capture values a trailing `SELECT` reads the row count, return value and
//! output variables back.

use std::fmt::Write;

use crate::command::{Command, CommandKind, Parameter, ParameterDirection};
use crate::error::SqlClientError;
use crate::types::RowValues;

pub const ROWS_AFFECTED_COLUMN: &str = "__rows_affected";
pub const RETURN_VALUE_COLUMN: &str = "__return_value";
const RETURN_VALUE_VARIABLE: &str = "@__rv";

/// Where a captured parameter's value appears in the trailing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub parameter: Parameter,
    pub column: usize,
}

/// SQL text plus the values to bind as `@P1..@Pn`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBatch {
    pub sql: String,
    pub values: Vec<RowValues>,
    /// Captured parameters, in command order. Empty when the batch has no trailer.
    pub captures: Vec<Capture>,
}

impl RenderedBatch {
    /// Whether the batch ends with the capture `SELECT`.
    #[must_use]
    pub fn has_trailer(&self) -> bool {
        !self.captures.is_empty()
    }
}

/// T-SQL type used to declare a parameter without a provider type.
#[must_use]
pub fn infer_sql_type(value: &RowValues) -> &'static str {
    match value {
        RowValues::Int(_) => "bigint",
        RowValues::Float(_) => "float",
        RowValues::Text(_) | RowValues::JSON(_) => "nvarchar(max)",
        RowValues::Bool(_) => "bit",
        RowValues::Timestamp(_) => "datetime2",
        RowValues::Blob(_) => "varbinary(max)",
        RowValues::Null => "sql_variant",
    }
}

/// Render `command`. `non_query` adds the capture trailer when the command
/// has output or return-value parameters.
///
/// # Errors
/// `ParameterError` for invalid or duplicate names and unsafe type names.
pub fn render_batch(command: &Command, non_query: bool) -> Result<RenderedBatch, SqlClientError> {
    let mut sql = String::new();
    let mut values = Vec::new();
    let mut positional = Vec::new();
    let mut named: Vec<(&Parameter, &str)> = Vec::new();
    let mut captured: Vec<&Parameter> = Vec::new();

    let is_procedure = command.kind() == CommandKind::StoredProcedure;
    let wants_trailer = non_query
        && command
            .parameters()
            .iter()
            .any(|p| p.direction().is_captured());

    if wants_trailer || is_procedure {
        let _ = writeln!(sql, "DECLARE {RETURN_VALUE_VARIABLE} int;");
    }

    for param in command.parameters() {
        if param.name().is_empty() {
            if param.direction() != ParameterDirection::Input {
                return Err(SqlClientError::ParameterError(
                    "unnamed parameters must be input parameters".into(),
                ));
            }
            values.push(param.value().clone());
            positional.push(format!("@P{}", values.len()));
            continue;
        }
        if param.direction() == ParameterDirection::ReturnValue {
            captured.push(param);
            continue;
        }

        let name = checked_name(param)?;
        if named.iter().any(|(_, n)| n.eq_ignore_ascii_case(name)) {
            return Err(SqlClientError::ParameterError(format!(
                "parameter @{name} is given more than once"
            )));
        }
        let sql_type = checked_type(param)?;
        if param.direction().sends_value() {
            values.push(param.value().clone());
            let _ = writeln!(sql, "DECLARE @{name} {sql_type} = @P{};", values.len());
        } else {
            let _ = writeln!(sql, "DECLARE @{name} {sql_type};");
        }
        if param.direction().is_captured() {
            captured.push(param);
        }
        named.push((param, name));
    }

    match command.kind() {
        CommandKind::Text => sql.push_str(command.command_text()),
        CommandKind::TableDirect => {
            let _ = write!(sql, "SELECT * FROM {}", command.command_text());
        }
        CommandKind::StoredProcedure => {
            let _ = write!(
                sql,
                "EXEC {RETURN_VALUE_VARIABLE} = {}",
                command.command_text()
            );
            let args = positional.iter().cloned().chain(named.iter().map(|(p, name)| {
                if p.direction().is_captured() {
                    format!("@{name} = @{name} OUTPUT")
                } else {
                    format!("@{name} = @{name}")
                }
            }));
            let args: Vec<String> = args.collect();
            if !args.is_empty() {
                sql.push(' ');
                sql.push_str(&args.join(", "));
            }
        }
    }

    let mut captures = Vec::new();
    if wants_trailer {
        let _ = write!(
            sql,
            ";\nSELECT CAST(@@ROWCOUNT AS bigint) AS [{ROWS_AFFECTED_COLUMN}], {RETURN_VALUE_VARIABLE} AS [{RETURN_VALUE_COLUMN}]"
        );
        let mut column = 2;
        for param in captured {
            if param.direction() == ParameterDirection::ReturnValue {
                captures.push(Capture {
                    parameter: param.clone(),
                    column: 1,
                });
            } else {
                let name = param.bare_name();
                let _ = write!(sql, ", @{name} AS [{name}]");
                captures.push(Capture {
                    parameter: param.clone(),
                    column,
                });
                column += 1;
            }
        }
        sql.push(';');
    }

    Ok(RenderedBatch {
        sql,
        values,
        captures,
    })
}

fn checked_name(param: &Parameter) -> Result<&str, SqlClientError> {
    let name = param.bare_name();
    let valid = !name.is_empty()
        && !name.starts_with("__")
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(SqlClientError::ParameterError(format!(
            "'{}' is not a usable parameter name",
            param.name()
        )))
    }
}

fn checked_type(param: &Parameter) -> Result<&str, SqlClientError> {
    let Some(sql_type) = param.provider_type() else {
        return Ok(infer_sql_type(param.value()));
    };
    let valid = !sql_type.is_empty()
        && sql_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | ','));
    if valid {
        Ok(sql_type)
    } else {
        Err(SqlClientError::ParameterError(format!(
            "'{sql_type}' is not a usable type for parameter '{}'",
            param.name()
        )))
    }
}
