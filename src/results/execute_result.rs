use crate::command::{Parameter, ParameterDirection};
use crate::error::SqlClientError;
use crate::provider::NonQueryOutcome;
use crate::types::RowValues;

/// Outcome of a non-query: a result code plus the captured output parameters.
///
/// The code is the affected-row count unless a return-value parameter was
/// reported, in which case it is that parameter's value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteResult {
    code: i64,
    output_parameters: Vec<Parameter>,
}

impl ExecuteResult {
    /// Map a provider outcome into a result.
    ///
    /// A `NULL` return value counts as 0.
    ///
    /// # Errors
    /// Returns `SqlClientError::ParameterError` if the return value is not an integer.
    pub fn from_outcome(outcome: NonQueryOutcome) -> Result<Self, SqlClientError> {
        let output_parameters: Vec<Parameter> = outcome
            .parameters
            .into_iter()
            .filter(|p| p.direction().is_captured())
            .collect();

        let code = match output_parameters
            .iter()
            .find(|p| p.direction() == ParameterDirection::ReturnValue)
        {
            Some(ret) => match ret.value() {
                RowValues::Int(i) => *i,
                RowValues::Bool(b) => i64::from(*b),
                RowValues::Null => 0,
                other => {
                    return Err(SqlClientError::ParameterError(format!(
                        "return value '{}' is not an integer: {other:?}",
                        ret.name()
                    )));
                }
            },
            None => outcome.rows_affected,
        };

        Ok(Self {
            code,
            output_parameters,
        })
    }

    #[must_use]
    pub fn code(&self) -> i64 {
        self.code
    }

    #[must_use]
    pub fn output_parameters(&self) -> &[Parameter] {
        &self.output_parameters
    }

    /// Output parameter by name, ignoring case and any leading sigil.
    #[must_use]
    pub fn output_parameter(&self, name: &str) -> Option<&Parameter> {
        let wanted = name.trim_start_matches(['@', ':', '$']);
        self.output_parameters
            .iter()
            .find(|p| p.bare_name().eq_ignore_ascii_case(wanted))
    }
}
