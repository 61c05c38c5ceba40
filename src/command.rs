use std::time::Duration;

use crate::types::RowValues;

/// Whether a command's text is SQL, a stored-procedure name, or a table reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    #[default]
    Text,
    StoredProcedure,
    TableDirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the provider reports a value for this parameter after execution.
    #[must_use]
    pub fn is_captured(self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }

    /// Whether the parameter's value is sent to the server.
    #[must_use]
    pub fn sends_value(self) -> bool {
        matches!(
            self,
            ParameterDirection::Input | ParameterDirection::InputOutput
        )
    }
}

/// A named, directed value bound to a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    direction: ParameterDirection,
    value: RowValues,
    provider_type: Option<String>,
}

impl Parameter {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        direction: ParameterDirection,
        value: impl Into<RowValues>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            value: value.into(),
            provider_type: None,
        }
    }

    #[must_use]
    pub fn input(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self::new(name, ParameterDirection::Input, value)
    }

    /// Positional input parameter (no name).
    #[must_use]
    pub fn positional(value: impl Into<RowValues>) -> Self {
        Self::new(String::new(), ParameterDirection::Input, value)
    }

    #[must_use]
    pub fn output(name: impl Into<String>, provider_type: impl Into<String>) -> Self {
        Self::new(name, ParameterDirection::Output, RowValues::Null).with_provider_type(provider_type)
    }

    #[must_use]
    pub fn input_output(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self::new(name, ParameterDirection::InputOutput, value)
    }

    #[must_use]
    pub fn return_value() -> Self {
        Self::new("return_value", ParameterDirection::ReturnValue, RowValues::Null)
    }

    /// Provider-specific type name (for example `nvarchar(50)`), used where a
    /// provider has to declare the parameter.
    #[must_use]
    pub fn with_provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = Some(provider_type.into());
        self
    }

    /// Copy of this parameter carrying a value reported by the provider.
    #[must_use]
    pub fn with_value(&self, value: RowValues) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without a leading `@`, `:` or `$` sigil.
    #[must_use]
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches(['@', ':', '$'])
    }

    #[must_use]
    pub fn direction(&self) -> ParameterDirection {
        self.direction
    }

    #[must_use]
    pub fn value(&self) -> &RowValues {
        &self.value
    }

    #[must_use]
    pub fn provider_type(&self) -> Option<&str> {
        self.provider_type.as_deref()
    }
}

/// An immutable description of a statement to run.
///
/// ```rust
/// use std::time::Duration;
/// use sql_facade::prelude::*;
///
/// let cmd = Command::text("UPDATE t SET a = :a WHERE id = :id")
///     .with_timeout(Duration::from_secs(5))
///     .with_parameter(Parameter::input(":a", 10))
///     .with_parameter(Parameter::input(":id", 1));
/// assert_eq!(cmd.kind(), CommandKind::Text);
/// assert_eq!(cmd.parameters().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    text: String,
    kind: CommandKind,
    timeout: Option<Duration>,
    parameters: Vec<Parameter>,
}

impl Command {
    #[must_use]
    pub fn new(text: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            text: text.into(),
            kind,
            timeout: None,
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, CommandKind::Text)
    }

    #[must_use]
    pub fn stored_procedure(name: impl Into<String>) -> Self {
        Self::new(name, CommandKind::StoredProcedure)
    }

    #[must_use]
    pub fn table_direct(table: impl Into<String>) -> Self {
        Self::new(table, CommandKind::TableDirect)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    #[must_use]
    pub fn command_text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}
