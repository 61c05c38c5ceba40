use std::fmt;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Values carried by parameters and by result rows.
///
/// The same enum is used for every provider so calling code never has to
/// branch on driver types:
/// ```rust
/// use sql_facade::prelude::*;
///
/// let params = vec![
///     Parameter::input("id", 1),
///     Parameter::input("name", "alice"),
///     Parameter::input("active", true),
/// ];
/// assert_eq!(params[0].value(), &RowValues::Int(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Booleans also accept the integer encodings 0 and 1 used by `SQLite`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(1) => Some(true),
            RowValues::Int(0) => Some(false),
            _ => None,
        }
    }

    /// Timestamps stored as text are accepted in `YYYY-MM-DD HH:MM:SS[.fff]` form.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Render the value as configuration text: `NULL` becomes `None`, text is
    /// returned as-is, everything else uses its natural display form.
    #[must_use]
    pub fn to_setting_string(&self) -> Option<String> {
        match self {
            RowValues::Null => None,
            RowValues::Text(s) => Some(s.clone()),
            RowValues::Int(i) => Some(i.to_string()),
            RowValues::Float(f) => Some(f.to_string()),
            RowValues::Bool(b) => Some(b.to_string()),
            RowValues::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            RowValues::JSON(json) => Some(json.to_string()),
            RowValues::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Built-in providers, parsed from the `type` key of a connection entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ProviderKind {
    /// `SQLite` through rusqlite
    #[cfg(feature = "sqlite")]
    #[value(alias = "rusqlite")]
    Sqlite,
    /// SQL Server through tiberius
    #[cfg(feature = "mssql")]
    #[value(aliases = ["sqlserver", "tiberius"])]
    Mssql,
}

/// Connection state as reported by a provider.
///
/// The client only inspects it: `Closed` and `Broken` trigger an open,
/// `Open` and `Connecting` are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Broken,
}

impl ConnectionState {
    #[must_use]
    pub fn needs_open(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Broken)
    }
}

/// Locking/visibility contract requested for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Let the provider pick its default
    #[default]
    Unspecified,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::Unspecified => "Unspecified",
            IsolationLevel::ReadUncommitted => "ReadUncommitted",
            IsolationLevel::ReadCommitted => "ReadCommitted",
            IsolationLevel::RepeatableRead => "RepeatableRead",
            IsolationLevel::Serializable => "Serializable",
            IsolationLevel::Snapshot => "Snapshot",
        };
        f.write_str(name)
    }
}

/// How a reader cursor should be produced.
///
/// Flags combine with `|`:
/// ```rust
/// use sql_facade::prelude::*;
///
/// let behavior = CommandBehavior::SINGLE_RESULT | CommandBehavior::SEQUENTIAL_ACCESS;
/// assert!(behavior.single_result());
/// assert!(!behavior.single_row());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBehavior(u8);

impl CommandBehavior {
    pub const DEFAULT: CommandBehavior = CommandBehavior(0);
    /// Only the first result set is produced.
    pub const SINGLE_RESULT: CommandBehavior = CommandBehavior(1);
    /// Only the first row of the first result set is produced.
    pub const SINGLE_ROW: CommandBehavior = CommandBehavior(1 << 1);
    /// Columns are read in ordinal order, once.
    pub const SEQUENTIAL_ACCESS: CommandBehavior = CommandBehavior(1 << 2);

    #[must_use]
    pub fn contains(self, other: CommandBehavior) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn single_result(self) -> bool {
        self.contains(Self::SINGLE_RESULT) || self.single_row()
    }

    #[must_use]
    pub fn single_row(self) -> bool {
        self.contains(Self::SINGLE_ROW)
    }

    #[must_use]
    pub fn sequential_access(self) -> bool {
        self.contains(Self::SEQUENTIAL_ACCESS)
    }
}

impl std::ops::BitOr for CommandBehavior {
    type Output = CommandBehavior;

    fn bitor(self, rhs: Self) -> Self::Output {
        CommandBehavior(self.0 | rhs.0)
    }
}
