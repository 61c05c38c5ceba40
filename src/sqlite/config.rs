use std::time::Duration;

use rusqlite::OpenFlags;

use crate::connection_string::ConnectionStringBuilder;
use crate::error::SqlClientError;

/// Busy timeout applied when the connection string sets none.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DATA_SOURCE_KEYS: [&str; 3] = ["Data Source", "DataSource", "Filename"];
const IGNORED_KEYS: [&str; 2] = ["Pooling", "Persist Security Info"];

/// How the database file is opened (`Mode=` key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteOpenMode {
    ReadOnly,
    ReadWrite,
    #[default]
    ReadWriteCreate,
    Memory,
}

/// Options for opening a `SQLite` connection, read from an ADO-style string.
///
/// Recognized keys: `Data Source` (or `DataSource`, `Filename`), `Mode`,
/// `Cache`, `Foreign Keys`, `Recursive Triggers`, `Default Timeout` (seconds)
/// and `Pooling` (ignored).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    pub db_path: String,
    pub mode: SqliteOpenMode,
    pub shared_cache: Option<bool>,
    pub foreign_keys: Option<bool>,
    pub recursive_triggers: Option<bool>,
    pub busy_timeout: Duration,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            mode: SqliteOpenMode::default(),
            shared_cache: None,
            foreign_keys: None,
            recursive_triggers: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// # Errors
    /// Returns `SqlClientError::ConfigError` for a malformed string, a missing
    /// data source, an unknown key, or an invalid value.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, SqlClientError> {
        let builder = ConnectionStringBuilder::parse(connection_string)?;
        Self::from_builder(&builder)
    }

    /// # Errors
    /// See [`SqliteOptions::from_connection_string`].
    pub fn from_builder(builder: &ConnectionStringBuilder) -> Result<Self, SqlClientError> {
        let mut options = Self::new(String::new());
        let mut has_source = false;

        for (key, value) in builder.iter() {
            if DATA_SOURCE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                options.db_path = value.to_string();
                has_source = true;
            } else if key.eq_ignore_ascii_case("Mode") {
                options.mode = parse_mode(value)?;
            } else if key.eq_ignore_ascii_case("Cache") {
                options.shared_cache = match value.to_ascii_lowercase().as_str() {
                    "default" => None,
                    "shared" => Some(true),
                    "private" => Some(false),
                    _ => return Err(invalid(key, value)),
                };
            } else if key.eq_ignore_ascii_case("Foreign Keys") {
                options.foreign_keys = Some(parse_bool(key, value)?);
            } else if key.eq_ignore_ascii_case("Recursive Triggers") {
                options.recursive_triggers = Some(parse_bool(key, value)?);
            } else if key.eq_ignore_ascii_case("Default Timeout") {
                let seconds: u64 = value.parse().map_err(|_| invalid(key, value))?;
                options.busy_timeout = Duration::from_secs(seconds);
            } else if key.eq_ignore_ascii_case("Password") {
                if !value.is_empty() {
                    return Err(SqlClientError::ConfigError(
                        "encrypted SQLite databases are not supported".into(),
                    ));
                }
            } else if !IGNORED_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                return Err(SqlClientError::ConfigError(format!(
                    "unsupported SQLite connection string key '{key}'"
                )));
            }
        }

        if !has_source && options.mode != SqliteOpenMode::Memory {
            return Err(SqlClientError::ConfigError(
                "SQLite connection string needs a 'Data Source'".into(),
            ));
        }
        Ok(options)
    }

    /// Flags passed to `Connection::open_with_flags`.
    #[must_use]
    pub fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        flags |= match self.mode {
            SqliteOpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            SqliteOpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            SqliteOpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
            SqliteOpenMode::Memory => {
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_MEMORY
            }
        };
        match self.shared_cache {
            Some(true) => flags |= OpenFlags::SQLITE_OPEN_SHARED_CACHE,
            Some(false) => flags |= OpenFlags::SQLITE_OPEN_PRIVATE_CACHE,
            None => {}
        }
        flags
    }

    /// Path handed to `SQLite`; an in-memory database with no name opens `:memory:`.
    #[must_use]
    pub fn open_path(&self) -> &str {
        if self.db_path.is_empty() {
            ":memory:"
        } else {
            &self.db_path
        }
    }

    /// Pragmas run right after opening.
    #[must_use]
    pub fn init_pragmas(&self) -> String {
        let mut sql = String::new();
        if let Some(on) = self.foreign_keys {
            sql.push_str(&format!("PRAGMA foreign_keys = {};", u8::from(on)));
        }
        if let Some(on) = self.recursive_triggers {
            sql.push_str(&format!("PRAGMA recursive_triggers = {};", u8::from(on)));
        }
        sql
    }
}

fn parse_mode(value: &str) -> Result<SqliteOpenMode, SqlClientError> {
    match value.to_ascii_lowercase().as_str() {
        "readonly" => Ok(SqliteOpenMode::ReadOnly),
        "readwrite" => Ok(SqliteOpenMode::ReadWrite),
        "readwritecreate" => Ok(SqliteOpenMode::ReadWriteCreate),
        "memory" => Ok(SqliteOpenMode::Memory),
        _ => Err(invalid("Mode", value)),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SqlClientError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> SqlClientError {
    SqlClientError::ConfigError(format!("invalid value '{value}' for '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_known_keys() {
        let options = SqliteOptions::from_connection_string(
            "Data Source=app.db;Mode=ReadOnly;Cache=Shared;Foreign Keys=True;Default Timeout=30",
        )
        .unwrap();
        assert_eq!(options.db_path, "app.db");
        assert_eq!(options.mode, SqliteOpenMode::ReadOnly);
        assert_eq!(options.shared_cache, Some(true));
        assert_eq!(options.foreign_keys, Some(true));
        assert_eq!(options.busy_timeout, Duration::from_secs(30));
        assert!(options.open_flags().contains(OpenFlags::SQLITE_OPEN_READ_ONLY));
        assert!(!options.open_flags().contains(OpenFlags::SQLITE_OPEN_CREATE));
        assert_eq!(options.init_pragmas(), "PRAGMA foreign_keys = 1;");
    }

    #[test]
    fn memory_mode_needs_no_source() {
        let options = SqliteOptions::from_connection_string("Mode=Memory").unwrap();
        assert_eq!(options.open_path(), ":memory:");
        assert!(options.open_flags().contains(OpenFlags::SQLITE_OPEN_MEMORY));
    }

    #[test]
    fn rejects_missing_source_and_unknown_keys() {
        assert!(matches!(
            SqliteOptions::from_connection_string("Mode=ReadWrite"),
            Err(SqlClientError::ConfigError(_))
        ));
        assert!(matches!(
            SqliteOptions::from_connection_string("Data Source=a.db;Journal=WAL"),
            Err(SqlClientError::ConfigError(msg)) if msg.contains("Journal")
        ));
        assert!(matches!(
            SqliteOptions::from_connection_string("Data Source=a.db;Mode=sideways"),
            Err(SqlClientError::ConfigError(_))
        ));
    }
}
