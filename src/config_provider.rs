//! Key/value settings sourced from a database table.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::SqlClientError;
use crate::factory::DbClientFactory;
use crate::results::CustomDbRow;

const KEY_COLUMN: &str = "key";
const VALUE_COLUMN: &str = "value";

/// Reads a `key`/`value` table through a named client factory and serves the
/// last successfully loaded snapshot.
///
/// Clones share state, so one handle can be refreshed from a timer task or a
/// webhook while others keep calling [`DbConfigurationProvider::get`]. A
/// failed reload leaves the previous snapshot in place and returns the error.
/// When reloads overlap, a read that started earlier never replaces the
/// snapshot of one that started later.
#[derive(Clone)]
pub struct DbConfigurationProvider {
    inner: Arc<Inner>,
}

struct Inner {
    factory: DbClientFactory,
    schema: Option<String>,
    table: String,
    data: RwLock<Snapshot>,
    reads: AtomicU64,
    version: watch::Sender<u64>,
}

type Settings = HashMap<String, (String, String)>;

#[derive(Default)]
struct Snapshot {
    // sequence number of the read that produced `entries`
    read: u64,
    // lowercased key -> (key as stored, value)
    entries: Settings,
}

impl DbConfigurationProvider {
    #[must_use]
    pub fn new(factory: DbClientFactory, schema: Option<String>, table: impl Into<String>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                factory,
                schema,
                table: table.into(),
                data: RwLock::new(Snapshot::default()),
                reads: AtomicU64::new(0),
                version,
            }),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.inner.table
    }

    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.inner.schema.as_deref()
    }

    /// Initial load. Same as [`DbConfigurationProvider::refresh`].
    ///
    /// # Errors
    /// See [`DbConfigurationProvider::refresh`].
    pub fn load(&self) -> Result<(), SqlClientError> {
        self.refresh()
    }

    /// Re-read the table and swap in the new snapshot.
    ///
    /// # Errors
    /// Provider failures, or `ConfigError` if the table lacks a `key` or
    /// `value` column.
    pub fn refresh(&self) -> Result<(), SqlClientError> {
        let read = self.begin_read();
        let mut client = self.inner.factory.create_client()?;
        let mut data = HashMap::new();
        {
            let mut rows = client.enumerate_table_or_view(self.schema_part(), &self.inner.table)?;
            check_columns(rows.column_names())?;
            for row in &mut rows {
                insert_setting(&mut data, &row?)?;
            }
            rows.close()?;
        }
        client.dispose()?;
        self.replace(read, data);
        Ok(())
    }

    /// # Errors
    /// See [`DbConfigurationProvider::refresh`]; also `Cancelled`.
    pub async fn refresh_async(&self, cancel: &CancellationToken) -> Result<(), SqlClientError> {
        let read = self.begin_read();
        let mut client = self.inner.factory.create_client()?;
        let mut data = HashMap::new();
        {
            let mut rows = client
                .enumerate_table_or_view_async(self.schema_part(), &self.inner.table, cancel)
                .await?;
            check_columns(rows.column_names())?;
            while let Some(row) = rows.next_row_async(cancel).await? {
                insert_setting(&mut data, &row)?;
            }
            rows.close()?;
        }
        client.dispose()?;
        self.replace(read, data);
        Ok(())
    }

    /// Value stored under `key`, ignoring case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.read_data()
            .entries
            .get(&key.to_lowercase())
            .map(|(_, value)| value.clone())
    }

    /// Copy of the current snapshot, keyed as stored in the table.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.read_data().entries.values().cloned().collect()
    }

    /// Number of successful loads so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        *self.inner.version.borrow()
    }

    /// Receiver notified after every successful load.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    fn schema_part(&self) -> &str {
        self.inner.schema.as_deref().unwrap_or_default()
    }

    fn read_data(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.inner.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_read(&self) -> u64 {
        self.inner.reads.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Swap in `entries` unless a later read already has. Returns whether the
    /// snapshot changed.
    fn replace(&self, read: u64, entries: Settings) -> bool {
        let count = entries.len();
        {
            let mut data = self.inner.data.write().unwrap_or_else(PoisonError::into_inner);
            if read < data.read {
                tracing::debug!(
                    "discarding settings read {} from {}; read {} is newer",
                    read,
                    self.inner.table,
                    data.read
                );
                return false;
            }
            *data = Snapshot { read, entries };
        }
        self.inner.version.send_modify(|version| *version += 1);
        tracing::debug!(
            "loaded {} settings from {}",
            count,
            self.inner.table
        );
        true
    }
}

fn check_columns(names: &[String]) -> Result<(), SqlClientError> {
    let has = |wanted: &str| names.iter().any(|n| n.eq_ignore_ascii_case(wanted));
    if has(KEY_COLUMN) && has(VALUE_COLUMN) {
        Ok(())
    } else {
        Err(SqlClientError::ConfigError(format!(
            "settings table needs '{KEY_COLUMN}' and '{VALUE_COLUMN}' columns, found {names:?}"
        )))
    }
}

fn insert_setting(
    data: &mut Settings,
    row: &CustomDbRow,
) -> Result<(), SqlClientError> {
    let (Some(key), Some(value)) = (row.get(KEY_COLUMN), row.get(VALUE_COLUMN)) else {
        return Err(SqlClientError::ConfigError(format!(
            "settings rows need '{KEY_COLUMN}' and '{VALUE_COLUMN}' columns, found {:?}",
            row.column_names()
        )));
    };
    // NULL keys and values are not settings.
    if let (Some(key), Some(value)) = (key.to_setting_string(), value.to_setting_string()) {
        data.insert(key.to_lowercase(), (key, value));
    }
    Ok(())
}

impl fmt::Debug for DbConfigurationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfigurationProvider")
            .field("factory", &self.inner.factory)
            .field("schema", &self.inner.schema)
            .field("table", &self.inner.table)
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
