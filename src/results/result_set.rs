use std::marker::PhantomData;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::row::{ColumnIndex, CustomDbRow};
use crate::error::SqlClientError;
use crate::provider::{DbCursor, FieldInfo};
use crate::types::RowValues;

/// Field metadata plus the name map, shared by the rows of one result set.
#[derive(Debug, Clone)]
struct RowShape {
    fields: Arc<Vec<FieldInfo>>,
    columns: Arc<ColumnIndex>,
}

impl RowShape {
    fn of(cursor: &dyn DbCursor) -> Self {
        let fields = cursor.fields().to_vec();
        let columns = ColumnIndex::from_fields(&fields);
        Self {
            fields: Arc::new(fields),
            columns: Arc::new(columns),
        }
    }

    fn materialize(&self, values: Vec<RowValues>) -> Result<CustomDbRow, SqlClientError> {
        if values.len() != self.fields.len() {
            return Err(SqlClientError::ExecutionError(format!(
                "row has {} values but the result set has {} fields",
                values.len(),
                self.fields.len()
            )));
        }
        Ok(CustomDbRow::new(Arc::clone(&self.columns), values))
    }
}

/// One result batch of a cursor, read lazily row by row.
///
/// Borrowing the reader means a result set cannot be touched once the next
/// one has been requested. Rows already yielded are owned and stay valid.
pub struct ResultSet<'r> {
    cursor: &'r mut dyn DbCursor,
    shape: RowShape,
    exhausted: bool,
}

impl<'r> ResultSet<'r> {
    fn new(cursor: &'r mut dyn DbCursor) -> Self {
        let shape = RowShape::of(cursor);
        Self {
            cursor,
            shape,
            exhausted: false,
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.shape.fields
    }

    /// Column names after duplicate disambiguation.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.shape.columns.names()
    }

    /// Case-insensitive ordinal lookup.
    #[must_use]
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.shape.columns.ordinal(name)
    }

    /// # Errors
    /// Provider failures while reading, or `CursorClosed`.
    pub fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlClientError> {
        if self.exhausted {
            return Ok(None);
        }
        match self.cursor.read()? {
            Some(values) => self.shape.materialize(values).map(Some),
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// # Errors
    /// Provider failures while reading, `CursorClosed`, or `Cancelled`.
    pub async fn next_row_async(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<CustomDbRow>, SqlClientError> {
        if self.exhausted {
            return Ok(None);
        }
        match self.cursor.read_async(cancel).await? {
            Some(values) => self.shape.materialize(values).map(Some),
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Drain the remaining rows.
    ///
    /// # Errors
    /// The first read failure.
    pub fn collect_rows(&mut self) -> Result<Vec<CustomDbRow>, SqlClientError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// # Errors
    /// The first read failure.
    pub async fn collect_rows_async(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<CustomDbRow>, SqlClientError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row_async(cancel).await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Iterator for ResultSet<'_> {
    type Item = Result<CustomDbRow, SqlClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

/// Owner of a live cursor returned by `execute_reader`.
///
/// The lifetime ties the reader to the client that produced it, so the client
/// can neither run another command nor be disposed while the cursor is open.
/// Dropping the reader closes the cursor.
pub struct ResultSetReader<'c> {
    cursor: Box<dyn DbCursor>,
    started: bool,
    finished: bool,
    _client: PhantomData<&'c mut ()>,
}

impl<'c> ResultSetReader<'c> {
    #[must_use]
    pub fn from_cursor(cursor: Box<dyn DbCursor>) -> Self {
        Self {
            cursor,
            started: false,
            finished: false,
            _client: PhantomData,
        }
    }

    /// The next result set in cursor order, or `None` once the cursor has no
    /// more results.
    ///
    /// # Errors
    /// Provider failures while advancing, or `CursorClosed`.
    pub fn next_result_set(&mut self) -> Result<Option<ResultSet<'_>>, SqlClientError> {
        if !self.advance_sync()? {
            return Ok(None);
        }
        Ok(Some(ResultSet::new(&mut *self.cursor)))
    }

    /// # Errors
    /// Provider failures while advancing, `CursorClosed`, or `Cancelled`.
    pub async fn next_result_set_async(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<ResultSet<'_>>, SqlClientError> {
        if self.finished {
            return Ok(None);
        }
        self.ensure_open()?;
        let available = if self.started {
            self.cursor.next_result_async(cancel).await?
        } else {
            self.started = true;
            !self.cursor.fields().is_empty()
        };
        if !available {
            self.finished = true;
            return Ok(None);
        }
        Ok(Some(ResultSet::new(&mut *self.cursor)))
    }

    /// Close the cursor, reporting any provider failure.
    ///
    /// # Errors
    /// Provider failures while releasing the cursor.
    pub fn close(mut self) -> Result<(), SqlClientError> {
        self.cursor.close()
    }

    fn advance_sync(&mut self) -> Result<bool, SqlClientError> {
        if self.finished {
            return Ok(false);
        }
        self.ensure_open()?;
        let available = if self.started {
            self.cursor.next_result()?
        } else {
            self.started = true;
            !self.cursor.fields().is_empty()
        };
        if !available {
            self.finished = true;
        }
        Ok(available)
    }
}

impl ResultSetReader<'_> {
    fn ensure_open(&self) -> Result<(), SqlClientError> {
        if self.cursor.is_closed() {
            Err(SqlClientError::CursorClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for ResultSetReader<'_> {
    fn drop(&mut self) {
        if !self.cursor.is_closed() {
            if let Err(e) = self.cursor.close() {
                tracing::warn!("failed to close cursor: {}", e);
            }
        }
    }
}

/// Rows of the single result set produced by a table or view read.
pub struct TableRows<'c> {
    reader: ResultSetReader<'c>,
    shape: Option<RowShape>,
}

impl<'c> TableRows<'c> {
    pub(crate) fn new(mut reader: ResultSetReader<'c>) -> Self {
        reader.started = true;
        let shape = if reader.cursor.fields().is_empty() {
            None
        } else {
            Some(RowShape::of(&*reader.cursor))
        };
        Self { reader, shape }
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        self.shape.as_ref().map_or(&[][..], |s| s.fields.as_slice())
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.shape.as_ref().map_or(&[][..], |s| s.columns.names())
    }

    /// # Errors
    /// Provider failures while reading, or `CursorClosed`.
    pub fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlClientError> {
        let Some(shape) = &self.shape else {
            return Ok(None);
        };
        match self.reader.cursor.read()? {
            Some(values) => shape.materialize(values).map(Some),
            None => {
                self.shape = None;
                Ok(None)
            }
        }
    }

    /// # Errors
    /// Provider failures while reading, `CursorClosed`, or `Cancelled`.
    pub async fn next_row_async(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<CustomDbRow>, SqlClientError> {
        let Some(shape) = &self.shape else {
            return Ok(None);
        };
        match self.reader.cursor.read_async(cancel).await? {
            Some(values) => shape.materialize(values).map(Some),
            None => {
                self.shape = None;
                Ok(None)
            }
        }
    }

    /// # Errors
    /// Provider failures while releasing the cursor.
    pub fn close(self) -> Result<(), SqlClientError> {
        self.reader.close()
    }
}

impl Iterator for TableRows<'_> {
    type Item = Result<CustomDbRow, SqlClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.shape = None;
                Some(Err(e))
            }
        }
    }
}
