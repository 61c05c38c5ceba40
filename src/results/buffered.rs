use std::collections::VecDeque;

use crate::error::SqlClientError;
use crate::provider::{DbCursor, FieldInfo};
use crate::types::{CommandBehavior, RowValues};

/// One fully fetched result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedResult {
    pub fields: Vec<FieldInfo>,
    pub rows: VecDeque<Vec<RowValues>>,
}

impl BufferedResult {
    #[must_use]
    pub fn new(fields: Vec<FieldInfo>, rows: impl IntoIterator<Item = Vec<RowValues>>) -> Self {
        Self {
            fields,
            rows: rows.into_iter().collect(),
        }
    }
}

/// Cursor over result sets a provider fetched eagerly.
///
/// Drivers whose row streams borrow the connection (rusqlite statements,
/// tiberius query streams) fetch into this type so the cursor can outlive the
/// driver call. It still behaves as a forward-only cursor.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    current: Option<BufferedResult>,
    pending: VecDeque<BufferedResult>,
    closed: bool,
}

impl BufferedCursor {
    /// Build a cursor, applying the single-result and single-row behaviors.
    #[must_use]
    pub fn new(results: Vec<BufferedResult>, behavior: CommandBehavior) -> Self {
        let mut pending: VecDeque<BufferedResult> = results.into();
        if behavior.single_result() {
            pending.truncate(1);
        }
        if behavior.single_row() {
            if let Some(first) = pending.front_mut() {
                first.rows.truncate(1);
            }
        }
        let current = pending.pop_front();
        Self {
            current,
            pending,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), SqlClientError> {
        if self.closed {
            Err(SqlClientError::CursorClosed)
        } else {
            Ok(())
        }
    }
}

impl DbCursor for BufferedCursor {
    fn fields(&self) -> &[FieldInfo] {
        self.current
            .as_ref()
            .map_or(&[][..], |result| result.fields.as_slice())
    }

    fn read(&mut self) -> Result<Option<Vec<RowValues>>, SqlClientError> {
        self.ensure_open()?;
        Ok(self
            .current
            .as_mut()
            .and_then(|result| result.rows.pop_front()))
    }

    fn next_result(&mut self) -> Result<bool, SqlClientError> {
        self.ensure_open()?;
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn close(&mut self) -> Result<(), SqlClientError> {
        self.closed = true;
        self.current = None;
        self.pending.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_results() -> Vec<BufferedResult> {
        vec![
            BufferedResult::new(
                FieldInfo::from_names(&["a"]),
                vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]],
            ),
            BufferedResult::new(
                FieldInfo::from_names(&["b"]),
                vec![vec![RowValues::Int(3)]],
            ),
        ]
    }

    #[test]
    fn walks_results_in_order() -> Result<(), SqlClientError> {
        let mut cursor = BufferedCursor::new(two_results(), CommandBehavior::DEFAULT);
        assert_eq!(cursor.fields()[0].name, "a");
        assert_eq!(cursor.read()?, Some(vec![RowValues::Int(1)]));
        assert!(cursor.next_result()?);
        assert_eq!(cursor.fields()[0].name, "b");
        assert_eq!(cursor.read()?, Some(vec![RowValues::Int(3)]));
        assert_eq!(cursor.read()?, None);
        assert!(!cursor.next_result()?);
        assert!(cursor.fields().is_empty());
        Ok(())
    }

    #[test]
    fn single_row_implies_single_result() -> Result<(), SqlClientError> {
        let mut cursor = BufferedCursor::new(two_results(), CommandBehavior::SINGLE_ROW);
        assert_eq!(cursor.read()?, Some(vec![RowValues::Int(1)]));
        assert_eq!(cursor.read()?, None);
        assert!(!cursor.next_result()?);
        Ok(())
    }

    #[test]
    fn closed_cursor_fails_fast() {
        let mut cursor = BufferedCursor::new(two_results(), CommandBehavior::DEFAULT);
        cursor.close().unwrap();
        assert!(cursor.is_closed());
        assert!(matches!(cursor.read(), Err(SqlClientError::CursorClosed)));
        assert!(matches!(cursor.next_result(), Err(SqlClientError::CursorClosed)));
    }
}
