//! Helper utilities for testing and development.

use std::sync::Arc;

use crate::provider::FieldInfo;
use crate::results::{BufferedResult, ColumnIndex, CustomDbRow};
use crate::types::RowValues;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: &[&str], values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(ColumnIndex::new(column_names)), values)
}

/// A buffered result set with untyped fields.
#[must_use]
pub fn result_set(column_names: &[&str], rows: Vec<Vec<RowValues>>) -> BufferedResult {
    BufferedResult::new(FieldInfo::from_names(column_names), rows)
}
