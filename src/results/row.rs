use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::FieldInfo;
use crate::types::RowValues;

/// Case-insensitive name→ordinal map shared by every row of a result set.
///
/// Repeated column names are disambiguated by appending `_N`, so `A, A, B`
/// is addressable as `A`, `A_1`, `B`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    names: Vec<String>,
    ordinals: HashMap<String, usize>,
}

impl ColumnIndex {
    #[must_use]
    pub fn new<S: AsRef<str>>(raw_names: &[S]) -> Self {
        let mut names = Vec::with_capacity(raw_names.len());
        let mut ordinals = HashMap::with_capacity(raw_names.len());

        for (ordinal, raw) in raw_names.iter().enumerate() {
            let base = raw.as_ref();
            let mut name = base.to_string();
            let mut suffix = 1;
            while ordinals.contains_key(&name.to_lowercase()) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            ordinals.insert(name.to_lowercase(), ordinal);
            names.push(name);
        }

        Self { names, ordinals }
    }

    #[must_use]
    pub fn from_fields(fields: &[FieldInfo]) -> Self {
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        Self::new(&names)
    }

    #[must_use]
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.ordinals.get(&name.to_lowercase()).copied()
    }

    /// Column names after disambiguation, in ordinal order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A row from a database query result
///
/// Values are owned by the row; the column map is shared with the result set
/// it came from, so rows stay valid after the cursor moves on.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDbRow {
    columns: Arc<ColumnIndex>,
    values: Vec<RowValues>,
}

impl CustomDbRow {
    #[must_use]
    pub fn new(columns: Arc<ColumnIndex>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    /// Get the index of a column by name (case-insensitive)
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.ordinal(column_name)
    }

    /// Get a value from the row by column name (case-insensitive)
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
