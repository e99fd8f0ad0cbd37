//! Typed row abstraction consumed read-only by the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One tabular record: an ordered map of column name to cell text.
///
/// Column names and cells are trimmed once on construction, so every
/// consumer sees the same normalized view.
///
/// # Examples
///
/// ```
/// use plantgraph::Row;
///
/// let row = Row::new(3)
///     .with("PLANT_ID", " P1 ")
///     .with("AREA_ID", "");
///
/// assert_eq!(row.index(), 3);
/// assert_eq!(row.get("PLANT_ID"), Some("P1"));
/// assert_eq!(row.get("AREA_ID"), None);
/// assert_eq!(row.get("MISSING"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    index: usize,
    cells: BTreeMap<String, String>,
}

impl Row {
    /// Creates an empty row with its position in the source table.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            cells: BTreeMap::new(),
        }
    }

    /// Builds a row from `(column, value)` pairs.
    #[must_use]
    pub fn from_pairs<K, V>(index: usize, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        pairs
            .into_iter()
            .fold(Self::new(index), |row, (k, v)| row.with(k.as_ref(), v.as_ref()))
    }

    /// Adds a cell, replacing any previous value for the column.
    #[must_use]
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: &str) {
        self.cells
            .insert(column.trim().to_string(), value.trim().to_string());
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns the non-blank value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns the cell text even when blank.
    #[must_use]
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
