//! The tabular data model: ordered columns plus positional rows.
//!
//! Every row is read against the same column list regardless of its own length; a position
//! past the end of a row reads as [`Value::Null`]. Column names are unique, a repeated name is
//! suffixed `_1`, `_2`, ... at construction.
//!
//! Per-column types are derived data. Tables built from raw text compute them while converting
//! cells; tables produced by operators compute them on first request.

use crate::error::{EngineError, Result};
use crate::infer::{convert_token, infer_column_types};
use crate::value::{Kind, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

/// A row of positional values.
pub type Row = Vec<Value>;

const NULL: &Value = &Value::Null;

#[derive(Clone, Debug)]
pub struct RowTable {
    columns: Vec<String>,
    rows: Vec<Row>,
    types: OnceLock<Vec<Kind>>,
}

impl PartialEq for RowTable {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }
}

impl RowTable {
    /// Build a table from already-typed rows.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns: unique_columns(columns),
            rows,
            types: OnceLock::new(),
        }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, Vec::new())
    }

    /// Build a table from raw text rows: infer column types from a sample, then convert every
    /// cell with its column's type. Fields past the last column are dropped.
    pub fn from_raw(columns: Vec<String>, raw: Vec<Vec<String>>) -> Self {
        let kinds = infer_column_types(&raw, &columns);
        Self::from_raw_typed(columns, raw, kinds)
    }

    /// Convert raw rows with already-known column kinds, as streamed batches do.
    pub fn from_raw_typed(columns: Vec<String>, raw: Vec<Vec<String>>, kinds: Vec<Kind>) -> Self {
        let rows = convert_rows(raw, &kinds);
        let types = OnceLock::new();
        let _ = types.set(kinds);
        Self {
            columns: unique_columns(columns),
            rows,
            types,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in the column list.
    ///
    /// # Errors
    /// [`EngineError::ColumnNotFound`] listing the available columns.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| EngineError::column_not_found(name, &self.columns))
    }

    /// Cell at (`row`, `col`); out-of-range positions read as null.
    pub fn get(&self, row: usize, col: usize) -> &Value {
        self.rows.get(row).map_or(NULL, |r| cell(r, col))
    }

    /// Named cell of a row.
    ///
    /// # Errors
    /// [`EngineError::ColumnNotFound`] when the column does not exist.
    pub fn value(&self, row: usize, column: &str) -> Result<&Value> {
        Ok(self.get(row, self.column_index(column)?))
    }

    /// Copy of rows `start..end`, clamped to the table.
    pub fn slice(&self, start: usize, end: usize) -> RowTable {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        RowTable::new(self.columns.clone(), self.rows[start..end].to_vec())
    }

    pub fn head(&self, n: usize) -> RowTable {
        self.slice(0, n)
    }

    /// Inferred type per column, in column order.
    pub fn column_types(&self) -> &[Kind] {
        self.types.get_or_init(|| {
            let text: Vec<Vec<String>> = self
                .rows
                .iter()
                .take(crate::infer::SAMPLE_ROWS)
                .map(|r| r.iter().map(Value::to_text).collect())
                .collect();
            infer_column_types(&text, &self.columns)
        })
    }

    /// Inferred type of one column.
    ///
    /// # Errors
    /// [`EngineError::ColumnNotFound`] when the column does not exist.
    pub fn column_type(&self, name: &str) -> Result<Kind> {
        let idx = self.column_index(name)?;
        Ok(self.column_types()[idx])
    }

    /// Append rows from another table with the same columns.
    pub(crate) fn extend(&mut self, rows: impl IntoIterator<Item = Row>) {
        self.rows.extend(rows);
        self.types = OnceLock::new();
    }
}

/// Cell `col` of `row`, null when the row is short.
pub fn cell(row: &[Value], col: usize) -> &Value {
    row.get(col).unwrap_or(NULL)
}

/// Convert raw rows with fixed per-column kinds.
pub(crate) fn convert_rows(raw: Vec<Vec<String>>, kinds: &[Kind]) -> Vec<Row> {
    raw.into_iter()
        .map(|fields| {
            fields
                .iter()
                .zip(kinds)
                .map(|(f, k)| convert_token(f, *k))
                .collect()
        })
        .collect()
}

/// Suffix repeated names with `_1`, `_2`, ... so every column name is unique.
pub fn unique_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(columns.len());
    columns
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 1;
            while seen.contains(&candidate) {
                candidate = format!("{name}_{n}");
                n += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn short_rows_read_null() {
        let t = RowTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Int(1)]],
        );
        assert_eq!(t.get(0, 1), &Value::Null);
        assert_eq!(t.get(9, 0), &Value::Null);
    }

    #[test]
    fn raw_rows_are_typed_by_column() {
        let t = RowTable::from_raw(
            vec!["id".into(), "score".into(), "name".into()],
            raw(&[&["1", "2.5", "a"], &["2", "3", "b"], &["3", "n/a", "c", "extra"]]),
        );
        assert_eq!(t.column_types(), &[Kind::Integer, Kind::Float, Kind::String]);
        assert_eq!(t.rows()[0], vec![Value::Int(1), Value::Float(2.5), Value::from("a")]);
        assert_eq!(t.rows()[1][1], Value::Float(3.0));
        assert_eq!(t.rows()[2], vec![Value::Int(3), Value::Null, Value::from("c")]);
    }

    #[test]
    fn duplicate_names_are_suffixed() {
        let t = RowTable::empty(vec!["a".into(), "a".into(), "a_1".into()]);
        assert_eq!(t.columns(), &["a", "a_1", "a_1_1"]);
    }

    #[test]
    fn missing_column_lists_available() {
        let t = RowTable::empty(vec!["name".into()]);
        let err = t.column_index("age").unwrap_err();
        assert!(matches!(err, EngineError::ColumnNotFound { ref column, .. } if column == "age"));
    }

    #[test]
    fn slice_clamps() {
        let t = RowTable::new(vec!["x".into()], (0..5).map(|i| vec![Value::Int(i)]).collect());
        assert_eq!(t.slice(3, 10).len(), 2);
        assert_eq!(t.slice(7, 10).len(), 0);
        assert_eq!(t.head(2).rows()[1], vec![Value::Int(1)]);
    }
}
