//! Test fixtures for flatnest pipelines.
//!
//! - **Temporary files**: [`TempFixture`] writes delimited or structured text to a temp file
//!   that is removed when dropped.
//! - **Sample tables**: [`people_table`], [`sales_table`] and generated numeric data.
//! - **Assertions**: [`assert_column_eq`] compares one column of a result.
//!
//! ```
//! use flatnest::testing::{TempFixture, people_csv};
//! use flatnest::{LoadOptions, TableSession};
//!
//! # fn main() -> anyhow::Result<()> {
//! let file = TempFixture::csv(people_csv())?;
//! let mut session = TableSession::default();
//! session.load(file.path(), LoadOptions::default())?;
//! assert_eq!(session.columns(), &["name", "age"]);
//! # Ok(()) }
//! ```

use crate::table::RowTable;
use crate::value::Value;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A temporary file holding fixture text. Deleted on drop.
pub struct TempFixture {
    file: NamedTempFile,
}

impl TempFixture {
    /// Write `contents` to a new temp file with the given extension.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn with_extension(extension: &str, contents: &str) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("flatnest-fixture-")
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn csv(contents: &str) -> std::io::Result<Self> {
        Self::with_extension("csv", contents)
    }

    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn json(contents: &str) -> std::io::Result<Self> {
        Self::with_extension("json", contents)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// The `name,age` scenario: Alice 25, Bob 30, Carol 35.
#[must_use]
pub fn people_csv() -> &'static str {
    "name,age\nAlice,25\nBob,30\nCarol,35\n"
}

#[must_use]
pub fn people_table() -> RowTable {
    RowTable::new(
        vec!["name".into(), "age".into()],
        vec![
            vec![Value::from("Alice"), Value::Int(25)],
            vec![Value::from("Bob"), Value::Int(30)],
            vec![Value::from("Carol"), Value::Int(35)],
        ],
    )
}

/// Three sales in two categories: A 10, B 20, A 30.
#[must_use]
pub fn sales_table() -> RowTable {
    RowTable::new(
        vec!["category".into(), "amount".into()],
        vec![
            vec![Value::from("A"), Value::Int(10)],
            vec![Value::from("B"), Value::Int(20)],
            vec![Value::from("A"), Value::Int(30)],
        ],
    )
}

/// `id,score` rows with scores scrambled by a fixed multiplier: deterministic, unsorted, and
/// repeating. Both columns stay at 2 or above so no value reads as a boolean.
#[must_use]
pub fn scrambled_csv(rows: usize) -> String {
    let mut out = String::from("id,score\n");
    for i in 0..rows {
        let score = (i * 7919 + 13) % 97 + 2;
        let _ = writeln!(out, "{},{score}", i + 2);
    }
    out
}

/// Values of `column` in `table`, in row order.
///
/// # Panics
/// Panics if the column does not exist.
#[must_use]
pub fn column(table: &RowTable, column: &str) -> Vec<Value> {
    let idx = table
        .column_index(column)
        .unwrap_or_else(|e| panic!("{e}"));
    (0..table.len()).map(|r| table.get(r, idx).clone()).collect()
}

/// Assert one column of `table` equals `expected`.
///
/// # Panics
/// Panics with both sequences when they differ.
pub fn assert_column_eq(table: &RowTable, name: &str, expected: &[Value]) {
    let actual = column(table, name);
    assert_eq!(
        actual, expected,
        "Column '{name}' mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}
