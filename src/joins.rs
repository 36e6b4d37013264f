//! Hash joins between two row tables.
//!
//! One side is bucketed by key (`HashKey -> Vec<row index>`); the other side is scanned in
//! order and probes the buckets. The output columns are the left columns followed by the right
//! columns without the right key, uniquified.
//!
//! ## Row order
//! - **Inner / Left**: left rows in order; each left row emits its matches in right order.
//!   Unmatched left rows (left join) appear once, right side null-padded.
//! - **Right**: right rows in order; each emits its matches in left order. An unmatched right
//!   row has null left columns, except the left key column which carries the right key value.
//! - **Full**: the left join output, then the unmatched right rows in right order.
//!
//! Null keys never match anything.

use crate::error::{EngineError, Result};
use crate::pipeline::JoinKind;
use crate::table::{Row, RowTable, cell};
use crate::value::{HashKey, Value};
use std::collections::HashMap;

/// Join `left` with `right` on `left_key = right_key`.
///
/// # Errors
/// [`EngineError::KeyNotFound`] when either key column is missing.
pub fn hash_join(
    left: &RowTable,
    right: &RowTable,
    kind: JoinKind,
    left_key: &str,
    right_key: &str,
) -> Result<RowTable> {
    let lk = key_index(left, left_key, "left")?;
    let rk = key_index(right, right_key, "right")?;
    let layout = Layout::new(left, right, lk, rk);

    let mut columns = left.columns().to_vec();
    columns.extend(
        right
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != rk)
            .map(|(_, c)| c.clone()),
    );

    let rows = match kind {
        JoinKind::Inner | JoinKind::Left | JoinKind::Full => {
            let buckets = bucket(right.rows(), rk);
            let mut matched_right = vec![false; right.len()];
            let mut out = Vec::new();
            for l in left.rows() {
                let hits = probe(&buckets, cell(l, lk));
                for &r in hits {
                    matched_right[r] = true;
                    out.push(layout.joined(l, &right.rows()[r]));
                }
                if hits.is_empty() && kind != JoinKind::Inner {
                    out.push(layout.left_only(l));
                }
            }
            if kind == JoinKind::Full {
                out.extend(
                    right
                        .rows()
                        .iter()
                        .zip(&matched_right)
                        .filter(|(_, m)| !**m)
                        .map(|(r, _)| layout.right_only(r)),
                );
            }
            out
        }
        JoinKind::Right => {
            let buckets = bucket(left.rows(), lk);
            let mut out = Vec::new();
            for r in right.rows() {
                let hits = probe(&buckets, cell(r, rk));
                for &l in hits {
                    out.push(layout.joined(&left.rows()[l], r));
                }
                if hits.is_empty() {
                    out.push(layout.right_only(r));
                }
            }
            out
        }
    };
    Ok(RowTable::new(columns, rows))
}

fn key_index(table: &RowTable, key: &str, side: &'static str) -> Result<usize> {
    table
        .columns()
        .iter()
        .position(|c| c == key)
        .ok_or_else(|| EngineError::KeyNotFound {
            key: key.to_string(),
            side,
            available: table.columns().to_vec(),
        })
}

fn bucket(rows: &[Row], key: usize) -> HashMap<HashKey, Vec<usize>> {
    let mut buckets: HashMap<HashKey, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        let k = cell(row, key);
        if !k.is_null() {
            buckets.entry(HashKey::of(k)).or_default().push(i);
        }
    }
    buckets
}

fn probe<'a>(buckets: &'a HashMap<HashKey, Vec<usize>>, key: &Value) -> &'a [usize] {
    if key.is_null() {
        return &[];
    }
    buckets.get(&HashKey::of(key)).map_or(&[][..], Vec::as_slice)
}

/// Column geometry of one join.
struct Layout {
    left_width: usize,
    right_width: usize,
    left_key: usize,
    right_key: usize,
}

impl Layout {
    fn new(left: &RowTable, right: &RowTable, left_key: usize, right_key: usize) -> Self {
        Self {
            left_width: left.columns().len(),
            right_width: right.columns().len(),
            left_key,
            right_key,
        }
    }

    fn push_left(&self, out: &mut Row, l: &[Value]) {
        out.extend((0..self.left_width).map(|i| cell(l, i).clone()));
    }

    fn push_right(&self, out: &mut Row, r: &[Value]) {
        out.extend(
            (0..self.right_width)
                .filter(|i| *i != self.right_key)
                .map(|i| cell(r, i).clone()),
        );
    }

    fn width(&self) -> usize {
        self.left_width + self.right_width - 1
    }

    fn joined(&self, l: &[Value], r: &[Value]) -> Row {
        let mut out = Vec::with_capacity(self.width());
        self.push_left(&mut out, l);
        self.push_right(&mut out, r);
        out
    }

    fn left_only(&self, l: &[Value]) -> Row {
        let mut out = Vec::with_capacity(self.width());
        self.push_left(&mut out, l);
        out.resize(self.width(), Value::Null);
        out
    }

    fn right_only(&self, r: &[Value]) -> Row {
        let mut out = vec![Value::Null; self.left_width];
        out[self.left_key] = cell(r, self.right_key).clone();
        self.push_right(&mut out, r);
        out
    }
}
