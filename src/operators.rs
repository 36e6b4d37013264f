//! Tabular operators: filter, select, group-by, having, order-by, limit.
//!
//! Every operator takes a table and returns a new one. Joins live in [`crate::joins`];
//! [`apply`] dispatches any [`Operation`] to the right function.
//!
//! Rows that fail to evaluate (a non-numeric value under `>`, say) are excluded and logged at
//! debug level. They never fail the operator.

use crate::aggregates::AggFunc;
use crate::error::Result;
use crate::joins::hash_join;
use crate::pipeline::{AggregateSpec, Direction, Operation};
use crate::table::{Row, RowTable, cell};
use crate::value::{Comparison, HashKey, SortKey, Value};
use indexmap::IndexMap;
use tracing::debug;

/// Run one operation over `table`.
///
/// # Errors
/// Column and join-key lookup failures of the individual operators.
pub fn apply(op: &Operation, table: RowTable) -> Result<RowTable> {
    match op {
        Operation::Filter { column, op, value } => filter(table, column, *op, value),
        Operation::Select { columns } => select(&table, columns),
        Operation::Join {
            kind,
            right,
            left_key,
            right_key,
        } => hash_join(&table, right, *kind, left_key, right_key),
        Operation::GroupBy { columns, aggregate } => group_by(&table, columns, aggregate.as_ref()),
        Operation::Having { func, op, value } => Ok(having(table, *func, *op, value)),
        Operation::OrderBy { column, direction } => order_by(table, column, *direction),
        Operation::Limit { count } => Ok(limit(table, *count)),
    }
}

/// Keep rows where `column <op> value` holds.
///
/// # Errors
/// [`EngineError::ColumnNotFound`](crate::EngineError::ColumnNotFound) for an unknown column.
pub fn filter(table: RowTable, column: &str, op: Comparison, value: &Value) -> Result<RowTable> {
    let idx = table.column_index(column)?;
    let (columns, rows) = table.into_parts();
    let kept = rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, row)| match op.evaluate(cell(&row, idx), value) {
            Ok(true) => Some(row),
            Ok(false) => None,
            Err(e) => {
                debug!(row = i, column, error = %e, "excluding row from filter");
                None
            }
        })
        .collect();
    Ok(RowTable::new(columns, kept))
}

/// Project onto `columns`, in the requested order.
///
/// # Errors
/// [`EngineError::ColumnNotFound`](crate::EngineError::ColumnNotFound) naming the first
/// missing column.
pub fn select(table: &RowTable, columns: &[String]) -> Result<RowTable> {
    let idx = columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>>>()?;
    let rows = table
        .rows()
        .iter()
        .map(|row| idx.iter().map(|&i| cell(row, i).clone()).collect())
        .collect();
    Ok(RowTable::new(columns.to_vec(), rows))
}

/// Group rows by the values of `columns`, groups in first-encountered order.
///
/// The output has the grouping columns plus one column named after the aggregate function,
/// or `count` of member rows when there is no aggregate.
///
/// # Errors
/// [`EngineError::ColumnNotFound`](crate::EngineError::ColumnNotFound) for an unknown grouping
/// or aggregate column.
pub fn group_by(
    table: &RowTable,
    columns: &[String],
    aggregate: Option<&AggregateSpec>,
) -> Result<RowTable> {
    let key_idx = columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>>>()?;
    let agg_idx = aggregate
        .map(|a| table.column_index(&a.column))
        .transpose()?;

    let mut groups: IndexMap<Vec<HashKey>, (Row, Vec<usize>)> = IndexMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        let key: Vec<HashKey> = key_idx.iter().map(|&k| HashKey::of(cell(row, k))).collect();
        groups
            .entry(key)
            .or_insert_with(|| {
                let values = key_idx.iter().map(|&k| cell(row, k).clone()).collect();
                (values, Vec::new())
            })
            .1
            .push(i);
    }

    let mut out_columns = columns.to_vec();
    out_columns.push(aggregate.map_or(AggFunc::Count, |a| a.func).name().to_string());

    let rows = groups
        .into_values()
        .map(|(mut key_values, members)| {
            let result = match (aggregate, agg_idx) {
                (Some(spec), Some(col)) => spec
                    .func
                    .aggregate(members.iter().map(|&m| cell(&table.rows()[m], col))),
                _ => Value::Int(members.len() as i64),
            };
            key_values.push(result);
            key_values
        })
        .collect();
    Ok(RowTable::new(out_columns, rows))
}

/// Filter a grouped table on its aggregate column.
///
/// Rows whose aggregate is absent, null or not comparable are dropped.
pub fn having(table: RowTable, func: AggFunc, op: Comparison, value: &Value) -> RowTable {
    let Ok(idx) = table.column_index(func.name()) else {
        debug!(column = func.name(), "having on a table without the aggregate column");
        return RowTable::empty(table.columns().to_vec());
    };
    let (columns, rows) = table.into_parts();
    let kept = rows
        .into_iter()
        .filter(|row| {
            let v = cell(row, idx);
            !v.is_null() && op.evaluate(v, value).unwrap_or(false)
        })
        .collect();
    RowTable::new(columns, kept)
}

/// Stable sort by one column with the mixed comparator.
///
/// # Errors
/// [`EngineError::ColumnNotFound`](crate::EngineError::ColumnNotFound) for an unknown column.
pub fn order_by(table: RowTable, column: &str, direction: Direction) -> Result<RowTable> {
    let idx = table.column_index(column)?;
    let (columns, rows) = table.into_parts();
    Ok(RowTable::new(columns, sort_rows(rows, idx, direction)))
}

/// Stable sort of raw rows by column `idx`. Descending keeps ties in input order.
pub fn sort_rows(rows: Vec<Row>, idx: usize, direction: Direction) -> Vec<Row> {
    let mut keyed: Vec<(SortKey, Row)> = rows
        .into_iter()
        .map(|r| (SortKey::of(cell(&r, idx)), r))
        .collect();
    match direction {
        Direction::Ascending => keyed.sort_by(|a, b| a.0.cmp(&b.0)),
        Direction::Descending => keyed.sort_by(|a, b| b.0.cmp(&a.0)),
    }
    keyed.into_iter().map(|(_, r)| r).collect()
}

/// First `count` rows.
pub fn limit(table: RowTable, count: usize) -> RowTable {
    let (columns, mut rows) = table.into_parts();
    rows.truncate(count);
    RowTable::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> RowTable {
        RowTable::new(
            vec!["name".into(), "age".into()],
            vec![
                vec![Value::from("Alice"), Value::Int(25)],
                vec![Value::from("Bob"), Value::Int(30)],
                vec![Value::from("Carol"), Value::Int(35)],
                vec![Value::from("Dan"), Value::from("unknown")],
            ],
        )
    }

    #[test]
    fn filter_excludes_rows_that_do_not_coerce() -> anyhow::Result<()> {
        let out = filter(people(), "age", Comparison::Gt, &Value::Int(25))?;
        let names: Vec<String> = out.rows().iter().map(|r| r[0].to_text()).collect();
        assert_eq!(names, vec!["Bob", "Carol"]);
        Ok(())
    }

    #[test]
    fn select_reorders() -> anyhow::Result<()> {
        let out = select(&people(), &["age".into(), "name".into()])?;
        assert_eq!(out.columns(), &["age", "name"]);
        assert_eq!(out.rows()[0], vec![Value::Int(25), Value::from("Alice")]);
        Ok(())
    }

    #[test]
    fn group_without_aggregate_counts_members() -> anyhow::Result<()> {
        let t = RowTable::new(
            vec!["k".into()],
            vec![
                vec![Value::from("b")],
                vec![Value::from("a")],
                vec![Value::from("b")],
            ],
        );
        let out = group_by(&t, &["k".into()], None)?;
        assert_eq!(out.columns(), &["k", "count"]);
        assert_eq!(
            out.rows(),
            &[
                vec![Value::from("b"), Value::Int(2)],
                vec![Value::from("a"), Value::Int(1)]
            ]
        );
        Ok(())
    }

    #[test]
    fn having_drops_missing_and_null() {
        let t = RowTable::new(
            vec!["k".into(), "sum".into()],
            vec![
                vec![Value::from("a"), Value::Int(40)],
                vec![Value::from("b"), Value::Null],
                vec![Value::from("c"), Value::Int(5)],
            ],
        );
        let out = having(t.clone(), AggFunc::Sum, Comparison::Gt, &Value::Int(10));
        assert_eq!(out.len(), 1);
        assert!(having(t, AggFunc::Avg, Comparison::Gt, &Value::Int(0)).is_empty());
    }

    #[test]
    fn descending_sort_keeps_ties_stable() -> anyhow::Result<()> {
        let t = RowTable::new(
            vec!["id".into(), "v".into()],
            vec![
                vec![Value::Int(1), Value::Int(5)],
                vec![Value::Int(2), Value::Int(7)],
                vec![Value::Int(3), Value::Int(5)],
                vec![Value::Int(4), Value::Null],
            ],
        );
        let out = order_by(t, "v", Direction::Descending)?;
        let ids: Vec<Value> = out.rows().iter().map(|r| r[0].clone()).collect();
        // Null sorts as "" which is text, after every number ascending.
        assert_eq!(ids, vec![Value::Int(4), Value::Int(2), Value::Int(1), Value::Int(3)]);
        Ok(())
    }
}
