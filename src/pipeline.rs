//! Operation descriptors and the pipelines that hold them.
//!
//! A pipeline is an ordered list of immutable descriptors. Nothing runs when a descriptor is
//! appended; the [`Runner`](crate::runner::Runner) executes them in literal order, with no
//! reordering.
//!
//! ```
//! use flatnest::{Comparison, Direction, Pipeline};
//!
//! let mut p = Pipeline::default();
//! p.add_filter("age", Comparison::Gt, 25)
//!     .add_order_by("age", Direction::Descending)
//!     .add_limit(10);
//! assert_eq!(p.len(), 3);
//! ```

use crate::aggregates::AggFunc;
use crate::document::DocumentCollection;
use crate::table::RowTable;
use crate::value::{Comparison, Value};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;

/// Which unmatched rows a join keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "inner" => Some(JoinKind::Inner),
            "left" => Some(JoinKind::Left),
            "right" => Some(JoinKind::Right),
            "full" | "outer" => Some(JoinKind::Full),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            JoinKind::Inner => "Inner",
            JoinKind::Left => "Left",
            JoinKind::Right => "Right",
            JoinKind::Full => "Full",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Direction::Ascending),
            "desc" | "descending" => Some(Direction::Descending),
            _ => None,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        })
    }
}

/// One aggregate computed per group.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSpec {
    pub func: AggFunc,
    pub column: String,
}

impl AggregateSpec {
    pub fn new(func: AggFunc, column: impl Into<String>) -> Self {
        Self {
            func,
            column: column.into(),
        }
    }
}

/// A tabular operation descriptor.
#[derive(Clone, Debug)]
pub enum Operation {
    Filter {
        column: String,
        op: Comparison,
        value: Value,
    },
    Select {
        columns: Vec<String>,
    },
    Join {
        kind: JoinKind,
        right: Arc<RowTable>,
        left_key: String,
        right_key: String,
    },
    GroupBy {
        columns: Vec<String>,
        aggregate: Option<AggregateSpec>,
    },
    /// Compares the column named after `func` in a grouped table.
    Having {
        func: AggFunc,
        op: Comparison,
        value: Value,
    },
    OrderBy {
        column: String,
        direction: Direction,
    },
    Limit {
        count: usize,
    },
}

impl Operation {
    /// Operations that look at one row at a time and can run batch by batch.
    ///
    /// Limit counts as row-wise when the caller carries its running count across batches.
    pub fn is_row_wise(&self) -> bool {
        matches!(
            self,
            Operation::Filter { .. }
                | Operation::Select { .. }
                | Operation::Having { .. }
                | Operation::Limit { .. }
        )
    }

    /// Short operator name for logs and plan output.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Filter { .. } => "Filter",
            Operation::Select { .. } => "Select",
            Operation::Join { .. } => "Join",
            Operation::GroupBy { .. } => "GroupBy",
            Operation::Having { .. } => "Having",
            Operation::OrderBy { .. } => "OrderBy",
            Operation::Limit { .. } => "Limit",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Operation::Filter { column, op, value } => write!(f, "Filter: {column} {op} {value}"),
            Operation::Select { columns } => write!(f, "Select: {}", columns.join(", ")),
            Operation::Join {
                kind,
                left_key,
                right_key,
                ..
            } => write!(f, "{} join on {left_key} = {right_key}", kind.name()),
            Operation::GroupBy { columns, aggregate } => {
                write!(f, "Group by: {}", columns.join(", "))?;
                match aggregate {
                    Some(a) => write!(f, " ({} of {})", a.func, a.column),
                    None => f.write_str(" (count)"),
                }
            }
            Operation::Having { func, op, value } => write!(f, "Having: {func} {op} {value}"),
            Operation::OrderBy { column, direction } => {
                write!(f, "Order by: {column} {direction}")
            }
            Operation::Limit { count } => write!(f, "Limit: {count}"),
        }
    }
}

/// Ordered tabular operations.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    ops: Vec<Operation>,
}

impl Pipeline {
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: Operation) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn add_filter(
        &mut self,
        column: impl Into<String>,
        op: Comparison,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push(Operation::Filter {
            column: column.into(),
            op,
            value: value.into(),
        })
    }

    pub fn add_select<S: Into<String>>(
        &mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.push(Operation::Select {
            columns: columns.into_iter().map(Into::into).collect(),
        })
    }

    pub fn add_join(
        &mut self,
        kind: JoinKind,
        right: Arc<RowTable>,
        left_key: impl Into<String>,
        right_key: impl Into<String>,
    ) -> &mut Self {
        self.push(Operation::Join {
            kind,
            right,
            left_key: left_key.into(),
            right_key: right_key.into(),
        })
    }

    pub fn add_group_by<S: Into<String>>(
        &mut self,
        columns: impl IntoIterator<Item = S>,
        aggregate: Option<AggregateSpec>,
    ) -> &mut Self {
        self.push(Operation::GroupBy {
            columns: columns.into_iter().map(Into::into).collect(),
            aggregate,
        })
    }

    pub fn add_having(
        &mut self,
        func: AggFunc,
        op: Comparison,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push(Operation::Having {
            func,
            op,
            value: value.into(),
        })
    }

    pub fn add_order_by(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.push(Operation::OrderBy {
            column: column.into(),
            direction,
        })
    }

    pub fn add_limit(&mut self, count: usize) -> &mut Self {
        self.push(Operation::Limit { count })
    }

    /// Remove the operation at `index`; `None` when out of range.
    pub fn remove_operation(&mut self, index: usize) -> Option<Operation> {
        (index < self.ops.len()).then(|| self.ops.remove(index))
    }

    pub fn clear_operations(&mut self) {
        self.ops.clear();
    }
}

/// A document operation descriptor.
#[derive(Clone, Debug)]
pub enum DocOperation {
    Filter {
        field: String,
        op: Comparison,
        value: String,
    },
    /// Attach matching documents of `secondary` under `joined_data`.
    Join {
        secondary: Arc<DocumentCollection>,
        main_field: String,
        join_field: String,
    },
    Project {
        fields: Vec<String>,
    },
    GroupBy {
        field: String,
    },
    Limit {
        count: usize,
    },
}

impl Display for DocOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            DocOperation::Filter { field, op, value } => write!(f, "Filter: {field} {op} {value}"),
            DocOperation::Join {
                main_field,
                join_field,
                ..
            } => write!(f, "Join on {main_field} = {join_field}"),
            DocOperation::Project { fields } => write!(f, "Project: {}", fields.join(", ")),
            DocOperation::GroupBy { field } => write!(f, "Group by: {field}"),
            DocOperation::Limit { count } => write!(f, "Limit: {count}"),
        }
    }
}

/// Ordered document operations.
#[derive(Clone, Debug, Default)]
pub struct DocumentPipeline {
    ops: Vec<DocOperation>,
}

impl DocumentPipeline {
    pub fn operations(&self) -> &[DocOperation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: DocOperation) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn add_filter(
        &mut self,
        field: impl Into<String>,
        op: Comparison,
        value: impl Into<String>,
    ) -> &mut Self {
        self.push(DocOperation::Filter {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    pub fn add_join(
        &mut self,
        secondary: Arc<DocumentCollection>,
        main_field: impl Into<String>,
        join_field: impl Into<String>,
    ) -> &mut Self {
        self.push(DocOperation::Join {
            secondary,
            main_field: main_field.into(),
            join_field: join_field.into(),
        })
    }

    pub fn add_projection<S: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.push(DocOperation::Project {
            fields: fields.into_iter().map(Into::into).collect(),
        })
    }

    pub fn add_group_by(&mut self, field: impl Into<String>) -> &mut Self {
        self.push(DocOperation::GroupBy {
            field: field.into(),
        })
    }

    pub fn add_limit(&mut self, count: usize) -> &mut Self {
        self.push(DocOperation::Limit { count })
    }

    pub fn remove_operation(&mut self, index: usize) -> Option<DocOperation> {
        (index < self.ops.len()).then(|| self.ops.remove(index))
    }

    pub fn clear_operations(&mut self) {
        self.ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions() {
        let mut p = Pipeline::default();
        p.add_filter("age", Comparison::Ge, 30)
            .add_group_by(["dept"], Some(AggregateSpec::new(AggFunc::Sum, "salary")))
            .add_order_by("sum", Direction::Descending);
        let text: Vec<String> = p.operations().iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            vec![
                "Filter: age >= 30",
                "Group by: dept (sum of salary)",
                "Order by: sum DESC"
            ]
        );
    }

    #[test]
    fn remove_and_clear() {
        let mut p = DocumentPipeline::default();
        p.add_limit(1).add_group_by("k");
        assert!(p.remove_operation(5).is_none());
        assert!(matches!(p.remove_operation(0), Some(DocOperation::Limit { count: 1 })));
        assert_eq!(p.len(), 1);
        p.clear_operations();
        assert!(p.is_empty());
    }
}
