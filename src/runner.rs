//! Pipeline execution.
//!
//! [`Runner`] asks the planner for a [`Strategy`] and drives it: everything in memory, a
//! materialized streaming source, per-batch streaming with early stop on a satisfied limit,
//! or an external sort-merge. Each call owns its file handles and spill runs; nothing is kept
//! between calls.

use crate::config::EngineConfig;
use crate::document::{DocValue, DocumentCollection};
use crate::documents;
use crate::error::Result;
use crate::operators;
use crate::pipeline::{DocumentPipeline, Operation, Pipeline};
use crate::planner::{Plan, Strategy, build_plan};
use crate::source::{StreamingSource, TableSource};
use crate::table::RowTable;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default)]
pub struct Runner {
    pub config: EngineConfig,
}

impl Runner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The plan [`run`](Self::run) would follow for `pipeline` over `source`.
    pub fn plan(&self, source: &TableSource, pipeline: &Pipeline) -> Plan {
        build_plan(
            pipeline.operations(),
            source.is_streaming(),
            cfg!(feature = "spilling"),
        )
    }

    /// Run a tabular pipeline.
    ///
    /// # Errors
    /// Operator failures (unknown columns or join keys), read failures of a streaming source,
    /// and [`EngineError::Execution`](crate::EngineError::Execution) for spill failures.
    pub fn run(&self, source: &TableSource, pipeline: &Pipeline) -> Result<RowTable> {
        let ops = pipeline.operations();
        let plan = self.plan(source, pipeline);
        debug!(strategy = %plan.strategy, steps = ops.len(), "executing pipeline");
        match (source, plan.strategy) {
            (TableSource::InMemory(table), _) => run_in_memory(ops, 0, table.as_ref().clone()),
            (TableSource::Streaming(s), Strategy::InMemory | Strategy::MaterializeThenRun(_)) => {
                run_in_memory(ops, 0, s.materialize()?)
            }
            (TableSource::Streaming(s), Strategy::StreamBatches { prefix_len }) => {
                let head = stream_prefix(s, &ops[..prefix_len])?;
                run_in_memory(&ops[prefix_len..], prefix_len, head)
            }
            #[cfg(feature = "spilling")]
            (TableSource::Streaming(s), Strategy::ExternalSort { order_step }) => {
                let merged = self.external_sort(s, ops, order_step)?;
                run_in_memory(&ops[order_step + 1..], order_step + 1, merged)
            }
            #[cfg(not(feature = "spilling"))]
            (TableSource::Streaming(s), Strategy::ExternalSort { .. }) => {
                run_in_memory(ops, 0, s.materialize()?)
            }
        }
    }

    /// Run a document pipeline. Document operators cannot fail.
    pub fn run_documents(
        &self,
        docs: &DocumentCollection,
        pipeline: &DocumentPipeline,
    ) -> Vec<DocValue> {
        pipeline
            .operations()
            .iter()
            .fold(docs.docs().to_vec(), |acc, op| {
                trace!(op = %op, docs = acc.len(), "applying document operation");
                documents::apply(op, acc)
            })
    }

    /// Sorted runs per batch, then a k-way merge. Returns the rows after the order-by step.
    #[cfg(feature = "spilling")]
    fn external_sort(
        &self,
        source: &StreamingSource,
        ops: &[Operation],
        order_step: usize,
    ) -> Result<RowTable> {
        use crate::error::EngineError;
        use crate::spill::SpillSorter;

        let pre = &ops[..order_step];
        let order_op = &ops[order_step];
        let Operation::OrderBy { column, .. } = order_op else {
            return Err(EngineError::execution(
                order_step + 1,
                order_op,
                "expected an order-by step",
            ));
        };
        let spill_err =
            |e: anyhow::Error| EngineError::execution(order_step + 1, order_op, format!("{e:#}"));

        let mut limits = LimitState::new(pre);
        let mut sorter: Option<SpillSorter> = None;
        let mut columns = None;
        for batch in source.batches()? {
            let table = apply_row_wise(pre, batch?, &mut limits)?;
            if sorter.is_none() {
                let idx = table.column_index(column)?;
                sorter = Some(SpillSorter::new(self.config.spill_dir.as_deref(), idx));
                columns = Some(table.columns().to_vec());
            }
            if let Some(s) = sorter.as_mut() {
                s.push_run(table.into_rows()).map_err(spill_err)?;
            }
            if limits.exhausted() {
                trace!("limit satisfied before the sort; stopping the stream");
                break;
            }
        }

        let (Some(sorter), Some(columns)) = (sorter, columns) else {
            // No batches: run the same steps over an empty table for the output columns.
            let empty = apply_row_wise(pre, source.empty(), &mut LimitState::new(pre))?;
            return operators::apply(order_op, empty);
        };
        let limit = match ops.get(order_step + 1) {
            Some(Operation::Limit { count }) => Some(*count),
            _ => None,
        };
        debug!(
            runs = sorter.run_count(),
            rows = sorter.rows_spilled(),
            ?limit,
            "merging sorted runs"
        );
        let rows = sorter.merge(limit).map_err(spill_err)?;
        Ok(RowTable::new(columns, rows))
    }
}

/// Apply `ops` in order; `offset` is the pipeline position of `ops[0]`, for logs.
fn run_in_memory(ops: &[Operation], offset: usize, table: RowTable) -> Result<RowTable> {
    ops.iter().enumerate().try_fold(table, |acc, (i, op)| {
        trace!(step = offset + i + 1, op = %op, rows = acc.len(), "applying operation");
        operators::apply(op, acc)
    })
}

/// Running row budgets of the limits in a per-batch prefix.
struct LimitState {
    remaining: Vec<Option<usize>>,
}

impl LimitState {
    fn new(ops: &[Operation]) -> Self {
        Self {
            remaining: ops
                .iter()
                .map(|op| match op {
                    Operation::Limit { count } => Some(*count),
                    _ => None,
                })
                .collect(),
        }
    }

    /// A limit has no budget left, so no later batch can contribute rows.
    fn exhausted(&self) -> bool {
        self.remaining.iter().any(|r| *r == Some(0))
    }
}

/// Run row-wise operations over one batch, charging limits against their running budgets.
fn apply_row_wise(ops: &[Operation], batch: RowTable, limits: &mut LimitState) -> Result<RowTable> {
    ops.iter().enumerate().try_fold(batch, |acc, (i, op)| match (op, limits.remaining[i].as_mut()) {
        (Operation::Limit { .. }, Some(left)) => {
            let take = (*left).min(acc.len());
            *left -= take;
            Ok(operators::limit(acc, take))
        }
        _ => operators::apply(op, acc),
    })
}

/// Run a row-wise prefix batch by batch and concatenate the results.
fn stream_prefix(source: &StreamingSource, prefix: &[Operation]) -> Result<RowTable> {
    let mut limits = LimitState::new(prefix);
    let mut out: Option<RowTable> = None;
    for batch in source.batches()? {
        let part = apply_row_wise(prefix, batch?, &mut limits)?;
        match out.as_mut() {
            Some(acc) => acc.extend(part.into_rows()),
            None => out = Some(part),
        }
        if limits.exhausted() {
            trace!("limit satisfied; stopping the stream");
            break;
        }
    }
    match out {
        Some(table) => Ok(table),
        None => apply_row_wise(prefix, source.empty(), &mut LimitState::new(prefix)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Comparison, Value};
    use std::sync::Arc;

    fn numbers(n: i64) -> TableSource {
        TableSource::InMemory(Arc::new(RowTable::new(
            vec!["n".into()],
            (0..n).map(|i| vec![Value::Int(i)]).collect(),
        )))
    }

    #[test]
    fn limit_budget_spans_batches() -> anyhow::Result<()> {
        let mut p = Pipeline::default();
        p.add_filter("n", Comparison::Ge, 2).add_limit(3);
        let mut limits = LimitState::new(p.operations());
        let first = RowTable::new(vec!["n".into()], vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        let second = RowTable::new(
            vec!["n".into()],
            vec![vec![Value::Int(3)], vec![Value::Int(4)], vec![Value::Int(5)]],
        );
        assert_eq!(apply_row_wise(p.operations(), first, &mut limits)?.len(), 1);
        assert!(!limits.exhausted());
        assert_eq!(apply_row_wise(p.operations(), second, &mut limits)?.len(), 2);
        assert!(limits.exhausted());
        Ok(())
    }

    #[test]
    fn in_memory_runs_every_step() -> anyhow::Result<()> {
        let mut p = Pipeline::default();
        p.add_filter("n", Comparison::Lt, 5).add_limit(2);
        let out = Runner::default().run(&numbers(10), &p)?;
        assert_eq!(out.rows(), &[vec![Value::Int(0)], vec![Value::Int(1)]]);
        Ok(())
    }
}
