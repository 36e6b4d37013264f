//! Execution strategy selection.
//!
//! The planner looks at the operation list once, before anything runs, and picks how the
//! runner drives it. Operations are never reordered or rewritten; the plan only decides where
//! each one executes.
//!
//! Decision order:
//! 1. In-memory source: run everything in memory.
//! 2. Streaming source with a join anywhere: materialize the source, then run in memory.
//! 3. An order-by with no group-by before it: ascending sorts externally (sorted runs spilled
//!    per batch, then merged); descending materializes and sorts in memory.
//! 4. Otherwise stream: the leading row-wise operations (filter, select, having, limit) run
//!    per batch, the rest once over the accumulated result.
//!
//! Without the `spilling` feature, case 3 always materializes.

use crate::pipeline::{Direction, Operation};
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Why a streaming source is read completely before any operation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterializeReason {
    Join,
    DescendingOrder,
    SpillingDisabled,
}

impl Display for MaterializeReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(match self {
            MaterializeReason::Join => "join needs the whole table",
            MaterializeReason::DescendingOrder => "descending order sorts in memory",
            MaterializeReason::SpillingDisabled => "spilling feature disabled",
        })
    }
}

/// How the runner drives a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// All operations over an in-memory table.
    InMemory,
    /// Load every batch, then run all operations in memory.
    MaterializeThenRun(MaterializeReason),
    /// Operations before `order_step` run per batch, each batch becomes a sorted run, the runs
    /// are merged, and the operations after `order_step` run in memory.
    ExternalSort { order_step: usize },
    /// The first `prefix_len` operations run per batch; the rest run once at the end.
    StreamBatches { prefix_len: usize },
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Strategy::InMemory => f.write_str("in-memory"),
            Strategy::MaterializeThenRun(reason) => write!(f, "materialize then run ({reason})"),
            Strategy::ExternalSort { order_step } => {
                write!(f, "external sort-merge at step {}", order_step + 1)
            }
            Strategy::StreamBatches { prefix_len } => {
                write!(f, "batch streaming ({prefix_len} per-batch step(s))")
            }
        }
    }
}

/// Where a single step runs under a strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    PerBatch,
    SortMerge,
    InMemory,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(match self {
            Phase::PerBatch => "per batch",
            Phase::SortMerge => "spill + merge",
            Phase::InMemory => "in memory",
        })
    }
}

/// The chosen strategy plus a per-step placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub strategy: Strategy,
    pub streaming: bool,
    pub steps: Vec<PlanStep>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanStep {
    /// 1-based position in the pipeline.
    pub step: usize,
    pub description: String,
    pub phase: Phase,
}

/// Choose a strategy for `ops`.
///
/// `spilling` says whether external sorting is available in this build.
pub fn build_plan(ops: &[Operation], streaming: bool, spilling: bool) -> Plan {
    let strategy = select_strategy(ops, streaming, spilling);
    let steps = ops
        .iter()
        .enumerate()
        .map(|(i, op)| PlanStep {
            step: i + 1,
            description: op.to_string(),
            phase: phase_of(strategy, i),
        })
        .collect();
    Plan {
        strategy,
        streaming,
        steps,
    }
}

fn select_strategy(ops: &[Operation], streaming: bool, spilling: bool) -> Strategy {
    if !streaming {
        return Strategy::InMemory;
    }
    if ops.iter().any(|op| matches!(op, Operation::Join { .. })) {
        return Strategy::MaterializeThenRun(MaterializeReason::Join);
    }
    if let Some((order_step, direction)) = first_ungrouped_order_by(ops) {
        return match direction {
            Direction::Descending => {
                Strategy::MaterializeThenRun(MaterializeReason::DescendingOrder)
            }
            Direction::Ascending if !spilling => {
                Strategy::MaterializeThenRun(MaterializeReason::SpillingDisabled)
            }
            Direction::Ascending => Strategy::ExternalSort { order_step },
        };
    }
    let prefix_len = ops.iter().take_while(|op| op.is_row_wise()).count();
    Strategy::StreamBatches { prefix_len }
}

/// The first order-by, when no group-by comes before it.
fn first_ungrouped_order_by(ops: &[Operation]) -> Option<(usize, Direction)> {
    for (i, op) in ops.iter().enumerate() {
        match op {
            Operation::GroupBy { .. } => return None,
            Operation::OrderBy { direction, .. } => return Some((i, *direction)),
            _ => {}
        }
    }
    None
}

fn phase_of(strategy: Strategy, index: usize) -> Phase {
    match strategy {
        Strategy::InMemory | Strategy::MaterializeThenRun(_) => Phase::InMemory,
        Strategy::ExternalSort { order_step } if index < order_step => Phase::PerBatch,
        Strategy::ExternalSort { order_step } if index == order_step => Phase::SortMerge,
        Strategy::ExternalSort { .. } => Phase::InMemory,
        Strategy::StreamBatches { prefix_len } if index < prefix_len => Phase::PerBatch,
        Strategy::StreamBatches { .. } => Phase::InMemory,
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "╔═══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(
            f,
            "║                    QUERY EXECUTION PLAN                       ║"
        )?;
        writeln!(
            f,
            "╚═══════════════════════════════════════════════════════════════╝"
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "┌─ STRATEGY ───────────────────────────────────────────────────┐"
        )?;
        writeln!(
            f,
            "│ Source:    {}",
            if self.streaming { "streaming" } else { "in memory" }
        )?;
        writeln!(f, "│ Strategy:  {}", self.strategy)?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "┌─ STEPS ──────────────────────────────────────────────────────┐"
        )?;
        if self.steps.is_empty() {
            writeln!(f, "│ (no operations; source rows pass through)")?;
        }
        for step in &self.steps {
            writeln!(f, "│ Step {}: {}", step.step, step.description)?;
            writeln!(f, "│   Runs: {}", step.phase)?;
        }
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::table::RowTable;
    use crate::value::Comparison;
    use std::sync::Arc;

    #[test]
    fn in_memory_source_never_streams() {
        let mut p = Pipeline::default();
        p.add_order_by("a", Direction::Ascending);
        assert_eq!(build_plan(p.operations(), false, true).strategy, Strategy::InMemory);
    }

    #[test]
    fn join_forces_materialization() {
        let mut p = Pipeline::default();
        p.add_filter("a", Comparison::Eq, 1).add_join(
            crate::pipeline::JoinKind::Inner,
            Arc::new(RowTable::empty(vec!["a".into()])),
            "a",
            "a",
        );
        assert_eq!(
            build_plan(p.operations(), true, true).strategy,
            Strategy::MaterializeThenRun(MaterializeReason::Join)
        );
    }

    #[test]
    fn order_by_selection() {
        let mut p = Pipeline::default();
        p.add_filter("a", Comparison::Gt, 1)
            .add_order_by("a", Direction::Ascending)
            .add_limit(5);
        let plan = build_plan(p.operations(), true, true);
        assert_eq!(plan.strategy, Strategy::ExternalSort { order_step: 1 });
        let phases: Vec<Phase> = plan.steps.iter().map(|s| s.phase).collect();
        assert_eq!(phases, vec![Phase::PerBatch, Phase::SortMerge, Phase::InMemory]);
        assert_eq!(
            build_plan(p.operations(), true, false).strategy,
            Strategy::MaterializeThenRun(MaterializeReason::SpillingDisabled)
        );
    }

    #[test]
    fn grouped_order_by_streams_the_prefix() {
        let mut p = Pipeline::default();
        p.add_filter("a", Comparison::Gt, 1)
            .add_limit(100)
            .add_group_by(["a"], None)
            .add_order_by("count", Direction::Descending);
        assert_eq!(
            build_plan(p.operations(), true, true).strategy,
            Strategy::StreamBatches { prefix_len: 2 }
        );
    }

    #[test]
    fn explanation_lists_steps() {
        let mut p = Pipeline::default();
        p.add_limit(3);
        let text = build_plan(p.operations(), true, true).to_string();
        assert!(text.contains("Step 1: Limit: 3"));
        assert!(text.contains("batch streaming"));
    }
}
