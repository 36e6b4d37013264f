//! # flatnest
//!
//! A small **query engine** over two data shapes: flat rows read from delimited text, and
//! nested documents read from structured text. Both are queried with an ordered pipeline of
//! operations that runs in memory or, for large delimited files, batch by batch with an
//! external sort-merge for ordering.
//!
//! ## Key Features
//!
//! - **Parsers written from scratch** - delimited lines with doubled-quote or escape-character
//!   quoting, and a recursive-descent structured-text parser with a compact serializer
//! - **Type inference** - null/boolean/integer/float/date/string per token and per column
//! - **Tabular operations** - filter, select, hash join (inner/left/right/full), group-by with
//!   aggregates, having, order-by, limit
//! - **Document operations** - filter, lookup join, projection, group-by, limit over dot paths
//! - **Streaming** - bounded-memory batches with early stop on a satisfied limit
//! - **External sort** - sorted runs spilled to temp files and merged (feature `spilling`)
//!
//! ## Quick Start
//!
//! ```
//! use flatnest::{AggFunc, Direction, TableSession};
//! use flatnest::testing::sales_table;
//!
//! # fn main() -> flatnest::Result<()> {
//! let mut session = TableSession::default();
//! session.load_table(sales_table());
//! session
//!     .add_group_by(["category"], Some((AggFunc::Sum, "amount")))
//!     .add_order_by("sum", Direction::Descending);
//!
//! let result = session.execute()?;
//! assert_eq!(result.columns(), &["category", "sum"]);
//! assert_eq!(result.len(), 2);
//! # Ok(()) }
//! ```
//!
//! ## Core Concepts
//!
//! ### Sources
//!
//! A [`TableSource`] is either an in-memory [`RowTable`] or a [`StreamingSource`]: the column
//! names and inferred types of a delimited file plus its path. Streaming is chosen with
//! [`LoadOptions::streaming`] or [`EngineConfig::streaming_threshold_bytes`].
//!
//! ### Pipelines
//!
//! [`Pipeline`] and [`DocumentPipeline`] hold operation descriptors in the order they were
//! added. Nothing runs until a [`Runner`] (or a session) executes them. Descriptors are never
//! reordered.
//!
//! ### Strategies
//!
//! Before running, the [`planner`] picks one strategy: in memory, materialize then run,
//! per-batch streaming, or external sort-merge. [`TableSession::explain`] renders the choice.
//!
//! ### Errors
//!
//! Every fallible call returns [`Result`] with an [`EngineError`]. A row that fails to compare
//! is not an error: it is excluded and logged at debug level through `tracing`.
//!
//! ## Feature Flags
//!
//! - `spilling` (default) - external sort-merge with `postcard`-encoded runs. Without it, an
//!   ascending order-by over a streaming source loads the whole file and sorts in memory.

pub mod aggregates;
pub mod config;
pub mod document;
pub mod documents;
pub mod error;
pub mod infer;
pub mod joins;
pub mod operators;
pub mod parse;
pub mod pipeline;
pub mod planner;
pub mod runner;
pub mod session;
pub mod source;
#[cfg(feature = "spilling")]
pub mod spill;
pub mod table;
pub mod testing;
pub mod value;

// General re-exports
pub use aggregates::AggFunc;
pub use config::{EngineConfig, LoadOptions};
pub use document::{CollectionShape, DocMap, DocValue, DocumentCollection};
pub use error::{EngineError, Result, RowEvalError};
pub use infer::{infer_column_types, infer_type};
pub use parse::delimited::{DelimitedParser, QuoteStyle};
pub use parse::structured::{parse_document, parse_documents};
pub use pipeline::{
    AggregateSpec, Direction, DocOperation, DocumentPipeline, JoinKind, Operation, Pipeline,
};
pub use planner::{Plan, Strategy};
pub use runner::Runner;
pub use session::{DocumentSession, SourceInfo, TableSession};
pub use source::{StreamingSource, TableSource};
pub use table::{Row, RowTable};
pub use value::{Comparison, Kind, Value};
