//! Load, inspect, build and execute in one place.
//!
//! A session holds at most one loaded source and one pipeline. Builder calls append to the
//! pipeline and chain; [`TableSession::execute`] runs it without changing either, so the same
//! session can execute repeatedly.
//!
//! ```no_run
//! use flatnest::{Comparison, LoadOptions, TableSession};
//!
//! # fn main() -> flatnest::Result<()> {
//! let mut session = TableSession::default();
//! println!("{}", session.load("people.csv", LoadOptions::default())?);
//! session.add_filter("age", Comparison::Gt, 25).add_limit(10);
//! let result = session.execute()?;
//! println!("{} rows", result.len());
//! # Ok(()) }
//! ```

use crate::aggregates::AggFunc;
use crate::config::{EngineConfig, LoadOptions};
use crate::document::{DocValue, DocumentCollection};
use crate::error::{EngineError, Result};
use crate::parse::structured::parse_documents;
use crate::pipeline::{
    AggregateSpec, Direction, DocOperation, DocumentPipeline, JoinKind, Operation, Pipeline,
};
use crate::planner::Plan;
use crate::runner::Runner;
use crate::source::{TableSource, source_name};
use crate::table::RowTable;
use crate::value::{Comparison, Value};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::path::Path;
use std::sync::Arc;

/// Summary of a loaded source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    /// Row or document count; in streaming mode an estimate from the file size.
    pub records: u64,
    pub estimated: bool,
    /// Column or top-level field count.
    pub fields: usize,
    pub streaming: bool,
    pub batch_size: Option<usize>,
}

impl Display for SourceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let approx = if self.estimated { "~" } else { "" };
        write!(f, "{approx}{} records, {} fields", self.records, self.fields)?;
        if let Some(n) = self.batch_size.filter(|_| self.streaming) {
            write!(f, " (streaming, batch size {n})")?;
        }
        Ok(())
    }
}

fn no_data() -> EngineError {
    EngineError::load("session", "no data loaded")
}

/* ===================== TableSession ===================== */

#[derive(Debug, Default)]
pub struct TableSession {
    runner: Runner,
    source: Option<TableSource>,
    pipeline: Pipeline,
}

impl TableSession {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            runner: Runner::new(config),
            source: None,
            pipeline: Pipeline::default(),
        }
    }

    /// Load a delimited file, replacing any previous source. Returns a diagnostic message.
    ///
    /// # Errors
    /// [`EngineError::Load`] when the file cannot be read or its header stage fails.
    pub fn load(&mut self, path: impl AsRef<Path>, options: LoadOptions) -> Result<String> {
        let path = path.as_ref();
        let source = TableSource::load(path, &options, &self.runner.config)?;
        self.source = Some(source);
        let info = self.info().ok_or_else(no_data)?;
        Ok(format!("Loaded '{}': {info}", source_name(path)))
    }

    /// Use an in-memory table as the source.
    pub fn load_table(&mut self, table: RowTable) {
        self.source = Some(TableSource::InMemory(Arc::new(table)));
    }

    pub fn source(&self) -> Option<&TableSource> {
        self.source.as_ref()
    }

    /// Column names of the loaded source; empty before a load.
    pub fn columns(&self) -> &[String] {
        self.source.as_ref().map_or(&[][..], TableSource::columns)
    }

    /// First `n` rows of the source.
    ///
    /// # Errors
    /// [`EngineError::Load`] before a load; read failures of a streaming source.
    pub fn preview(&self, n: usize) -> Result<RowTable> {
        self.source.as_ref().ok_or_else(no_data)?.preview(n)
    }

    pub fn info(&self) -> Option<SourceInfo> {
        self.source.as_ref().map(|s| match s {
            TableSource::InMemory(t) => SourceInfo {
                records: t.len() as u64,
                estimated: false,
                fields: t.columns().len(),
                streaming: false,
                batch_size: None,
            },
            TableSource::Streaming(s) => SourceInfo {
                records: s.file_info().estimated_rows,
                estimated: true,
                fields: s.columns().len(),
                streaming: true,
                batch_size: Some(s.batch_size()),
            },
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn operations(&self) -> &[Operation] {
        self.pipeline.operations()
    }

    pub fn add_filter(
        &mut self,
        column: impl Into<String>,
        op: Comparison,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.pipeline.add_filter(column, op, value);
        self
    }

    pub fn add_select<S: Into<String>>(
        &mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.pipeline.add_select(columns);
        self
    }

    pub fn add_join(
        &mut self,
        kind: JoinKind,
        right: RowTable,
        left_key: impl Into<String>,
        right_key: impl Into<String>,
    ) -> &mut Self {
        self.pipeline.add_join(kind, Arc::new(right), left_key, right_key);
        self
    }

    pub fn add_group_by<S: Into<String>>(
        &mut self,
        columns: impl IntoIterator<Item = S>,
        aggregate: Option<(AggFunc, &str)>,
    ) -> &mut Self {
        self.pipeline
            .add_group_by(columns, aggregate.map(|(f, c)| AggregateSpec::new(f, c)));
        self
    }

    pub fn add_having(
        &mut self,
        func: AggFunc,
        op: Comparison,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.pipeline.add_having(func, op, value);
        self
    }

    pub fn add_order_by(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.pipeline.add_order_by(column, direction);
        self
    }

    pub fn add_limit(&mut self, count: usize) -> &mut Self {
        self.pipeline.add_limit(count);
        self
    }

    pub fn remove_operation(&mut self, index: usize) -> Option<Operation> {
        self.pipeline.remove_operation(index)
    }

    pub fn clear_operations(&mut self) {
        self.pipeline.clear_operations();
    }

    /// The strategy [`execute`](Self::execute) would use; `None` before a load.
    pub fn explain(&self) -> Option<Plan> {
        self.source
            .as_ref()
            .map(|s| self.runner.plan(s, &self.pipeline))
    }

    /// Run the pipeline against the loaded source.
    ///
    /// # Errors
    /// [`EngineError::Load`] before a load, otherwise whatever the pipeline raises.
    pub fn execute(&self) -> Result<RowTable> {
        let source = self.source.as_ref().ok_or_else(no_data)?;
        self.runner.run(source, &self.pipeline)
    }
}

/* ===================== DocumentSession ===================== */

#[derive(Debug, Default)]
pub struct DocumentSession {
    runner: Runner,
    docs: Option<DocumentCollection>,
    pipeline: DocumentPipeline,
}

impl DocumentSession {
    /// Load a structured-text file: one document, or one document per line.
    ///
    /// # Errors
    /// [`EngineError::Load`] when the file cannot be read or no document parses.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let name = source_name(path);
        let text =
            std::fs::read_to_string(path).map_err(|e| EngineError::load(&name, e.to_string()))?;
        let tree = parse_documents(&text).map_err(|e| EngineError::load(&name, e.to_string()))?;
        self.docs = Some(DocumentCollection::from_value(tree));
        let info = self.info().ok_or_else(no_data)?;
        Ok(format!("Loaded '{name}': {info}"))
    }

    /// Parse `text` directly.
    ///
    /// # Errors
    /// [`EngineError::Parse`] when no document parses.
    pub fn load_text(&mut self, text: &str) -> Result<usize> {
        let docs = DocumentCollection::from_value(parse_documents(text)?);
        let n = docs.len();
        self.docs = Some(docs);
        Ok(n)
    }

    pub fn load_collection(&mut self, docs: DocumentCollection) {
        self.docs = Some(docs);
    }

    pub fn collection(&self) -> Option<&DocumentCollection> {
        self.docs.as_ref()
    }

    /// Dot-path fields of the first document; empty before a load.
    pub fn fields(&self) -> Vec<String> {
        self.docs.as_ref().map(DocumentCollection::fields).unwrap_or_default()
    }

    pub fn preview(&self, n: usize) -> &[DocValue] {
        self.docs.as_ref().map_or(&[][..], |d| d.preview(n))
    }

    pub fn info(&self) -> Option<SourceInfo> {
        self.docs.as_ref().map(|d| SourceInfo {
            records: d.len() as u64,
            estimated: false,
            fields: d.docs().first().map_or(0, |doc| match doc {
                DocValue::Object(map) => map.len(),
                _ => 0,
            }),
            streaming: false,
            batch_size: None,
        })
    }

    pub fn operations(&self) -> &[DocOperation] {
        self.pipeline.operations()
    }

    pub fn add_filter(
        &mut self,
        field: impl Into<String>,
        op: Comparison,
        value: impl Into<String>,
    ) -> &mut Self {
        self.pipeline.add_filter(field, op, value);
        self
    }

    pub fn add_join(
        &mut self,
        secondary: DocumentCollection,
        main_field: impl Into<String>,
        join_field: impl Into<String>,
    ) -> &mut Self {
        self.pipeline.add_join(Arc::new(secondary), main_field, join_field);
        self
    }

    pub fn add_projection<S: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.pipeline.add_projection(fields);
        self
    }

    pub fn add_group_by(&mut self, field: impl Into<String>) -> &mut Self {
        self.pipeline.add_group_by(field);
        self
    }

    pub fn add_limit(&mut self, count: usize) -> &mut Self {
        self.pipeline.add_limit(count);
        self
    }

    pub fn remove_operation(&mut self, index: usize) -> Option<DocOperation> {
        self.pipeline.remove_operation(index)
    }

    pub fn clear_operations(&mut self) {
        self.pipeline.clear_operations();
    }

    /// Run the pipeline against the loaded documents.
    ///
    /// # Errors
    /// [`EngineError::Load`] before a load.
    pub fn execute(&self) -> Result<Vec<DocValue>> {
        let docs = self.docs.as_ref().ok_or_else(no_data)?;
        Ok(self.runner.run_documents(docs, &self.pipeline))
    }
}
