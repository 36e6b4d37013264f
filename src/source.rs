//! Loaded data sources.
//!
//! A delimited file loads either fully into a [`RowTable`] or as a [`StreamingSource`]: a
//! handle with the columns, the column types inferred from a head sample, and the path. A
//! streaming source reads its file again, batch by batch, each time a query runs.

use crate::config::{EngineConfig, LoadOptions};
use crate::error::{EngineError, Result};
use crate::infer::{SAMPLE_ROWS, infer_column_types};
use crate::parse::delimited::{BatchReader, DelimitedParser, FileInfo, probe_file};
use crate::table::{RowTable, unique_columns};
use crate::value::Kind;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Data a tabular query runs against.
#[derive(Clone, Debug)]
pub enum TableSource {
    InMemory(Arc<RowTable>),
    Streaming(StreamingSource),
}

impl TableSource {
    /// Load `path` according to `options`.
    ///
    /// Streaming is chosen when `options.batch_size` is set, or when the file is larger than
    /// `config.streaming_threshold_bytes`.
    ///
    /// # Errors
    /// [`EngineError::Load`] when the file cannot be read or its header stage fails.
    pub fn load(
        path: impl AsRef<Path>,
        options: &LoadOptions,
        config: &EngineConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let parser = options.parser();
        let batch_size = match (options.batch_size, config.streaming_threshold_bytes) {
            (Some(n), _) => Some(n),
            (None, Some(limit)) => {
                let size = std::fs::metadata(path)
                    .map_err(|e| EngineError::load(path.display().to_string(), e.to_string()))?
                    .len();
                (size > limit).then_some(config.batch_size)
            }
            (None, None) => None,
        };
        match batch_size {
            Some(n) => {
                debug!(path = %path.display(), batch_size = n, "loading in streaming mode");
                StreamingSource::open(path, parser, options.has_header, n)
                    .map(TableSource::Streaming)
            }
            None => {
                let parsed = parser.parse_file(path, options.has_header)?;
                Ok(TableSource::InMemory(Arc::new(RowTable::from_raw(
                    parsed.columns,
                    parsed.rows,
                ))))
            }
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, TableSource::Streaming(_))
    }

    pub fn columns(&self) -> &[String] {
        match self {
            TableSource::InMemory(t) => t.columns(),
            TableSource::Streaming(s) => s.columns(),
        }
    }

    pub fn column_types(&self) -> &[Kind] {
        match self {
            TableSource::InMemory(t) => t.column_types(),
            TableSource::Streaming(s) => s.column_types(),
        }
    }

    /// The first `n` rows.
    ///
    /// # Errors
    /// Read failures of a streaming source.
    pub fn preview(&self, n: usize) -> Result<RowTable> {
        match self {
            TableSource::InMemory(t) => Ok(t.head(n)),
            TableSource::Streaming(s) => s.head(n),
        }
    }

    /// Every row, in memory.
    ///
    /// # Errors
    /// Read failures of a streaming source.
    pub fn materialize(&self) -> Result<RowTable> {
        match self {
            TableSource::InMemory(t) => Ok(t.as_ref().clone()),
            TableSource::Streaming(s) => s.materialize(),
        }
    }
}

/// A delimited file read in batches.
#[derive(Clone, Debug)]
pub struct StreamingSource {
    info: FileInfo,
    parser: DelimitedParser,
    has_header: Option<bool>,
    types: Vec<Kind>,
    batch_size: usize,
}

impl StreamingSource {
    /// Probe the header and size, and infer column types from the first rows.
    ///
    /// # Errors
    /// [`EngineError::Load`] when the file cannot be opened or its header read.
    pub fn open(
        path: impl AsRef<Path>,
        parser: DelimitedParser,
        has_header: Option<bool>,
        batch_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let info = probe_file(path, &parser, has_header)?;
        let mut sample = BatchReader::open(path, parser, has_header, SAMPLE_ROWS)?;
        let columns = unique_columns(sample.columns().to_vec());
        let head = sample.next().transpose()?.map(|b| b.rows).unwrap_or_default();
        let types = infer_column_types(&head, &columns);
        Ok(Self {
            info: FileInfo { columns, ..info },
            parser,
            has_header,
            types,
            batch_size: batch_size.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.info.path
    }

    pub fn columns(&self) -> &[String] {
        &self.info.columns
    }

    pub fn column_types(&self) -> &[Kind] {
        &self.types
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.info
    }

    /// Open a fresh pass over the file, yielding typed batches.
    ///
    /// # Errors
    /// [`EngineError::Load`] when the file cannot be reopened.
    pub fn batches(&self) -> Result<impl Iterator<Item = Result<RowTable>> + '_> {
        let reader =
            BatchReader::open(&self.info.path, self.parser, self.has_header, self.batch_size)?;
        Ok(reader.map(move |batch| {
            let batch = batch?;
            Ok(RowTable::from_raw_typed(
                self.info.columns.clone(),
                batch.rows,
                self.types.clone(),
            ))
        }))
    }

    /// An empty table with this source's columns.
    pub fn empty(&self) -> RowTable {
        RowTable::empty(self.info.columns.clone())
    }

    /// Read every batch into one table.
    ///
    /// # Errors
    /// Read failures while streaming.
    pub fn materialize(&self) -> Result<RowTable> {
        let mut all = self.empty();
        for batch in self.batches()? {
            all.extend(batch?.into_rows());
        }
        Ok(all)
    }

    /// The first `n` rows, reading only as many batches as needed.
    ///
    /// # Errors
    /// Read failures while streaming.
    pub fn head(&self, n: usize) -> Result<RowTable> {
        let mut out = self.empty();
        if n == 0 {
            return Ok(out);
        }
        for batch in self.batches()? {
            let need = n - out.len();
            out.extend(batch?.into_rows().into_iter().take(need));
            if out.len() >= n {
                break;
            }
        }
        Ok(out)
    }
}

/// Path of a source, for messages.
pub(crate) fn source_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
