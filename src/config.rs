//! Engine and load configuration.

use crate::parse::delimited::{DelimitedParser, QuoteStyle};
use std::path::PathBuf;

/// Rows per batch when streaming and none is given at load.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Execution settings shared by every query a session runs.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Rows per streamed batch, and rows per sorted spill run.
    pub batch_size: usize,
    /// Where spill runs are written. `None` uses the system temp directory.
    pub spill_dir: Option<PathBuf>,
    /// Files larger than this load in streaming mode even without an explicit batch size.
    pub streaming_threshold_bytes: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            spill_dir: None,
            streaming_threshold_bytes: None,
        }
    }
}

/// How a delimited file is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: char,
    pub quote_char: char,
    pub quote_style: QuoteStyle,
    /// `None` detects the header from the first line.
    pub has_header: Option<bool>,
    /// `Some` loads in streaming mode with this batch size.
    pub batch_size: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_char: '"',
            quote_style: QuoteStyle::Doubled,
            has_header: None,
            batch_size: None,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    #[must_use]
    pub fn with_escape(mut self, escape: char) -> Self {
        self.quote_style = QuoteStyle::Escape(escape);
        self
    }

    #[must_use]
    pub fn streaming(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn parser(&self) -> DelimitedParser {
        DelimitedParser::new(self.delimiter, self.quote_char, self.quote_style)
    }
}
