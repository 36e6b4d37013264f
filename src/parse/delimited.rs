//! Delimited-text parsing: single lines, whole inputs, and bounded-memory batches.
//!
//! This module provides:
//! - **Line tokenizing** with two quoting conventions: [`QuoteStyle::Doubled`] (`""` inside a
//!   quoted field is a literal quote) and [`QuoteStyle::Escape`] (an escape character makes the
//!   next character literal).
//! - **Header detection**: the first line is a header when fewer than half its fields are
//!   numeric; otherwise columns are named `column_0`, `column_1`, ...
//! - **One-shot parsing** into raw string rows: [`DelimitedParser::parse_str`].
//! - **Streaming** in fixed-size batches: [`BatchReader`].
//! - **File probing** without a full scan: [`probe_file`].
//!
//! # Notes
//! - Malformed quoting never fails; an unterminated quote closes at end of line.
//! - Empty and whitespace-only lines are skipped everywhere.
//! - Lines that are not valid UTF-8 are skipped with a warning, whether the file is read in
//!   one pass or streamed.

use crate::error::{EngineError, Result};
use crate::infer::is_numeric;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Bytes per row assumed by [`probe_file`]. A deliberately crude constant.
pub const ESTIMATED_BYTES_PER_ROW: u64 = 100;

/// How quote characters inside a quoted field are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteStyle {
    /// A doubled quote character inside quotes stands for one quote character.
    Doubled,
    /// The given escape character makes the following character literal.
    Escape(char),
}

/// Tokenizer configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelimitedParser {
    pub delimiter: char,
    pub quote: char,
    pub style: QuoteStyle,
}

impl Default for DelimitedParser {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            style: QuoteStyle::Doubled,
        }
    }
}

/// Raw output of a one-shot parse: column names and untyped rows.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedText {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DelimitedParser {
    pub fn new(delimiter: char, quote: char, style: QuoteStyle) -> Self {
        Self {
            delimiter,
            quote,
            style,
        }
    }

    /// Split one line into trimmed fields.
    pub fn parse_line(&self, line: &str) -> Vec<String> {
        let line = line.trim_end_matches(['\n', '\r']);
        let chars: Vec<char> = line.chars().collect();
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut escape_pending = false;

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if escape_pending {
                current.push(c);
                escape_pending = false;
            } else if matches!(self.style, QuoteStyle::Escape(e) if e == c) {
                escape_pending = true;
            } else if c == self.quote {
                if self.style == QuoteStyle::Doubled
                    && in_quotes
                    && chars.get(i + 1) == Some(&self.quote)
                {
                    current.push(c);
                    i += 1;
                } else {
                    in_quotes = !in_quotes;
                }
            } else if c == self.delimiter && !in_quotes {
                fields.push(current.trim().to_string());
                current.clear();
            } else {
                current.push(c);
            }
            i += 1;
        }
        fields.push(current.trim().to_string());
        fields
    }

    /// Parse a whole input held in memory.
    ///
    /// `has_header`: `Some(flag)` trusts the caller, `None` runs [`detect_header`].
    pub fn parse_str(&self, text: &str, has_header: Option<bool>) -> ParsedText {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(first) = lines.next() else {
            return ParsedText {
                columns: Vec::new(),
                rows: Vec::new(),
            };
        };
        let (columns, first_row) = self.header_or_row(first, has_header);
        let rows = first_row
            .into_iter()
            .chain(lines.map(|l| self.parse_line(l)))
            .collect();
        ParsedText { columns, rows }
    }

    /// Parse a file in one pass.
    ///
    /// Lines are read exactly as [`BatchReader`] reads them: blank lines and lines that are
    /// not valid UTF-8 are skipped, the latter with a warning.
    ///
    /// # Errors
    /// [`EngineError::Load`] when the file cannot be read or its header line is not UTF-8.
    pub fn parse_file(
        &self,
        path: impl AsRef<Path>,
        has_header: Option<bool>,
    ) -> Result<ParsedText> {
        let path = path.as_ref();
        let mut reader = BatchReader::open(path, *self, has_header, usize::MAX)?;
        let columns = reader.columns().to_vec();
        let mut rows = Vec::new();
        for batch in &mut reader {
            let batch =
                batch.map_err(|e| EngineError::load(path.display().to_string(), e.to_string()))?;
            rows.extend(batch.rows);
        }
        Ok(ParsedText { columns, rows })
    }

    /// Resolve the first line into column names, returning it as a data row when it is not a
    /// header.
    fn header_or_row(
        &self,
        first: &str,
        has_header: Option<bool>,
    ) -> (Vec<String>, Option<Vec<String>>) {
        let fields = self.parse_line(first);
        if has_header.unwrap_or_else(|| detect_header(&fields)) {
            (fields, None)
        } else {
            (synthesize_columns(fields.len()), Some(fields))
        }
    }
}

/// Decide whether a parsed first line is a header: fewer than half the fields are numeric.
pub fn detect_header(fields: &[String]) -> bool {
    let numeric = fields.iter().filter(|f| is_numeric(f)).count();
    numeric * 2 < fields.len()
}

/// `column_0`, `column_1`, ... for headerless input.
pub fn synthesize_columns(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("column_{i}")).collect()
}

/// One bounded chunk of rows from a streaming parse.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBatch {
    pub rows: Vec<Vec<String>>,
    /// 0-based position of this batch in the stream.
    pub batch_index: usize,
    /// Data rows yielded so far, this batch included.
    pub total_rows: usize,
    /// No rows follow this batch.
    pub is_last: bool,
}

impl RawBatch {
    pub fn rows_in_batch(&self) -> usize {
        self.rows.len()
    }
}

/// Streaming reader yielding [`RawBatch`]es of at most `batch_size` rows.
///
/// The header is read when the reader is opened. Each batch is exact about `is_last` because
/// the reader keeps one parsed row of look-ahead.
pub struct BatchReader<R> {
    reader: R,
    parser: DelimitedParser,
    columns: Vec<String>,
    batch_size: usize,
    batch_index: usize,
    total_rows: usize,
    lookahead: Option<Vec<String>>,
    line_no: usize,
    buf: Vec<u8>,
}

impl BatchReader<BufReader<File>> {
    /// Open `path` and read its header line.
    ///
    /// # Errors
    /// [`EngineError::Load`] when the file cannot be opened or the header line cannot be read.
    pub fn open(
        path: impl AsRef<Path>,
        parser: DelimitedParser,
        has_header: Option<bool>,
        batch_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let f = File::open(path).map_err(|e| EngineError::load(&name, e.to_string()))?;
        Self::from_reader(BufReader::new(f), parser, has_header, batch_size)
            .map_err(|e| EngineError::load(name, e.to_string()))
    }
}

impl<R: BufRead> BatchReader<R> {
    /// Wrap any buffered reader; the header stage runs immediately.
    ///
    /// # Errors
    /// Propagates I/O failures and a non-UTF-8 header line.
    pub fn from_reader(
        reader: R,
        parser: DelimitedParser,
        has_header: Option<bool>,
        batch_size: usize,
    ) -> Result<Self> {
        let mut this = Self {
            reader,
            parser,
            columns: Vec::new(),
            batch_size: batch_size.max(1),
            batch_index: 0,
            total_rows: 0,
            lookahead: None,
            line_no: 0,
            buf: Vec::new(),
        };
        // The header stage is strict: a bad first line fails the load.
        while let Some(line) = this.next_raw_line()? {
            let line = String::from_utf8(line).map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "header line is not valid UTF-8",
                )
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let (columns, first_row) = this.parser.header_or_row(&line, has_header);
            this.columns = columns;
            this.lookahead = first_row;
            break;
        }
        if this.lookahead.is_none() {
            this.lookahead = this.next_row()?;
        }
        Ok(this)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_raw_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(std::mem::take(&mut self.buf)))
    }

    /// Next parsed data row, skipping blank and non-UTF-8 lines.
    fn next_row(&mut self) -> std::io::Result<Option<Vec<String>>> {
        while let Some(bytes) = self.next_raw_line()? {
            match String::from_utf8(bytes) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Ok(Some(self.parser.parse_line(&line))),
                Err(_) => {
                    warn!(line = self.line_no, "skipping line that is not valid UTF-8");
                    continue;
                }
            }
        }
        Ok(None)
    }

    fn fill_batch(&mut self) -> Result<Option<RawBatch>> {
        let Some(first) = self.lookahead.take() else {
            return Ok(None);
        };
        let mut rows = Vec::with_capacity(self.batch_size.min(4096));
        rows.push(first);
        while rows.len() < self.batch_size {
            match self.next_row()? {
                Some(r) => rows.push(r),
                None => break,
            }
        }
        self.lookahead = self.next_row()?;
        self.total_rows += rows.len();
        let batch = RawBatch {
            rows,
            batch_index: self.batch_index,
            total_rows: self.total_rows,
            is_last: self.lookahead.is_none(),
        };
        trace!(
            batch = batch.batch_index,
            rows = batch.rows_in_batch(),
            total = batch.total_rows,
            "read batch"
        );
        self.batch_index += 1;
        Ok(Some(batch))
    }
}

impl<R: BufRead> Iterator for BatchReader<R> {
    type Item = Result<RawBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fill_batch().transpose()
    }
}

/// Header and rough size of a delimited file.
#[derive(Clone, Debug, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub file_size: u64,
    /// `file_size / 100`. An approximation for previews, not a row count.
    pub estimated_rows: u64,
}

/// Read only the header line and the file size.
///
/// # Errors
/// [`EngineError::Load`] when the file cannot be opened or read.
pub fn probe_file(
    path: impl AsRef<Path>,
    parser: &DelimitedParser,
    has_header: Option<bool>,
) -> Result<FileInfo> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let load_err = |e: std::io::Error| EngineError::load(&name, e.to_string());
    let file_size = std::fs::metadata(path).map_err(load_err)?.len();
    let f = File::open(path).map_err(load_err)?;
    let mut first = String::new();
    BufReader::new(f)
        .take(1 << 20)
        .read_line(&mut first)
        .map_err(load_err)?;
    let columns = if first.trim().is_empty() {
        Vec::new()
    } else {
        parser.header_or_row(&first, has_header).0
    };
    Ok(FileInfo {
        path: path.to_path_buf(),
        columns,
        file_size,
        estimated_rows: file_size / ESTIMATED_BYTES_PER_ROW,
    })
}
