//! External sort-merge for ordering more rows than one batch.
//!
//! Phase 1 sorts each batch in memory and writes it as a run to its own temporary file.
//! Phase 2 merges the runs with a min-heap keyed by `(sort key, run index)`, reading one row
//! per run at a time. Ties between runs resolve by run index, and each run is stably sorted, so
//! the merged order equals a stable in-memory sort of the concatenated input.
//!
//! Runs are length-prefixed `postcard` frames (`u32` little-endian length, then the encoded
//! row). Run files are deleted when the sorter is dropped, on success and on error alike.

use crate::operators::sort_rows;
use crate::pipeline::Direction;
use crate::table::{Row, cell};
use crate::value::SortKey;
use anyhow::{Context, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const SPILL_PREFIX: &str = "flatnest-run-";

/// Accumulates sorted runs on disk, then merges them.
pub struct SpillSorter {
    dir: PathBuf,
    column: usize,
    runs: Vec<NamedTempFile>,
    rows_spilled: usize,
}

impl SpillSorter {
    /// Sort on column `column`, writing runs under `dir` (the system temp dir when `None`).
    pub fn new(dir: Option<&Path>, column: usize) -> Self {
        Self {
            dir: dir.map_or_else(std::env::temp_dir, Path::to_path_buf),
            column,
            runs: Vec::new(),
            rows_spilled: 0,
        }
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn rows_spilled(&self) -> usize {
        self.rows_spilled
    }

    /// Paths of the run files currently on disk.
    pub fn run_paths(&self) -> Vec<PathBuf> {
        self.runs.iter().map(|r| r.path().to_path_buf()).collect()
    }

    /// Sort `rows` and write them as one run. Empty input writes nothing.
    ///
    /// # Errors
    /// Temp file creation, encoding, or write failures.
    pub fn push_run(&mut self, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows = sort_rows(rows, self.column, Direction::Ascending);
        let file = tempfile::Builder::new()
            .prefix(SPILL_PREFIX)
            .suffix(".run")
            .tempfile_in(&self.dir)
            .with_context(|| format!("creating spill run in {}", self.dir.display()))?;
        let mut w = BufWriter::new(file.as_file());
        for row in &rows {
            write_frame(&mut w, row)?;
        }
        w.flush()
            .with_context(|| format!("flushing spill run {}", file.path().display()))?;
        drop(w);
        debug!(
            run = self.runs.len(),
            rows = rows.len(),
            path = %file.path().display(),
            "spilled sorted run"
        );
        self.rows_spilled += rows.len();
        self.runs.push(file);
        Ok(())
    }

    /// Merge every run in ascending order, stopping after `limit` rows when given.
    ///
    /// Consumes the sorter; run files are removed before returning.
    ///
    /// # Errors
    /// Read or decode failures of a run file.
    pub fn merge(mut self, limit: Option<usize>) -> Result<Vec<Row>> {
        let runs = std::mem::take(&mut self.runs);
        let merged = merge_runs(&runs, self.column, limit);
        for run in runs {
            let path = run.path().to_path_buf();
            if let Err(e) = run.close() {
                warn!(path = %path.display(), error = %e, "failed to remove spill run");
            }
        }
        merged
    }
}

fn merge_runs(runs: &[NamedTempFile], column: usize, limit: Option<usize>) -> Result<Vec<Row>> {
    let mut readers = runs
        .iter()
        .map(|run| {
            let f = run
                .reopen()
                .with_context(|| format!("reopening spill run {}", run.path().display()))?;
            Ok(BufReader::new(f))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut heads: Vec<Option<Row>> = vec![None; readers.len()];
    let mut heap: BinaryHeap<Reverse<(SortKey, usize)>> = BinaryHeap::new();
    for (i, r) in readers.iter_mut().enumerate() {
        if let Some(row) = read_frame(r)? {
            heap.push(Reverse((SortKey::of(cell(&row, column)), i)));
            heads[i] = Some(row);
        }
    }

    let cap = limit.unwrap_or(usize::MAX);
    let mut out = Vec::new();
    while out.len() < cap {
        let Some(Reverse((_, i))) = heap.pop() else {
            break;
        };
        if let Some(row) = heads[i].take() {
            out.push(row);
        }
        if let Some(next) = read_frame(&mut readers[i])? {
            heap.push(Reverse((SortKey::of(cell(&next, column)), i)));
            heads[i] = Some(next);
        }
    }
    Ok(out)
}

fn write_frame(w: &mut impl Write, row: &Row) -> Result<()> {
    let bytes = postcard::to_allocvec(row).context("encoding spill row")?;
    let len = u32::try_from(bytes.len()).context("spill row exceeds frame size")?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&bytes)?;
    Ok(())
}

/// Next frame of a run, `None` at a clean end of file.
fn read_frame(r: &mut BufReader<File>) -> Result<Option<Row>> {
    let mut len = [0u8; 4];
    match r.read_exact(&mut len) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("reading spill frame header"),
    }
    let mut buf = vec![0u8; u32::from_le_bytes(len) as usize];
    r.read_exact(&mut buf).context("reading spill frame body")?;
    let row = postcard::from_bytes(&buf).context("decoding spill row")?;
    Ok(Some(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn rows(vals: &[i64]) -> Vec<Row> {
        vals.iter()
            .enumerate()
            .map(|(i, v)| vec![Value::Int(*v), Value::Int(i as i64)])
            .collect()
    }

    #[test]
    fn merge_matches_in_memory_sort() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = rows(&[5, 3, 9, 3, 1, 7, 5, 0, 2]);
        let mut sorter = SpillSorter::new(Some(dir.path()), 0);
        for chunk in input.chunks(4) {
            sorter.push_run(chunk.to_vec())?;
        }
        assert_eq!(sorter.run_count(), 3);
        let merged = sorter.merge(None)?;
        assert_eq!(merged, sort_rows(input, 0, Direction::Ascending));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn limit_stops_the_merge() -> anyhow::Result<()> {
        let mut sorter = SpillSorter::new(None, 0);
        sorter.push_run(rows(&[4, 2]))?;
        sorter.push_run(rows(&[3, 1]))?;
        let paths = sorter.run_paths();
        let merged = sorter.merge(Some(3))?;
        let keys: Vec<Value> = merged.iter().map(|r| r[0].clone()).collect();
        assert_eq!(keys, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(paths.iter().all(|p| !p.exists()));
        Ok(())
    }

    #[test]
    fn dropped_sorter_removes_runs() -> anyhow::Result<()> {
        let mut sorter = SpillSorter::new(None, 0);
        sorter.push_run(rows(&[1]))?;
        let paths = sorter.run_paths();
        drop(sorter);
        assert!(paths.iter().all(|p| !p.exists()));
        Ok(())
    }
}
