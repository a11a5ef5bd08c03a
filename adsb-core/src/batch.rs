//! Batch driver: read `<timestamp> <hex>` sources in order and collect the
//! emitted rows into an [`AircraftTable`].
//!
//! Sources are processed in lexicographic path order and lines in file order.
//! Rows keep that traversal order; there is no global timestamp sort.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::decode::{Decoder, ModeS};
use crate::frame::parse_line;
use crate::store::OutputRow;
use crate::table::AircraftTable;
use crate::tracker::{ClassCounts, Tracker};
use crate::types::{AdsbError, Result};

/// Lines skipped, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkippedLines {
    pub bad_timestamp: u64,
    pub bad_hex: u64,
    pub malformed: u64,
}

impl SkippedLines {
    pub fn total(&self) -> u64 {
        self.bad_timestamp + self.bad_hex + self.malformed
    }
}

/// Counters for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub sources: u64,
    pub lines_read: u64,
    pub blank_lines: u64,
    /// Timestamps that only parsed after stripping NUL bytes
    pub recovered_timestamps: u64,
    pub skipped: SkippedLines,
    pub frames: u64,
    pub identification: u64,
    pub airborne_position: u64,
    pub airborne_velocity: u64,
    pub unhandled: u64,
    pub fusion_attempts: u64,
    pub stale_pairs: u64,
    /// Pairs inside the window the decoder could not resolve
    pub ambiguous_pairs: u64,
    pub velocity_misses: u64,
    pub callsign_misses: u64,
    pub rows_emitted: u64,
    pub aircraft: u64,
}

/// Drives a [`Tracker`] over line sources and accumulates output rows.
pub struct BatchDriver<D = ModeS> {
    tracker: Tracker<D>,
    rows: Vec<OutputRow>,
    sources: u64,
    lines_read: u64,
    blank_lines: u64,
    recovered_timestamps: u64,
    skipped: SkippedLines,
}

impl BatchDriver<ModeS> {
    pub fn with_window(pair_window: f64) -> Self {
        BatchDriver::new(Tracker::with_window(pair_window))
    }
}

impl Default for BatchDriver<ModeS> {
    fn default() -> Self {
        BatchDriver::new(Tracker::default())
    }
}

impl<D: Decoder> BatchDriver<D> {
    pub fn new(tracker: Tracker<D>) -> Self {
        BatchDriver {
            tracker,
            rows: Vec::new(),
            sources: 0,
            lines_read: 0,
            blank_lines: 0,
            recovered_timestamps: 0,
            skipped: SkippedLines::default(),
        }
    }

    pub fn tracker(&self) -> &Tracker<D> {
        &self.tracker
    }

    /// Rows emitted so far, in traversal order.
    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    /// Feed one input line.
    ///
    /// Line-level errors are counted and skipped; any other error is returned.
    pub fn process_line(&mut self, line: &str) -> Result<Option<&OutputRow>> {
        self.lines_read += 1;

        if line.trim().is_empty() {
            self.blank_lines += 1;
            return Ok(None);
        }

        let parsed = match parse_line(line) {
            Ok(p) => p,
            Err(e) if e.is_line_error() => {
                self.skip(&e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if parsed.recovered {
            self.recovered_timestamps += 1;
        }

        match self.tracker.update(&parsed.frame) {
            Some(row) => {
                self.rows.push(row);
                Ok(self.rows.last())
            }
            None => Ok(None),
        }
    }

    fn skip(&mut self, e: &AdsbError) {
        match e {
            AdsbError::InvalidTimestamp(_) => self.skipped.bad_timestamp += 1,
            AdsbError::InvalidHex(_) | AdsbError::FrameTooWide { .. } => {
                self.skipped.bad_hex += 1
            }
            _ => self.skipped.malformed += 1,
        }
        debug!(line = self.lines_read, "skipping line: {e}");
    }

    /// Feed every line of `reader`. Invalid UTF-8 is replaced, not fatal.
    pub fn process_reader<R: BufRead>(&mut self, reader: R) -> Result<u64> {
        let before = self.rows.len();
        for chunk in reader.split(b'\n') {
            let bytes = chunk?;
            let line = String::from_utf8_lossy(&bytes);
            self.process_line(&line)?;
        }
        Ok((self.rows.len() - before) as u64)
    }

    /// Process one file. Failing to open or read it is fatal.
    pub fn process_file(&mut self, path: &Path) -> Result<u64> {
        let file = File::open(path).map_err(|source| AdsbError::Source {
            path: path.to_path_buf(),
            source,
        })?;

        let skipped_before = self.skipped.total();
        let recovered_before = self.recovered_timestamps;
        let emitted = self
            .process_reader(BufReader::new(file))
            .map_err(|e| match e {
                AdsbError::Io(source) => AdsbError::Source {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            })?;
        self.sources += 1;

        let skipped = self.skipped.total() - skipped_before;
        if skipped > 0 {
            warn!(source = %path.display(), skipped, "skipped malformed lines");
        }
        let recovered = self.recovered_timestamps - recovered_before;
        if recovered > 0 {
            warn!(source = %path.display(), recovered, "timestamps recovered by stripping NUL bytes");
        }
        info!(source = %path.display(), rows = emitted, "source done");
        Ok(emitted)
    }

    /// Process all sources in lexicographic order.
    pub fn process_sources(&mut self, sources: &[PathBuf]) -> Result<u64> {
        let mut ordered = sources.to_vec();
        ordered.sort();

        let mut emitted = 0;
        for path in &ordered {
            emitted += self.process_file(path)?;
        }
        Ok(emitted)
    }

    /// Discover sources under `inputs` and process them.
    pub fn process_inputs(&mut self, inputs: &[PathBuf], pattern: Option<&str>) -> Result<u64> {
        let sources = discover_sources(inputs, pattern)?;
        if sources.is_empty() {
            warn!("no input files found");
        }
        info!(
            count = sources.len(),
            pair_window = self.tracker.pair_window(),
            "processing sources"
        );
        self.process_sources(&sources)
    }

    pub fn stats(&self) -> BatchStats {
        let t = &self.tracker;
        let ClassCounts {
            identification,
            airborne_position,
            airborne_velocity,
            unhandled,
        } = t.classes;

        BatchStats {
            sources: self.sources,
            lines_read: self.lines_read,
            blank_lines: self.blank_lines,
            recovered_timestamps: self.recovered_timestamps,
            skipped: self.skipped,
            frames: t.total_frames,
            identification,
            airborne_position,
            airborne_velocity,
            unhandled,
            fusion_attempts: t.fusion_attempts,
            stale_pairs: t.stale_pairs,
            ambiguous_pairs: t.unresolved_pairs,
            velocity_misses: t.velocity_misses,
            callsign_misses: t.callsign_misses,
            rows_emitted: t.rows_emitted,
            aircraft: t.store().len() as u64,
        }
    }

    /// Materialize the collected rows into the output table.
    pub fn finish(self) -> (AircraftTable, BatchStats) {
        let stats = self.stats();
        (AircraftTable::from_rows(&self.rows), stats)
    }
}

// ---------------------------------------------------------------------------
// Source discovery
// ---------------------------------------------------------------------------

/// Expand inputs into a sorted list of source files.
///
/// Directories expand to their regular files whose name matches `pattern`
/// (all files when `None`). Explicit file arguments are taken as-is. A path
/// that does not exist is an error.
pub fn discover_sources(inputs: &[PathBuf], pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    for input in inputs {
        let meta = std::fs::metadata(input).map_err(|source| AdsbError::Source {
            path: input.clone(),
            source,
        })?;

        if !meta.is_dir() {
            sources.push(input.clone());
            continue;
        }

        let entries = std::fs::read_dir(input).map_err(|source| AdsbError::Source {
            path: input.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let keep = match pattern {
                Some(p) => wildcard_match(p, &name.to_string_lossy()),
                None => true,
            };
            if keep {
                sources.push(entry.path());
            }
        }
    }

    sources.sort();
    sources.dedup();
    Ok(sources)
}

/// Match `name` against a glob with `*` (any run) and `?` (one char).
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            // Backtrack: let the last star absorb one more char
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
