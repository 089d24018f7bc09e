//! Parse lens module
//!
//! This module turns MRT/RIB archives into [`PrefixTable`]s. Decoding of the
//! MRT records themselves is done by `bgpkit-parser`; this lens frames the
//! records, picks the origin of every prefix and keeps track of progress
//! and malformed records.
//!
//! The [`ArchiveParser`] trait is the seam the conversion driver works
//! against. [`MrtArchiveParser`] is the production implementation.
//!
//! # Progress Tracking
//!
//! ```rust,ignore
//! use ipasn_convert::lens::parse::{ArchiveParser, MrtArchiveParser, ParseOptions, ParseProgress};
//! use std::sync::Arc;
//!
//! let callback = Arc::new(|progress: ParseProgress| {
//!     if let ParseProgress::Completed { total_records, prefixes, .. } = progress {
//!         println!("{} records, {} prefixes", total_records, prefixes);
//!     }
//! });
//! let options = ParseOptions::default().with_progress(callback);
//! let outcome = MrtArchiveParser::new().parse("rib.20200101.0000.bz2".as_ref(), &options)?;
//! ```

mod records;

use crate::datasets::ipasn::{Origin, PrefixTable};
use crate::error::{ConvertError, Result};
use bgpkit_parser::{BgpElem, Elementor};
use chrono::DateTime;
use ipnet::IpNet;
use records::{Frame, RecordReader};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// =============================================================================
// Progress Tracking Types
// =============================================================================

/// Default progress update interval (every 10,000 records)
pub const PARSE_PROGRESS_INTERVAL: u64 = 10_000;

/// Progress information for archive parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParseProgress {
    /// Parsing has started
    Started {
        /// Path to the archive being parsed
        file_path: String,
    },
    /// Periodic update
    Update {
        /// Records read so far, including skipped ones
        records_processed: u64,
        /// Distinct prefixes collected so far
        prefixes: usize,
        /// Malformed records skipped so far
        skipped: u64,
        /// Elapsed time in seconds
        elapsed_secs: f64,
        /// Records per second (if available)
        #[serde(skip_serializing_if = "Option::is_none")]
        rate: Option<f64>,
    },
    /// Parsing has completed
    Completed {
        total_records: u64,
        prefixes: usize,
        skipped: u64,
        duration_secs: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        rate: Option<f64>,
    },
}

/// Callback receiving [`ParseProgress`] updates.
pub type ParseProgressCallback = Arc<dyn Fn(ParseProgress) + Send + Sync>;

fn rate_of(count: u64, elapsed_secs: f64) -> Option<f64> {
    if elapsed_secs > 0.0 {
        Some(count as f64 / elapsed_secs)
    } else {
        None
    }
}

// =============================================================================
// Args
// =============================================================================

/// Options for a single archive parse.
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Drop malformed records and keep going instead of failing the archive
    pub skip_on_error: bool,
    /// Receives progress updates when set
    pub progress: Option<ParseProgressCallback>,
}

impl ParseOptions {
    pub fn new(skip_on_error: bool) -> Self {
        Self {
            skip_on_error,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ParseProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn notify(&self, progress: ParseProgress) {
        if let Some(cb) = &self.progress {
            cb(progress);
        }
    }
}

/// Inclusive, 1-based record range for the screen dump.
///
/// `None` on either side leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpRange {
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl DumpRange {
    pub fn new(from: Option<u64>, to: Option<u64>) -> Self {
        Self { from, to }
    }

    pub fn validate(&self) -> Result<()> {
        if self.from == Some(0) || self.to == Some(0) {
            return Err(ConvertError::Usage(
                "record numbers start at 1".to_string(),
            ));
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ConvertError::Usage(format!(
                    "record-from ({}) must not be greater than record-to ({})",
                    from, to
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, index: u64) -> bool {
        self.from.map(|f| index >= f).unwrap_or(true) && self.to.map(|t| index <= t).unwrap_or(true)
    }

    /// True once `index` lies beyond the upper bound.
    pub fn is_past(&self, index: u64) -> bool {
        self.to.map(|t| index > t).unwrap_or(false)
    }
}

// =============================================================================
// Output
// =============================================================================

/// Result of parsing one archive.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub table: PrefixTable,
    /// Records decoded successfully
    pub records: u64,
    /// Malformed records dropped because of `skip_on_error`
    pub skipped: u64,
}

// =============================================================================
// Parser contract
// =============================================================================

/// Decodes routing table archives.
pub trait ArchiveParser {
    /// Decode the archive at `path` into a prefix table.
    ///
    /// Fails on the first malformed record unless `options.skip_on_error`
    /// is set, in which case malformed records are counted and dropped.
    fn parse(&self, path: &Path, options: &ParseOptions) -> Result<ParseOutcome>;

    /// Write a human-readable rendering of the records in `range` to `sink`.
    ///
    /// Returns the number of records written.
    fn dump_screen(&self, path: &Path, range: &DumpRange, sink: &mut dyn Write) -> Result<u64>;
}

/// Collect the origin of every prefix announced in one record.
///
/// A TABLE_DUMP_V2 RIB record yields one element per peer; the first element
/// that carries an origin decides the prefix. Prefixes already present in
/// the table from earlier records are replaced.
fn absorb_elems(table: &mut PrefixTable, elems: Vec<BgpElem>) {
    let mut record_origins: Vec<(IpNet, Origin)> = Vec::new();
    for elem in elems {
        let prefix = elem.prefix.prefix;
        if record_origins.iter().any(|(p, _)| *p == prefix) {
            continue;
        }
        let origin = elem
            .origin_asns
            .as_ref()
            .and_then(|asns| Origin::from_asns(asns.iter().map(|asn| u32::from(*asn))));
        if let Some(origin) = origin {
            record_origins.push((prefix, origin));
        }
    }
    for (prefix, origin) in record_origins {
        table.insert(prefix, origin);
    }
}

/// [`ArchiveParser`] backed by `bgpkit-parser`.
///
/// Accepts plain files and `.gz`/`.bz2` compressed archives. Records are
/// framed by their header length before decoding, so a malformed record is
/// skipped as a whole and the records after it still decode.
#[derive(Debug, Clone, Copy)]
pub struct MrtArchiveParser {
    progress_interval: u64,
}

impl MrtArchiveParser {
    pub fn new() -> Self {
        Self {
            progress_interval: PARSE_PROGRESS_INTERVAL,
        }
    }

    /// Emit an update every `interval` records (minimum 1).
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    fn open(path: &Path) -> Result<RecordReader<BufReader<Box<dyn Read + Send>>>> {
        let path_str = path
            .to_str()
            .ok_or_else(|| ConvertError::parse(path, "path is not valid UTF-8"))?;
        let input =
            oneio::get_reader(path_str).map_err(|e| ConvertError::parse(path, e.to_string()))?;
        Ok(RecordReader::new(BufReader::new(input)))
    }
}

impl Default for MrtArchiveParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveParser for MrtArchiveParser {
    fn parse(&self, path: &Path, options: &ParseOptions) -> Result<ParseOutcome> {
        let mut reader = Self::open(path)?;
        let mut elementor = Elementor::new();
        let mut outcome = ParseOutcome::default();

        options.notify(ParseProgress::Started {
            file_path: path.display().to_string(),
        });
        info!("start parsing {}", path.display());
        let start_time = Instant::now();

        loop {
            let index = outcome.records + outcome.skipped + 1;
            let frame = reader
                .next_frame()
                .map_err(|e| ConvertError::parse(path, format!("record {}: {}", index, e)))?;
            match frame {
                Frame::End => break,
                Frame::Record(record) => {
                    outcome.records += 1;
                    absorb_elems(&mut outcome.table, elementor.record_to_elems(*record));
                }
                Frame::Malformed(reason) if options.skip_on_error => {
                    warn!(
                        "skipping malformed record {} in {}: {}",
                        index,
                        path.display(),
                        reason
                    );
                    outcome.skipped += 1;
                }
                Frame::Malformed(reason) => {
                    return Err(ConvertError::parse(
                        path,
                        format!("record {}: {}", index, reason),
                    ));
                }
            }

            let processed = outcome.records + outcome.skipped;
            if processed % self.progress_interval == 0 {
                let elapsed = start_time.elapsed().as_secs_f64();
                options.notify(ParseProgress::Update {
                    records_processed: processed,
                    prefixes: outcome.table.len(),
                    skipped: outcome.skipped,
                    elapsed_secs: elapsed,
                    rate: rate_of(processed, elapsed),
                });
            }
        }

        let duration_secs = start_time.elapsed().as_secs_f64();
        options.notify(ParseProgress::Completed {
            total_records: outcome.records + outcome.skipped,
            prefixes: outcome.table.len(),
            skipped: outcome.skipped,
            duration_secs,
            rate: rate_of(outcome.records + outcome.skipped, duration_secs),
        });
        info!(
            "finished parsing {}: {} records, {} prefixes, {} skipped",
            path.display(),
            outcome.records,
            outcome.table.len(),
            outcome.skipped
        );

        Ok(outcome)
    }

    fn dump_screen(&self, path: &Path, range: &DumpRange, sink: &mut dyn Write) -> Result<u64> {
        range.validate()?;
        let mut reader = Self::open(path)?;
        let mut elementor = Elementor::new();
        let sink_err = |e: std::io::Error| ConvertError::io(Path::new("<output>"), e);

        let mut index: u64 = 0;
        let mut written: u64 = 0;
        loop {
            if range.is_past(index + 1) {
                break;
            }
            index += 1;
            let frame = reader
                .next_frame()
                .map_err(|e| ConvertError::parse(path, format!("record {}: {}", index, e)))?;
            match frame {
                Frame::End => break,
                Frame::Record(record) => {
                    let header = &record.common_header;
                    let timestamp = header.timestamp;
                    let kind = format!("{:?}/{}", header.entry_type, header.entry_subtype);
                    // peer index tables must reach the elementor even outside the range
                    let elems = elementor.record_to_elems(*record);
                    if !range.contains(index) {
                        continue;
                    }
                    let time = DateTime::from_timestamp(timestamp as i64, 0)
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| timestamp.to_string());
                    writeln!(sink, "#{} {} {}", index, time, kind).map_err(sink_err)?;
                    for elem in &elems {
                        writeln!(sink, "  {}", elem).map_err(sink_err)?;
                    }
                    written += 1;
                }
                Frame::Malformed(reason) => {
                    if range.contains(index) {
                        writeln!(sink, "#{} ERROR: {}", index, reason).map_err(sink_err)?;
                        written += 1;
                    }
                }
            }
        }
        sink.flush().map_err(sink_err)?;
        debug!("dumped {} records from {}", written, path.display());
        Ok(written)
    }
}
