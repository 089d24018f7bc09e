//! Convert lens module
//!
//! This module provides the `ConvertLens`, the driver behind every run mode of
//! the converter:
//! - single archive to IPASN database conversion
//! - screen dump of decoded records
//! - bulk conversion over a date range of daily archives
//! - version query
//!
//! # Example
//!
//! ```rust,ignore
//! use ipasn_convert::lens::convert::{ConvertLens, SingleConvertArgs};
//!
//! let lens = ConvertLens::new();
//! let args = SingleConvertArgs::new("rib.20200101.0600.bz2", "ipasn_20200101.dat").compress(true);
//! let report = lens.single(&args, None)?;
//! println!("{} IPv4 + {} IPv6", report.counts.ipv4, report.counts.ipv6);
//! ```

pub mod locator;

pub use locator::ArchiveLocator;

use crate::compress::{Compressor, GzipCompressor};
use crate::datasets::ipasn::{IpasnWriter, PrefixCounts};
use crate::error::{ConvertError, Result};
use crate::lens::parse::{
    ArchiveParser, DumpRange, MrtArchiveParser, ParseOptions, ParseProgressCallback,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

const BULK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Version banner printed by the version query.
pub fn version() -> String {
    format!("MRT/RIB converter version {}.", env!("CARGO_PKG_VERSION"))
}

/// Output file name for the database of `date`.
pub fn bulk_output_name(date: NaiveDate) -> String {
    format!("ipasn_{}.dat", date.format("%Y%m%d"))
}

// =============================================================================
// Args
// =============================================================================

/// Arguments for converting one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Attach the progress callback while parsing
    pub show_progress: bool,
    /// Drop malformed records instead of failing
    pub skip_on_error: bool,
    /// Gzip the database once written
    pub compress: bool,
}

impl SingleConvertArgs {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            show_progress: true,
            skip_on_error: false,
            compress: false,
        }
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn skip_on_error(mut self, enabled: bool) -> Self {
        self.skip_on_error = enabled;
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

/// Arguments for the screen dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpScreenArgs {
    pub input: PathBuf,
    pub range: DumpRange,
}

impl DumpScreenArgs {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            range: DumpRange::default(),
        }
    }

    pub fn range(mut self, from: Option<u64>, to: Option<u64>) -> Self {
        self.range = DumpRange::new(from, to);
        self
    }
}

/// What to do when one day of a bulk run fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkErrorPolicy {
    /// Record the failure and continue with the next day. Output write
    /// failures still stop the run.
    #[default]
    Skip,
    /// Stop the run and return the error
    Abort,
}

impl FromStr for BulkErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(BulkErrorPolicy::Skip),
            "abort" => Ok(BulkErrorPolicy::Abort),
            _ => Err(format!(
                "unknown bulk error policy '{}', expected 'skip' or 'abort'",
                s
            )),
        }
    }
}

/// Arguments for a bulk run over `start..=end`.
///
/// Dates are kept as strings and validated by [`ConvertLens::bulk`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConvertArgs {
    pub start: String,
    pub end: String,
    pub archive_dir: PathBuf,
    pub output_dir: PathBuf,
    pub compress: bool,
    pub on_error: BulkErrorPolicy,
}

impl BulkConvertArgs {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            archive_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            compress: false,
            on_error: BulkErrorPolicy::default(),
        }
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    pub fn on_error(mut self, policy: BulkErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Parse and order-check both dates.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        let start = parse_bulk_date(&self.start)?;
        let end = parse_bulk_date(&self.end)?;
        if start > end {
            return Err(ConvertError::DateRange(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok((start, end))
    }
}

fn parse_bulk_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), BULK_DATE_FORMAT).map_err(|_| ConvertError::malformed_date())
}

/// The run mode selected for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConvertMode {
    Single(SingleConvertArgs),
    DumpScreen(DumpScreenArgs),
    Bulk(BulkConvertArgs),
    Version,
}

// =============================================================================
// Output
// =============================================================================

/// Outcome of converting one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    /// Final database path, with `.gz` when compressed
    pub output: PathBuf,
    pub counts: PrefixCounts,
    pub records: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DayStatus {
    Converted(ConversionReport),
    Missing,
    Failed { kind: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub status: DayStatus,
}

/// Per-day results of a bulk run, in date order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<DayReport>,
}

impl BulkReport {
    pub fn converted(&self) -> usize {
        self.count(|s| matches!(s, DayStatus::Converted(_)))
    }

    pub fn missing(&self) -> usize {
        self.count(|s| matches!(s, DayStatus::Missing))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, DayStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&DayStatus) -> bool) -> usize {
        self.days.iter().filter(|d| pred(&d.status)).count()
    }
}

/// Events emitted during a bulk run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BulkProgress {
    Started {
        start: NaiveDate,
        end: NaiveDate,
    },
    /// More than one archive matched; `chosen` is converted
    MultipleCandidates {
        date: NaiveDate,
        candidates: Vec<PathBuf>,
        chosen: PathBuf,
    },
    DayStarted {
        date: NaiveDate,
        archive: PathBuf,
    },
    DayMissing {
        date: NaiveDate,
    },
    DayFailed {
        date: NaiveDate,
        kind: String,
        reason: String,
    },
    DayCompleted {
        date: NaiveDate,
        output: PathBuf,
        counts: PrefixCounts,
    },
    Finished {
        converted: usize,
        missing: usize,
        failed: usize,
    },
}

pub type BulkProgressCallback = Arc<dyn Fn(BulkProgress) + Send + Sync>;

// =============================================================================
// Lens
// =============================================================================

/// Conversion driver.
///
/// Generic over the [`ArchiveParser`] so the orchestration can be exercised
/// without real MRT archives.
pub struct ConvertLens<P = MrtArchiveParser> {
    parser: P,
    compressor: Box<dyn Compressor>,
    writer: IpasnWriter,
}

impl ConvertLens {
    pub fn new() -> Self {
        Self {
            parser: MrtArchiveParser::new(),
            compressor: Box::new(GzipCompressor::new()),
            writer: IpasnWriter::new(),
        }
    }
}

impl Default for ConvertLens {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ArchiveParser> ConvertLens<P> {
    pub fn with_parser<Q: ArchiveParser>(self, parser: Q) -> ConvertLens<Q> {
        ConvertLens {
            parser,
            compressor: self.compressor,
            writer: self.writer,
        }
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_writer(mut self, writer: IpasnWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Convert one archive into an IPASN database.
    ///
    /// `progress` only receives updates when `args.show_progress` is set.
    pub fn single(
        &self,
        args: &SingleConvertArgs,
        progress: Option<ParseProgressCallback>,
    ) -> Result<ConversionReport> {
        let mut options = ParseOptions::new(args.skip_on_error);
        if args.show_progress {
            options.progress = progress;
        }
        let provenance = args.input.display().to_string();
        self.convert_file(&args.input, &args.output, &provenance, &options, args.compress)
    }

    /// Render the records of `args.range` to `sink`.
    pub fn dump_screen(&self, args: &DumpScreenArgs, sink: &mut dyn Write) -> Result<u64> {
        self.parser.dump_screen(&args.input, &args.range, sink)
    }

    /// Convert one archive per day over the date range in `args`.
    ///
    /// Date errors are returned before the archive directory is touched.
    /// Days without an archive are reported as missing. Failed days are
    /// handled according to `args.on_error`.
    pub fn bulk(
        &self,
        args: &BulkConvertArgs,
        progress: Option<BulkProgressCallback>,
    ) -> Result<BulkReport> {
        let (start, end) = args.date_range()?;
        let notify = |event: BulkProgress| {
            if let Some(cb) = &progress {
                cb(event);
            }
        };

        let locator = ArchiveLocator::new(&args.archive_dir);
        let mut report = BulkReport {
            start,
            end,
            days: Vec::new(),
        };
        notify(BulkProgress::Started { start, end });
        info!(
            "starting bulk conversion from {} to {} in {}",
            start,
            end,
            locator.dir().display()
        );

        for date in start.iter_days().take_while(|d| *d <= end) {
            let candidates = locator.locate(date)?;
            let Some(archive) = candidates.first().cloned() else {
                info!("no archive for {}", date);
                notify(BulkProgress::DayMissing { date });
                report.days.push(DayReport {
                    date,
                    status: DayStatus::Missing,
                });
                continue;
            };
            if candidates.len() > 1 {
                warn!(
                    "multiple archives for {}, only converting {}",
                    date,
                    archive.display()
                );
                notify(BulkProgress::MultipleCandidates {
                    date,
                    candidates: candidates.clone(),
                    chosen: archive.clone(),
                });
            }

            notify(BulkProgress::DayStarted {
                date,
                archive: archive.clone(),
            });
            let output = args.output_dir.join(bulk_output_name(date));
            let provenance = archive
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| archive.display().to_string());

            match self.convert_file(
                &archive,
                &output,
                &provenance,
                &ParseOptions::default(),
                args.compress,
            ) {
                Ok(converted) => {
                    notify(BulkProgress::DayCompleted {
                        date,
                        output: converted.output.clone(),
                        counts: converted.counts,
                    });
                    report.days.push(DayReport {
                        date,
                        status: DayStatus::Converted(converted),
                    });
                }
                Err(e) => {
                    warn!("conversion for {} failed: {}", date, e);
                    notify(BulkProgress::DayFailed {
                        date,
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    });
                    // an unwritable output directory fails every remaining day too
                    if args.on_error == BulkErrorPolicy::Abort
                        || matches!(e, ConvertError::Write { .. })
                    {
                        return Err(e);
                    }
                    report.days.push(DayReport {
                        date,
                        status: DayStatus::Failed {
                            kind: e.kind().to_string(),
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        notify(BulkProgress::Finished {
            converted: report.converted(),
            missing: report.missing(),
            failed: report.failed(),
        });
        Ok(report)
    }

    fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        provenance: &str,
        options: &ParseOptions,
        compress: bool,
    ) -> Result<ConversionReport> {
        let outcome = self.parser.parse(input, options)?;
        self.writer.write_file(&outcome.table, output, provenance)?;
        let counts = outcome.table.counts();
        info!(
            "saved {} ({} IPv4 + {} IPv6 prefixes)",
            output.display(),
            counts.ipv4,
            counts.ipv6
        );

        let output = if compress {
            self.compressor.compress(output)?
        } else {
            output.to_path_buf()
        };

        Ok(ConversionReport {
            input: input.to_path_buf(),
            output,
            counts,
            records: outcome.records,
            skipped: outcome.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::ipasn::{read_ipasn_file, Origin, PrefixTable};
    use crate::lens::parse::tests::{
        encode_rib, malformed_record, splice_record, unknown_type_record,
    };
    use crate::lens::parse::ParseOutcome;
    use ipnet::IpNet;
    use std::sync::Mutex;

    /// Reads `prefix asn` lines; a line reading `BAD` is a malformed record.
    struct LineParser;

    impl ArchiveParser for LineParser {
        fn parse(&self, path: &Path, options: &ParseOptions) -> Result<ParseOutcome> {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ConvertError::parse(path, e.to_string()))?;
            let mut outcome = ParseOutcome::default();
            for line in content.lines() {
                if line == "BAD" {
                    if !options.skip_on_error {
                        return Err(ConvertError::parse(path, "bad record"));
                    }
                    outcome.skipped += 1;
                    continue;
                }
                let (prefix, asn) = line.split_once(' ').unwrap();
                let prefix: IpNet = prefix.parse().unwrap();
                outcome
                    .table
                    .insert(prefix, Origin::Single(asn.parse().unwrap()));
                outcome.records += 1;
            }
            Ok(outcome)
        }

        fn dump_screen(
            &self,
            path: &Path,
            range: &DumpRange,
            sink: &mut dyn Write,
        ) -> Result<u64> {
            range.validate()?;
            let content = std::fs::read_to_string(path).unwrap();
            let mut written = 0;
            for (i, line) in content.lines().enumerate() {
                if range.contains(i as u64 + 1) {
                    writeln!(sink, "{}", line).unwrap();
                    written += 1;
                }
            }
            Ok(written)
        }
    }

    struct FailingCompressor;

    impl Compressor for FailingCompressor {
        fn compress(&self, path: &Path) -> Result<PathBuf> {
            Err(ConvertError::compression(path, "compressor unavailable"))
        }
    }

    fn line_lens() -> ConvertLens<LineParser> {
        ConvertLens::new().with_parser(LineParser)
    }

    fn write_day(dir: &Path, day: &str, body: &str) {
        std::fs::write(dir.join(format!("rib.{}.0000.bz2", day)), body).unwrap();
    }

    #[test]
    fn test_version() {
        assert!(version().starts_with("MRT/RIB converter version "));
        assert!(version().ends_with(&format!("{}.", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn test_bulk_rejects_reversed_range() {
        let dir = tempfile::tempdir().unwrap();
        let args = BulkConvertArgs::new("2020-01-10", "2020-01-05")
            .archive_dir(dir.path().join("absent"))
            .output_dir(dir.path());
        let err = line_lens().bulk(&args, None).unwrap_err();
        assert!(matches!(err, ConvertError::DateRange(_)));
    }

    #[test]
    fn test_bulk_rejects_malformed_date() {
        let dir = tempfile::tempdir().unwrap();
        let args = BulkConvertArgs::new("not-a-date", "2020-01-05")
            .archive_dir(dir.path().join("absent"))
            .output_dir(dir.path());
        let err = line_lens().bulk(&args, None).unwrap_err();
        assert!(matches!(err, ConvertError::DateRange(_)));
        assert_eq!(err.to_string(), "malformed date, try YYYY-MM-DD");
    }

    #[test]
    fn test_bulk_skips_missing_day() {
        let archives = tempfile::tempdir().unwrap();
        let outputs = tempfile::tempdir().unwrap();
        for day in ["20200101", "20200102", "20200104", "20200105"] {
            write_day(archives.path(), day, "1.0.0.0/24 13335\n8.8.8.0/24 15169\n");
        }

        let events: Arc<Mutex<Vec<BulkProgress>>> = Arc::new(Mutex::new(vec![]));
        let sink = events.clone();
        let callback: BulkProgressCallback = Arc::new(move |e| sink.lock().unwrap().push(e));

        let args = BulkConvertArgs::new("2020-01-01", "2020-01-05")
            .archive_dir(archives.path())
            .output_dir(outputs.path());
        let report = line_lens().bulk(&args, Some(callback)).unwrap();

        assert_eq!(report.days.len(), 5);
        assert_eq!(report.converted(), 4);
        assert_eq!(report.missing(), 1);
        assert!(!report.has_failures());
        assert!(matches!(report.days[2].status, DayStatus::Missing));

        let mut produced: Vec<String> = std::fs::read_dir(outputs.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        produced.sort();
        assert_eq!(
            produced,
            vec![
                "ipasn_20200101.dat",
                "ipasn_20200102.dat",
                "ipasn_20200104.dat",
                "ipasn_20200105.dat",
            ]
        );

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(BulkProgress::Started { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            BulkProgress::DayMissing { date } if *date == NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()
        )));
        assert!(matches!(
            events.last(),
            Some(BulkProgress::Finished {
                converted: 4,
                missing: 1,
                failed: 0
            })
        ));
    }

    #[test]
    fn test_bulk_no_archives_at_all() {
        let archives = tempfile::tempdir().unwrap();
        let args = BulkConvertArgs::new("2020-01-01", "2020-01-02")
            .archive_dir(archives.path())
            .output_dir(archives.path());
        let report = line_lens().bulk(&args, None).unwrap();
        assert_eq!(report.missing(), 2);
        assert_eq!(report.converted(), 0);
    }

    #[test]
    fn test_bulk_multiple_candidates_uses_first() {
        let archives = tempfile::tempdir().unwrap();
        std::fs::write(
            archives.path().join("rib.20200101.0000.bz2"),
            "1.0.0.0/24 1\n",
        )
        .unwrap();
        std::fs::write(
            archives.path().join("rib.20200101.1200.bz2"),
            "1.0.0.0/24 2\n",
        )
        .unwrap();

        let events: Arc<Mutex<Vec<BulkProgress>>> = Arc::new(Mutex::new(vec![]));
        let sink = events.clone();
        let args = BulkConvertArgs::new("2020-01-01", "2020-01-01")
            .archive_dir(archives.path())
            .output_dir(archives.path());
        let callback: BulkProgressCallback = Arc::new(move |e| sink.lock().unwrap().push(e));
        let report = line_lens().bulk(&args, Some(callback)).unwrap();
        assert_eq!(report.converted(), 1);

        let table = read_ipasn_file(&archives.path().join("ipasn_20200101.dat")).unwrap();
        let prefix: IpNet = "1.0.0.0/24".parse().unwrap();
        assert_eq!(table.get(&prefix), Some(&Origin::Single(1)));

        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, BulkProgress::MultipleCandidates { candidates, .. } if candidates.len() == 2)));
    }

    #[test]
    fn test_bulk_failed_day_policies() {
        let archives = tempfile::tempdir().unwrap();
        let outputs = tempfile::tempdir().unwrap();
        write_day(archives.path(), "20200101", "1.0.0.0/24 13335\n");
        write_day(archives.path(), "20200102", "BAD\n");
        write_day(archives.path(), "20200103", "1.0.0.0/24 13335\n");

        let args = BulkConvertArgs::new("2020-01-01", "2020-01-03")
            .archive_dir(archives.path())
            .output_dir(outputs.path());
        let report = line_lens().bulk(&args, None).unwrap();
        assert_eq!(report.converted(), 2);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert!(!outputs.path().join("ipasn_20200102.dat").exists());
        assert!(outputs.path().join("ipasn_20200103.dat").exists());

        let aborted = tempfile::tempdir().unwrap();
        let args = args
            .output_dir(aborted.path())
            .on_error(BulkErrorPolicy::Abort);
        let err = line_lens().bulk(&args, None).unwrap_err();
        assert!(matches!(err, ConvertError::Parse { .. }));
        assert!(aborted.path().join("ipasn_20200101.dat").exists());
        assert!(!aborted.path().join("ipasn_20200103.dat").exists());
    }

    #[test]
    fn test_bulk_stops_on_unwritable_output() {
        let archives = tempfile::tempdir().unwrap();
        write_day(archives.path(), "20200101", "1.0.0.0/24 13335\n");
        write_day(archives.path(), "20200102", "1.0.0.0/24 13335\n");

        let failed_days = Arc::new(Mutex::new(Vec::new()));
        let seen = failed_days.clone();
        let callback: BulkProgressCallback = Arc::new(move |event: BulkProgress| {
            if let BulkProgress::DayFailed { date, kind, .. } = event {
                seen.lock().unwrap().push((date, kind));
            }
        });

        let args = BulkConvertArgs::new("2020-01-01", "2020-01-02")
            .archive_dir(archives.path())
            .output_dir(archives.path().join("missing"));
        assert_eq!(args.on_error, BulkErrorPolicy::Skip);
        let err = line_lens().bulk(&args, Some(callback)).unwrap_err();
        assert!(matches!(err, ConvertError::Write { .. }));

        let failed_days = failed_days.lock().unwrap();
        assert_eq!(failed_days.len(), 1);
        assert_eq!(failed_days[0].1, "write");
    }

    #[test]
    fn test_bulk_compresses_outputs() {
        let archives = tempfile::tempdir().unwrap();
        write_day(archives.path(), "20200101", "1.0.0.0/24 13335\n");
        let args = BulkConvertArgs::new("2020-01-01", "2020-01-01")
            .archive_dir(archives.path())
            .output_dir(archives.path())
            .compress(true);
        let report = line_lens().bulk(&args, None).unwrap();
        match &report.days[0].status {
            DayStatus::Converted(r) => {
                assert_eq!(r.output, archives.path().join("ipasn_20200101.dat.gz"))
            }
            other => panic!("unexpected status: {:?}", other),
        }
        assert!(!archives.path().join("ipasn_20200101.dat").exists());
        let table = read_ipasn_file(&archives.path().join("ipasn_20200101.dat.gz")).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_single_counts_sum_to_table() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rib.txt");
        std::fs::write(
            &input,
            "1.0.0.0/24 13335\n8.8.8.0/24 15169\n2001:db8::/32 64500\n1.0.0.0/24 7\n",
        )
        .unwrap();
        let output = dir.path().join("ipasn.dat");

        let report = line_lens()
            .single(&SingleConvertArgs::new(&input, &output), None)
            .unwrap();
        assert_eq!(report.counts.ipv4, 2);
        assert_eq!(report.counts.ipv6, 1);

        let table: PrefixTable = read_ipasn_file(&output).unwrap();
        assert_eq!(report.counts.total(), table.len());
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains(&format!("; Original file : {}", input.display())));
    }

    #[test]
    fn test_single_compression_failure_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rib.txt");
        std::fs::write(&input, "1.0.0.0/24 13335\n").unwrap();
        let output = dir.path().join("ipasn.dat");

        let lens = line_lens().with_compressor(Box::new(FailingCompressor));
        let err = lens
            .single(&SingleConvertArgs::new(&input, &output).compress(true), None)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Compression { .. }));
        assert!(output.exists());
    }

    #[test]
    fn test_single_malformed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = encode_rib(100);
        let lens = ConvertLens::new();
        for (name, bad) in [("subtype", malformed_record()), ("type", unknown_type_record())] {
            let input = dir.path().join(format!("rib.20200101.0000.{}.mrt", name));
            std::fs::write(&input, splice_record(&archive, 51, &bad)).unwrap();
            let output = dir.path().join(format!("ipasn.{}.dat", name));

            let err = lens
                .single(&SingleConvertArgs::new(&input, &output), None)
                .unwrap_err();
            assert!(matches!(err, ConvertError::Parse { .. }), "{}", name);
            assert!(!output.exists());

            let report = lens
                .single(
                    &SingleConvertArgs::new(&input, &output).skip_on_error(true),
                    None,
                )
                .unwrap();
            assert_eq!(report.counts.total(), 100, "{}", name);
            assert_eq!(report.skipped, 1, "{}", name);
            let table = read_ipasn_file(&output).unwrap();
            assert_eq!(table.len(), 100);
            // entries encoded after the bad record are present
            let last: IpNet = "10.0.99.0/24".parse().unwrap();
            assert_eq!(table.get(&last), Some(&Origin::Single(64512 + 99)));
        }
    }

    #[test]
    fn test_dump_screen_delegates_range() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rib.txt");
        std::fs::write(&input, "a\nb\nc\nd\ne\nf\n").unwrap();
        let mut out: Vec<u8> = Vec::new();
        let written = line_lens()
            .dump_screen(&DumpScreenArgs::new(&input).range(Some(5), Some(5)), &mut out)
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "e\n");
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            BulkErrorPolicy::from_str("abort").unwrap(),
            BulkErrorPolicy::Abort
        );
        assert!(BulkErrorPolicy::from_str("retry").is_err());
    }
}
