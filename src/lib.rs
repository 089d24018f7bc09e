#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! ipasn-convert - MRT/RIB archive to IPASN database converter
//!
//! ipasn-convert reads BGP routing table snapshots (MRT `TABLE_DUMP` and
//! `TABLE_DUMP_V2` archives, plain or compressed) and writes a text database
//! mapping every announced prefix to its origin AS. It can be used as both a
//! command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Library: parsing, conversion, database format | `bgpkit-parser`, `oneio` |
//! | `cli` | The `ipasn-convert` binary (default) | `clap`, `indicatif`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`lens`]**: High-level operations
//!   - `parse`: archive decoding into a prefix table, screen dump
//!   - `convert`: single, bulk and dump run modes, archive lookup by date
//! - **[`datasets`]**: The prefix table and the IPASN text format
//! - **[`compress`]**: Post-write compression of databases
//! - **[`config`]**: Configuration management
//! - **[`error`]**: The [`ConvertError`] type
//!
//! # Quick Start Examples
//!
//! ## Single Archive
//!
//! ```rust,ignore
//! use ipasn_convert::lens::convert::{ConvertLens, SingleConvertArgs};
//!
//! let lens = ConvertLens::new();
//! let args = SingleConvertArgs::new("rib.20200101.0600.bz2", "ipasn_20200101.dat");
//! let report = lens.single(&args, None)?;
//! println!("{} IPV4 + {} IPV6 prefixes", report.counts.ipv4, report.counts.ipv6);
//! ```
//!
//! ## Bulk Conversion
//!
//! ```rust,ignore
//! use ipasn_convert::lens::convert::{BulkConvertArgs, BulkErrorPolicy, ConvertLens};
//!
//! let lens = ConvertLens::new();
//! let args = BulkConvertArgs::new("2020-01-01", "2020-01-31")
//!     .archive_dir("/data/ribs")
//!     .output_dir("/data/ipasn")
//!     .compress(true)
//!     .on_error(BulkErrorPolicy::Skip);
//! let report = lens.bulk(&args, None)?;
//! println!("{} converted, {} missing", report.converted(), report.missing());
//! ```
//!
//! ## Reading a Database Back
//!
//! ```rust,ignore
//! use ipasn_convert::datasets::ipasn::read_ipasn_file;
//!
//! let table = read_ipasn_file("ipasn_20200101.dat.gz".as_ref())?;
//! for (prefix, origin) in &table {
//!     println!("{} -> {}", prefix, origin);
//! }
//! ```

pub mod compress;
pub mod config;
pub mod datasets;
pub mod error;
pub mod lens;

// =============================================================================
// Configuration
// =============================================================================

pub use config::ConverterConfig;

// =============================================================================
// Errors
// =============================================================================

pub use error::{ConvertError, Result};

// =============================================================================
// Data model and output format
// =============================================================================

pub use datasets::ipasn::{
    read_ipasn, read_ipasn_file, IpasnWriter, MultiOriginFormat, Origin, PrefixCounts,
    PrefixTable, IPASN_FILE_MAGIC,
};

pub use compress::{
    build_compressor, Compressor, CompressorKind, ExternalCompressor, GzipCompressor,
};

// =============================================================================
// Lenses
// =============================================================================

pub use lens::convert::{
    ArchiveLocator, BulkConvertArgs, BulkErrorPolicy, BulkProgress, BulkReport,
    ConversionReport, ConvertLens, ConvertMode, DayReport, DayStatus, DumpScreenArgs,
    SingleConvertArgs,
};
pub use lens::parse::{
    ArchiveParser, DumpRange, MrtArchiveParser, ParseOptions, ParseOutcome, ParseProgress,
    ParseProgressCallback,
};
