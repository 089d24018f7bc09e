//! Lens module
//!
//! This module provides the high-level "lens" abstractions of the converter.
//! Lenses combine the conversion logic with the progress and report types the
//! command-line interface renders, so they can be reused from other
//! front-ends.
//!
//! # Architecture
//!
//! Each lens module exports:
//! - A **Lens struct** or trait (`ConvertLens`, `ArchiveParser`) - the entry point
//! - **Args structs** - input arguments for lens methods
//! - **Output types** - reports and progress events
//!
//! ```rust,ignore
//! use ipasn_convert::lens::convert::{ConvertLens, ConvertMode};
//! use ipasn_convert::lens::parse::{MrtArchiveParser, ParseProgress};
//! ```

// ParseLens - MRT archive decoding with bgpkit-parser
pub mod parse;

// ConvertLens - single/bulk/dump run modes
pub mod convert;
