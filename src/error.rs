//! Error types for archive conversion.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Message used for every unparsable bulk date.
pub const MALFORMED_DATE_MSG: &str = "malformed date, try YYYY-MM-DD";

#[derive(Debug, Error)]
pub enum ConvertError {
    /// No run mode, conflicting modes, or option values that make no sense together.
    #[error("usage error: {0}")]
    Usage(String),

    /// Bulk date strings failed to parse, or the range is reversed.
    #[error("{0}")]
    DateRange(String),

    /// The archive could not be decoded.
    #[error("unable to parse archive {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The output database could not be created or written.
    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Compression failed after the uncompressed output was written.
    #[error("unable to compress {} (uncompressed output kept): {reason}", path.display())]
    Compression { path: PathBuf, reason: String },

    /// Listing or reading a directory/file outside of the write path failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ConvertError {
    pub fn parse(path: &Path, reason: impl Into<String>) -> Self {
        ConvertError::Parse {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn write(path: &Path, source: std::io::Error) -> Self {
        ConvertError::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn compression(path: &Path, reason: impl Into<String>) -> Self {
        ConvertError::Compression {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn malformed_date() -> Self {
        ConvertError::DateRange(MALFORMED_DATE_MSG.to_string())
    }

    /// Short, stable name of the error kind, used in summaries and events.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Usage(_) => "usage",
            ConvertError::DateRange(_) => "date-range",
            ConvertError::Parse { .. } => "parse",
            ConvertError::Write { .. } => "write",
            ConvertError::Compression { .. } => "compression",
            ConvertError::Io { .. } => "io",
            ConvertError::Config(_) => "config",
        }
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
