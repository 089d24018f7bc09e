//! Post-processing compression of finished output files.
//!
//! Compression always runs after a database has been fully written. A
//! compressor replaces `path` with `path.gz` and returns the new path; on
//! failure the original, uncompressed file is left where it was.

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::debug;

/// Suffix appended to compressed outputs.
pub const GZIP_SUFFIX: &str = "gz";

pub trait Compressor {
    /// Compress the file at `path`, remove the original and return the path
    /// of the compressed file.
    fn compress(&self, path: &Path) -> Result<PathBuf>;
}

/// Which [`Compressor`] implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressorKind {
    /// In-process gzip
    #[default]
    Builtin,
    /// Spawn an external program (gzip by default)
    External,
}

impl FromStr for CompressorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "builtin" | "internal" => Ok(CompressorKind::Builtin),
            "external" | "gzip" => Ok(CompressorKind::External),
            _ => Err(format!(
                "unknown compressor '{}', expected 'builtin' or 'external'",
                s
            )),
        }
    }
}

fn compressed_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(GZIP_SUFFIX);
    path.with_file_name(name)
}

/// Gzip compression through `oneio`'s suffix-driven writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCompressor;

impl GzipCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, path: &Path) -> Result<PathBuf> {
        let target = compressed_path(path);
        let target_str = target
            .to_str()
            .ok_or_else(|| ConvertError::compression(path, "path is not valid UTF-8"))?;

        let copy_result = (|| -> std::result::Result<(), String> {
            let input = File::open(path).map_err(|e| e.to_string())?;
            let mut reader = BufReader::new(input);
            let mut writer = oneio::get_writer(target_str).map_err(|e| e.to_string())?;
            std::io::copy(&mut reader, &mut writer).map_err(|e| e.to_string())?;
            writer.flush().map_err(|e| e.to_string())?;
            Ok(())
        })();

        if let Err(reason) = copy_result {
            let _ = std::fs::remove_file(&target);
            return Err(ConvertError::compression(path, reason));
        }

        std::fs::remove_file(path).map_err(|e| ConvertError::compression(path, e.to_string()))?;
        debug!("compressed {} into {}", path.display(), target.display());
        Ok(target)
    }
}

/// Compression by an external program invoked as `<program> <path>`.
///
/// The program is expected to behave like `gzip`: write `<path>.gz` and
/// remove the input.
#[derive(Debug, Clone)]
pub struct ExternalCompressor {
    program: String,
}

impl ExternalCompressor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn gzip() -> Self {
        Self::new("gzip")
    }
}

impl Default for ExternalCompressor {
    fn default() -> Self {
        Self::gzip()
    }
}

impl Compressor for ExternalCompressor {
    fn compress(&self, path: &Path) -> Result<PathBuf> {
        let status = Command::new(&self.program)
            .arg(path)
            .status()
            .map_err(|e| {
                ConvertError::compression(path, format!("failed to run {}: {}", self.program, e))
            })?;
        if !status.success() {
            return Err(ConvertError::compression(
                path,
                format!("{} exited with {}", self.program, status),
            ));
        }

        let target = compressed_path(path);
        if !target.exists() {
            return Err(ConvertError::compression(
                path,
                format!("{} did not produce {}", self.program, target.display()),
            ));
        }
        Ok(target)
    }
}

/// Build the compressor selected by `kind`.
pub fn build_compressor(kind: CompressorKind, program: &str) -> Box<dyn Compressor> {
    match kind {
        CompressorKind::Builtin => Box::new(GzipCompressor::new()),
        CompressorKind::External => Box::new(ExternalCompressor::new(program)),
    }
}
