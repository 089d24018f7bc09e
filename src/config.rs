use crate::compress::CompressorKind;
use crate::datasets::ipasn::MultiOriginFormat;
use crate::error::ConvertError;
use crate::lens::convert::BulkErrorPolicy;
use crate::lens::parse::PARSE_PROGRESS_INTERVAL;
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize)]
pub struct ConverterConfig {
    /// Directory searched for `rib.YYYYMMDD.HHMM.bz2` archives in bulk mode
    pub archive_dir: String,

    /// Directory receiving `ipasn_YYYYMMDD.dat` files in bulk mode
    pub output_dir: String,

    /// Compression implementation used by `--compress`
    pub compressor: CompressorKind,

    /// Program run by the external compressor
    pub compress_program: String,

    /// Handling of failed days in bulk mode
    pub bulk_on_error: BulkErrorPolicy,

    /// Output of multi-origin prefixes
    pub multi_origin: MultiOriginFormat,

    /// Add a `Converted on` line to database headers
    pub write_timestamp: bool,

    /// Records between progress updates
    pub progress_interval: u64,
}

const EMPTY_CONFIG: &str = r#"### ipasn-convert configuration file

### where bulk mode looks for rib.YYYYMMDD.HHMM.bz2 archives
# archive_dir = "."

### where bulk mode writes ipasn_YYYYMMDD.dat files
# output_dir = "."

### compression used by --compress: "builtin" or "external"
# compressor = "builtin"
# compress_program = "gzip"

### bulk mode failure handling: "skip" or "abort"
# bulk_on_error = "skip"

### multi-origin prefixes: "set" writes {a,b}, "first" writes the lowest ASN
# multi_origin = "set"

### add a conversion timestamp to database headers
# write_timestamp = false

### records between progress updates
# progress_interval = 10000
"#;

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            archive_dir: ".".to_string(),
            output_dir: ".".to_string(),
            compressor: CompressorKind::default(),
            compress_program: "gzip".to_string(),
            bulk_on_error: BulkErrorPolicy::default(),
            multi_origin: MultiOriginFormat::default(),
            write_timestamp: false,
            progress_interval: PARSE_PROGRESS_INTERVAL,
        }
    }
}

fn parse_key<T: FromStr<Err = String>>(
    config: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T> {
    match config.get(key) {
        Some(value) => T::from_str(value)
            .map_err(|e| anyhow!(ConvertError::Config(format!("{}: {}", key, e)))),
        None => Ok(default),
    }
}

impl ConverterConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<ConverterConfig> {
        let mut builder = Config::builder();

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                // By default use $HOME/.ipasn/ipasn.toml when it exists
                if let Some(home_dir) = dirs::home_dir() {
                    let p = home_dir.join(".ipasn").join("ipasn.toml");
                    if p.exists() {
                        let path_str = p
                            .to_str()
                            .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                        builder = builder.add_source(config::File::with_name(path_str));
                    }
                }
            }
        }

        // Add in settings from the environment (with a prefix of IPASN)
        // E.g., `IPASN_ARCHIVE_DIR=/data/ribs ./ipasn-convert` would set the archive directory
        builder = builder.add_source(config::Environment::with_prefix("IPASN"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<ConverterConfig> {
        let defaults = ConverterConfig::default();

        let write_timestamp = match config.get("write_timestamp") {
            Some(v) => v.parse::<bool>().map_err(|_| {
                anyhow!(ConvertError::Config(format!(
                    "write_timestamp: expected true or false, got '{}'",
                    v
                )))
            })?,
            None => defaults.write_timestamp,
        };

        // Parse progress interval (default: 10,000 records)
        let progress_interval = match config.get("progress_interval") {
            Some(v) => v.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                anyhow!(ConvertError::Config(format!(
                    "progress_interval: expected a positive number of records, got '{}'",
                    v
                )))
            })?,
            None => defaults.progress_interval,
        };

        Ok(ConverterConfig {
            archive_dir: config
                .get("archive_dir")
                .cloned()
                .unwrap_or(defaults.archive_dir),
            output_dir: config
                .get("output_dir")
                .cloned()
                .unwrap_or(defaults.output_dir),
            compressor: parse_key(config, "compressor", defaults.compressor)?,
            compress_program: config
                .get("compress_program")
                .cloned()
                .unwrap_or(defaults.compress_program),
            bulk_on_error: parse_key(config, "bulk_on_error", defaults.bulk_on_error)?,
            multi_origin: parse_key(config, "multi_origin", defaults.multi_origin)?,
            write_timestamp,
            progress_interval,
        })
    }

    /// Function to display the configuration
    pub fn display(&self) {
        println!("Archive directory:  {}", self.archive_dir);
        println!("Output directory:   {}", self.output_dir);
        println!(
            "Compressor:         {:?} ({})",
            self.compressor, self.compress_program
        );
        println!("Bulk on error:      {:?}", self.bulk_on_error);
        println!("Multi-origin:       {:?}", self.multi_origin);
        println!("Write timestamp:    {}", self.write_timestamp);
        println!("Progress interval:  {}", self.progress_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ConverterConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(config.archive_dir, ".");
        assert_eq!(config.compressor, CompressorKind::Builtin);
        assert_eq!(config.bulk_on_error, BulkErrorPolicy::Skip);
        assert_eq!(config.multi_origin, MultiOriginFormat::Set);
        assert!(!config.write_timestamp);
        assert_eq!(config.progress_interval, PARSE_PROGRESS_INTERVAL);
    }

    #[test]
    fn test_overrides() {
        let config = ConverterConfig::from_map(&map(&[
            ("archive_dir", "/data/ribs"),
            ("compressor", "external"),
            ("compress_program", "pigz"),
            ("bulk_on_error", "abort"),
            ("multi_origin", "first"),
            ("write_timestamp", "true"),
            ("progress_interval", "500"),
        ]))
        .unwrap();
        assert_eq!(config.archive_dir, "/data/ribs");
        assert_eq!(config.compressor, CompressorKind::External);
        assert_eq!(config.compress_program, "pigz");
        assert_eq!(config.bulk_on_error, BulkErrorPolicy::Abort);
        assert_eq!(config.multi_origin, MultiOriginFormat::First);
        assert!(config.write_timestamp);
        assert_eq!(config.progress_interval, 500);
    }

    #[test]
    fn test_invalid_value() {
        let err = ConverterConfig::from_map(&map(&[("bulk_on_error", "retry")])).unwrap_err();
        assert!(err.to_string().contains("bulk_on_error"));
    }

    #[test]
    fn test_invalid_progress_interval() {
        for value in ["abc", "0", "-5"] {
            let err = ConverterConfig::from_map(&map(&[("progress_interval", value)])).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ConvertError>(),
                Some(ConvertError::Config(_))
            ));
            assert!(err.to_string().contains("progress_interval"), "{}", value);
        }
    }

    #[test]
    fn test_invalid_progress_interval_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipasn.toml");
        std::fs::write(&path, "progress_interval = \"abc\"\n").unwrap();
        let err = ConverterConfig::new(&Some(path.to_string_lossy().to_string())).unwrap_err();
        assert!(err.to_string().contains("progress_interval"));
    }

    #[test]
    fn test_missing_explicit_file_gets_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipasn.toml");
        let config =
            ConverterConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.output_dir, ".");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("### ipasn-convert configuration file"));
    }

    #[test]
    fn test_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipasn.toml");
        std::fs::write(
            &path,
            "output_dir = \"/tmp/out\"\nwrite_timestamp = true\nprogress_interval = 42\n",
        )
        .unwrap();
        let config =
            ConverterConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.output_dir, "/tmp/out");
        assert!(config.write_timestamp);
        assert_eq!(config.progress_interval, 42);
    }
}
