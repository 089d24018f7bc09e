use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use ipasn_convert::compress::build_compressor;
use ipasn_convert::datasets::ipasn::IpasnWriter;
use ipasn_convert::lens::convert::{
    version, BulkConvertArgs, BulkErrorPolicy, ConvertLens, ConvertMode, DumpScreenArgs,
    SingleConvertArgs,
};
use ipasn_convert::lens::parse::MrtArchiveParser;
use ipasn_convert::{ConvertError, ConverterConfig};
use tracing::Level;

mod commands;

#[derive(Parser)]
#[clap(author, about, long_about = None, disable_version_flag = true)]
#[clap(group(
    ArgGroup::new("mode")
        .required(true)
        .multiple(false)
        .args(["single", "dump_screen", "bulk", "version"])
))]
struct Cli {
    /// Convert one MRT/RIB archive into an IPASN database
    #[clap(long, num_args = 2, value_names = ["RIBFILE", "IPASN.DAT"])]
    single: Option<Vec<PathBuf>>,

    /// Print the decoded records of an archive to standard output
    #[clap(long, value_name = "RIBFILE")]
    dump_screen: Option<PathBuf>,

    /// Convert one rib.YYYYMMDD.HHMM.bz2 archive per day, dates as YYYY-MM-DD
    #[clap(long, num_args = 2, value_names = ["START-DATE", "END-DATE"])]
    bulk: Option<Vec<String>>,

    /// Print the converter version
    #[clap(long)]
    version: bool,

    /// Gzip the written database(s)
    #[clap(long)]
    compress: bool,

    /// Do not show parsing progress
    #[clap(long)]
    no_progress: bool,

    /// Skip malformed records instead of failing (single mode)
    #[clap(long)]
    skip_on_error: bool,

    /// First record to dump, starting at 1 (dump mode)
    #[clap(long, value_name = "N")]
    record_from: Option<u64>,

    /// Last record to dump, inclusive (dump mode)
    #[clap(long, value_name = "N")]
    record_to: Option<u64>,

    /// configuration file path, by default $HOME/.ipasn/ipasn.toml is used when present
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Directory holding the daily archives (bulk mode)
    #[clap(long, value_name = "DIR")]
    archive_dir: Option<PathBuf>,

    /// Directory receiving ipasn_YYYYMMDD.dat files (bulk mode)
    #[clap(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// What to do when a day fails: skip or abort (bulk mode)
    #[clap(long, value_name = "POLICY")]
    on_error: Option<BulkErrorPolicy>,
}

impl Cli {
    fn mode_name(&self) -> &'static str {
        if self.single.is_some() {
            "--single"
        } else if self.dump_screen.is_some() {
            "--dump-screen"
        } else if self.bulk.is_some() {
            "--bulk"
        } else {
            "--version"
        }
    }

    /// Options given on the command line that the selected mode ignores.
    fn ignored_options(&self) -> Vec<&'static str> {
        let single = self.single.is_some();
        let dump = self.dump_screen.is_some();
        let bulk = self.bulk.is_some();

        let mut ignored = vec![];
        if self.compress && !(single || bulk) {
            ignored.push("--compress");
        }
        if self.no_progress && !single {
            ignored.push("--no-progress");
        }
        if self.skip_on_error && !single {
            ignored.push("--skip-on-error");
        }
        if self.record_from.is_some() && !dump {
            ignored.push("--record-from");
        }
        if self.record_to.is_some() && !dump {
            ignored.push("--record-to");
        }
        if self.archive_dir.is_some() && !bulk {
            ignored.push("--archive-dir");
        }
        if self.output_dir.is_some() && !bulk {
            ignored.push("--output-dir");
        }
        if self.on_error.is_some() && !bulk {
            ignored.push("--on-error");
        }
        ignored
    }

    fn into_mode(self, config: &ConverterConfig) -> Result<ConvertMode, ConvertError> {
        if let Some(paths) = self.single {
            let [input, output]: [PathBuf; 2] = paths
                .try_into()
                .map_err(|_| ConvertError::Usage("--single takes RIBFILE IPASN.DAT".into()))?;
            return Ok(ConvertMode::Single(
                SingleConvertArgs::new(input, output)
                    .show_progress(!self.no_progress)
                    .skip_on_error(self.skip_on_error)
                    .compress(self.compress),
            ));
        }
        if let Some(input) = self.dump_screen {
            return Ok(ConvertMode::DumpScreen(
                DumpScreenArgs::new(input).range(self.record_from, self.record_to),
            ));
        }
        if let Some(dates) = self.bulk {
            let [start, end]: [String; 2] = dates
                .try_into()
                .map_err(|_| ConvertError::Usage("--bulk takes START-DATE END-DATE".into()))?;
            return Ok(ConvertMode::Bulk(
                BulkConvertArgs::new(start, end)
                    .archive_dir(
                        self.archive_dir
                            .unwrap_or_else(|| PathBuf::from(&config.archive_dir)),
                    )
                    .output_dir(
                        self.output_dir
                            .unwrap_or_else(|| PathBuf::from(&config.output_dir)),
                    )
                    .compress(self.compress)
                    .on_error(self.on_error.unwrap_or(config.bulk_on_error)),
            ));
        }
        if self.version {
            return Ok(ConvertMode::Version);
        }
        Err(ConvertError::Usage(
            "one of --single, --dump-screen, --bulk or --version is required".into(),
        ))
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level TRACE or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match ConverterConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    for option in cli.ignored_options() {
        eprintln!("WARNING: {} has no effect with {}", option, cli.mode_name());
    }

    let mode = match cli.into_mode(&config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    let lens = ConvertLens::new()
        .with_parser(MrtArchiveParser::new().with_progress_interval(config.progress_interval))
        .with_compressor(build_compressor(
            config.compressor,
            &config.compress_program,
        ))
        .with_writer(
            IpasnWriter::new()
                .with_multi_origin(config.multi_origin)
                .with_timestamp(config.write_timestamp),
        );

    match mode {
        ConvertMode::Version => println!("{}", version()),
        ConvertMode::Single(args) => commands::single::run(&lens, args),
        ConvertMode::DumpScreen(args) => commands::dump::run(&lens, args),
        ConvertMode::Bulk(args) => commands::bulk::run(&lens, args),
    }
}
