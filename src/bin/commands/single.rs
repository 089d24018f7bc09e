use std::sync::Arc;
use std::time::Duration;

use ipasn_convert::lens::convert::{ConvertLens, SingleConvertArgs};
use ipasn_convert::lens::parse::{ArchiveParser, ParseProgress, ParseProgressCallback};

pub fn run<P: ArchiveParser>(lens: &ConvertLens<P>, args: SingleConvertArgs) {
    let show_progress = args.show_progress;

    let pb = if show_progress {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_message(format!("Parsing {}", args.input.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let callback: Option<ParseProgressCallback> = pb.clone().map(|pb| {
        let cb: ParseProgressCallback = Arc::new(move |progress: ParseProgress| match progress {
            ParseProgress::Started { file_path } => {
                pb.set_message(format!("Parsing {}", file_path));
            }
            ParseProgress::Update {
                records_processed,
                prefixes,
                skipped,
                ..
            } => {
                pb.set_message(format!(
                    "Processed {} records, {} prefixes, {} skipped",
                    records_processed, prefixes, skipped
                ));
            }
            ParseProgress::Completed {
                total_records,
                duration_secs,
                ..
            } => {
                pb.set_message(format!(
                    "Parsed {} records in {:.1}s, writing database",
                    total_records, duration_secs
                ));
            }
        });
        cb
    });

    let result = lens.single(&args, callback);
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    match result {
        Ok(report) => {
            if show_progress {
                println!(
                    "IPASN database saved ({} IPV4 + {} IPV6 prefixes)",
                    report.counts.ipv4, report.counts.ipv6
                );
                if report.skipped > 0 {
                    println!("{} malformed records skipped", report.skipped);
                }
            }
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}
