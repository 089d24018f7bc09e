use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use ipasn_convert::lens::convert::{
    BulkConvertArgs, BulkProgress, BulkProgressCallback, ConvertLens,
};
use ipasn_convert::lens::parse::ArchiveParser;

/// `rib.20200101.0600.bz2` -> `20200101.0600`
fn archive_label(archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.strip_prefix("rib.")
        .and_then(|n| n.strip_suffix(".bz2"))
        .map(|n| n.to_string())
        .unwrap_or(name)
}

pub fn run<P: ArchiveParser>(lens: &ConvertLens<P>, args: BulkConvertArgs) {
    let callback: BulkProgressCallback = Arc::new(|event: BulkProgress| match event {
        BulkProgress::Started { start, end } => {
            println!("Starting bulk RIB conversion, from {} to {}...", start, end);
        }
        BulkProgress::MultipleCandidates { date, .. } => {
            println!(
                "warning: multiple files on {}, only converting first.",
                date.format("%Y%m%d")
            );
        }
        BulkProgress::DayStarted { archive, .. } => {
            print!("{}... ", archive_label(&archive));
            let _ = std::io::stdout().flush();
        }
        BulkProgress::DayMissing { .. } => {}
        BulkProgress::DayFailed { reason, .. } => {
            println!("failed");
            eprintln!("ERROR: {reason}");
        }
        BulkProgress::DayCompleted { counts, .. } => {
            println!("{} IPV4 + {} IPV6 prefixes", counts.ipv4, counts.ipv6);
        }
        BulkProgress::Finished {
            converted,
            missing,
            failed,
        } => {
            println!("Finished! {converted} converted, {missing} missing, {failed} failed");
        }
    });

    match lens.bulk(&args, Some(callback)) {
        Ok(report) => {
            if report.has_failures() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}
