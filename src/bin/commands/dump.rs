use std::io::BufWriter;

use ipasn_convert::lens::convert::{ConvertLens, DumpScreenArgs};
use ipasn_convert::lens::parse::ArchiveParser;
use ipasn_convert::ConvertError;

pub fn run<P: ArchiveParser>(lens: &ConvertLens<P>, args: DumpScreenArgs) {
    let stdout = std::io::stdout();
    let mut sink = BufWriter::new(stdout.lock());

    if let Err(e) = lens.dump_screen(&args, &mut sink) {
        // a closed pipe (e.g. `| head`) ends the dump quietly
        if let ConvertError::Io { source, .. } = &e {
            if source.kind() == std::io::ErrorKind::BrokenPipe {
                std::process::exit(0);
            }
        }
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}
