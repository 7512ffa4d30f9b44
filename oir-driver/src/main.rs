use std::process::ExitCode;

use clap::Parser;
use oir_driver::Opt;
use tracing_subscriber::EnvFilter;
use utils::DiagnosticEmitter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opt::parse();

    let mut diag = DiagnosticEmitter::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()));
    let contents = std::fs::read_to_string(&opts.filename).expect("Failed to read input file.");

    if oir_driver::process_source(&contents, &mut diag, &opts).is_none() {
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}
