use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use pageflip::cli::{self, CliArgs};
use pageflip::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Initialize session log (overwrites previous session log)
    logger::init(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info });
    if let Some(path) = logger::log_path() {
        log::info!("session log at {}", path.display());
    }

    cli::run(args)
}
