use std::process::ExitCode;

use clap::Parser;
use log::error;
use mailpipe::{logging, run, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let handle = match logging::init_logging(logging::QUIET) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start logging: {e:?}");
            return ExitCode::FAILURE;
        }
    };
    match run(cli, &handle) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}
