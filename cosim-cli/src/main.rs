//! ## cosim-cli
//! **Command line front end of the co-simulation kernel**
//!
//! Loads a scenario and the layered configuration, runs the federation and
//! prints a run report. Exits with 1 when the run aborted and 2 when the
//! watchdog stopped it.

use std::process::ExitCode;

use clap::Parser;

mod commands;
mod error;

use commands::Cli;
use error::CliError;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match commands::run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}
