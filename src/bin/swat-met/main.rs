//! Produce per-subbasin daily climate files for SWAT or SWAT+ from station observations.
use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

mod run;

fn main() -> ExitCode {
    let clargs = Cli::parse();

    env_logger::Builder::new()
        .filter_level(clargs.verbose.log_level_filter())
        .init();

    let res = match clargs.command {
        Actions::Run(args) => run::run_from_config(args),
        Actions::DefaultConfig(args) => run::write_default_config(args).map(|_| true),
    };

    match res {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("An error occurred:\n{e:?}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Could not load the run configuration")]
    Config,
    #[error("The run could not start")]
    Run,
    #[error("I/O error: {0}")]
    IoError(String),
}

// ---------------------- //
// Command line interface //
// ---------------------- //

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Actions,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Debug, Subcommand)]
enum Actions {
    /// Interpolate station observations to every subbasin and write the climate files.
    Run(RunCli),

    /// Print an example run configuration, or write it to a file.
    DefaultConfig(DefaultConfigCli),
}

#[derive(Debug, Args)]
struct RunCli {
    /// Path to the TOML run configuration. Relative paths inside it are
    /// interpreted relative to the directory containing this file.
    config: PathBuf,
}

#[derive(Debug, Args)]
struct DefaultConfigCli {
    /// Where to write the configuration. If not given, it is printed to stdout.
    /// An example Richter parameter table is written next to it.
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,
}
