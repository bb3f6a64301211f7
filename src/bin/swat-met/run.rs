use colored::Colorize;
use error_stack::ResultExt;

use swat_met_rs::{
    config::RunConfig,
    default_files::{default_run_config_toml, RICHTER_PARAMETERS},
    pipeline::{self, RunSummary},
};

use crate::{CliError, DefaultConfigCli, RunCli};

/// Run the configured pipeline. Returns `Ok(true)` if every subbasin and file succeeded and
/// `Ok(false)` if some were skipped or failed.
pub(crate) fn run_from_config(args: RunCli) -> error_stack::Result<bool, CliError> {
    let config = RunConfig::from_toml_file(&args.config)
        .change_context(CliError::Config)
        .attach_printable_lazy(|| format!("configuration file was {}", args.config.display()))?;

    let summary = pipeline::run(&config)
        .change_context(CliError::Run)?;

    print_summary(&summary);
    Ok(summary.is_complete())
}

fn print_summary(summary: &RunSummary) {
    println!("Summary:");
    for id in summary.processed.iter() {
        println!("{:^9} subbasin {id}", "OK".on_green().black().bold());
    }
    for (id, reason) in summary.skipped.iter() {
        println!("{:^9} subbasin {id}: {reason}", "SKIPPED".on_red().black().bold());
    }
    for failed in summary.failed_writes.iter() {
        println!("{:^9} {}: {}", "FAILED".on_red().black().bold(), failed.path.display(), failed.reason);
    }

    if summary.is_complete() {
        println!("\nAll {} subbasins written.", summary.processed.len());
    } else {
        println!("\n{summary}. Review the messages above; the output is incomplete.");
    }
}

pub(crate) fn write_default_config(args: DefaultConfigCli) -> error_stack::Result<(), CliError> {
    let toml = default_run_config_toml();
    let Some(output) = args.output else {
        print!("{toml}");
        return Ok(());
    };

    std::fs::write(&output, toml)
        .change_context_lazy(|| CliError::IoError(format!("could not write {}", output.display())))?;

    let richter_file = output.with_file_name("richter_parameters.csv");
    if richter_file.exists() {
        log::warn!("{} already exists, not overwriting it", richter_file.display());
    } else {
        std::fs::write(&richter_file, RICHTER_PARAMETERS)
            .change_context_lazy(|| CliError::IoError(format!("could not write {}", richter_file.display())))?;
    }
    Ok(())
}
