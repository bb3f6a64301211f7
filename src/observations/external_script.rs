use std::{
    path::{Path, PathBuf},
    process::Command,
};

use itertools::Itertools;
use log::info;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{RawTable, SourceTables, SubbasinQuery, TableError};
use crate::utils::pattern_replacement::{render_query_pattern, PatternError};

#[derive(Debug, thiserror::Error)]
pub(super) enum ScriptSourceError {
    #[error(transparent)]
    ArgPatternError(#[from] PatternError),
    #[error("Error while getting observations: could not find {script} on PATH ({error})")]
    ScriptNotFound {
        script: String,
        error: which::Error,
    },
    #[error("Error while getting observations: setting up to call {script} produced the following error: {error}")]
    ScriptRunError {
        script: String,
        error: std::io::Error,
    },
    #[error("Error while getting observations: calling {script} with arguments {args} returned non-zero exit code {exit_code}")]
    ScriptFailedError {
        script: String,
        args: String,
        exit_code: i32,
    },
    #[error("Error while getting observations: could not parse the script output, error was: {0}")]
    OutputParseError(serde_json::Error),
    #[error("Error while getting observations: {0}")]
    Table(#[from] TableError),
    #[error("the script returned no stations")]
    NoStations,
}

impl ScriptSourceError {
    fn script_run_error<S: ToString>(script: S, error: std::io::Error) -> Self {
        Self::ScriptRunError {
            script: script.to_string(),
            error,
        }
    }

    fn script_failed_error<S: ToString>(
        script: S,
        args: &[String],
        exit_code: Option<i32>,
    ) -> Self {
        let args = args.join(" ");
        // If terminated by a signal, the exit code will apparently be none.
        // For simplicity, we'll just give that a clearly unusual exit code.
        let exit_code = exit_code.unwrap_or(-999);
        Self::ScriptFailedError {
            script: script.to_string(),
            args,
            exit_code,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScriptOutput {
    stations: Vec<Map<String, Value>>,
    #[serde(default)]
    values: Vec<Map<String, Value>>,
}

/// Get the station and observation tables for one subbasin by calling an external program.
///
/// # Arguments
/// - `script`: the program to call. A bare name (no directory) is looked up on `PATH`,
///   anything else is used as given.
/// - `args`: arguments to pass to the program, which may contain query placeholders.
/// - `working_dir`: directory in which to execute the program.
pub(super) fn read_with_script<S: AsRef<str>>(
    script: &str,
    args: &[S],
    working_dir: &Path,
    query: &SubbasinQuery,
) -> Result<SourceTables, ScriptSourceError> {
    let rep = query.pattern_replacer();
    let args: Vec<String> = args
        .iter()
        .map(|a| render_query_pattern(a.as_ref(), &rep))
        .try_collect()?;

    let program = resolve_program(script)?;

    info!(
        "Calling script '{script}' in directory '{}' to get observations for subbasin {}",
        working_dir.display(),
        query.subbasin.id
    );
    let output = Command::new(&program)
        .args(&args)
        .current_dir(working_dir)
        .output()
        .map_err(|e| ScriptSourceError::script_run_error(script, e))?;

    if !output.status.success() {
        return Err(ScriptSourceError::script_failed_error(
            script,
            &args,
            output.status.code(),
        ));
    }

    parse_script_output(&output.stdout)
}

fn resolve_program(script: &str) -> Result<PathBuf, ScriptSourceError> {
    let p = Path::new(script);
    if p.components().count() > 1 {
        return Ok(p.to_path_buf());
    }
    which::which(script).map_err(|error| ScriptSourceError::ScriptNotFound {
        script: script.to_string(),
        error,
    })
}

fn parse_script_output(stdout: &[u8]) -> Result<SourceTables, ScriptSourceError> {
    let output: ScriptOutput = serde_json::from_slice(stdout)
        .map_err(ScriptSourceError::OutputParseError)?;
    if output.stations.is_empty() {
        return Err(ScriptSourceError::NoStations);
    }

    let stations = RawTable::from_json_records(&output.stations)?;
    let values = RawTable::from_json_records(&output.values)?;
    Ok(SourceTables { stations, values })
}
