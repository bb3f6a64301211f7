use std::path::PathBuf;

use itertools::Itertools;
use log::debug;

use super::{RawTable, SourceTables, SubbasinQuery, TableError};
use crate::utils::pattern_replacement::{render_query_pattern, PatternError};

#[derive(Debug, thiserror::Error)]
pub(super) enum CsvSourceError {
    #[error("Station file {} does not exist", .0.display())]
    MissingStationFile(PathBuf),
    #[error("No observation files match {0}")]
    NoValueFiles(String),
    #[error("Invalid glob pattern {0}")]
    BadGlob(String),
    #[error("Cannot read {}: {1}", .0.display())]
    ReadError(PathBuf, std::io::Error),
    #[error("Error in table {}: {1}", .0.display())]
    Table(PathBuf, TableError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

pub(super) fn read_csv_source(
    stations_pattern: &str,
    values_pattern: &str,
    query: &SubbasinQuery,
) -> Result<SourceTables, CsvSourceError> {
    let rep = query.pattern_replacer();
    let station_file = PathBuf::from(render_query_pattern(stations_pattern, &rep)?);
    let values_glob = render_query_pattern(values_pattern, &rep)?;

    if !station_file.exists() {
        return Err(CsvSourceError::MissingStationFile(station_file));
    }
    let stations = read_table(station_file)?;

    // Sort so that the concatenated table has a reproducible row order.
    let value_files: Vec<PathBuf> = glob::glob(&values_glob)
        .map_err(|e| CsvSourceError::BadGlob(format!("{values_glob} ({e})")))?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("Could not check {} against the pattern {values_glob}: {e}", e.path().display());
                None
            }
        })
        .sorted()
        .collect();

    if value_files.is_empty() {
        return Err(CsvSourceError::NoValueFiles(values_glob));
    }

    let mut values = RawTable::default();
    for file in value_files {
        debug!("Reading observations for subbasin {} from {}", query.subbasin.id, file.display());
        let table = read_table(file.clone())?;
        values.append(table)
            .map_err(|e| CsvSourceError::Table(file, e))?;
    }

    Ok(SourceTables { stations, values })
}

fn read_table(file: PathBuf) -> Result<RawTable, CsvSourceError> {
    let f = std::fs::File::open(&file)
        .map_err(|e| CsvSourceError::ReadError(file.clone(), e))?;
    RawTable::from_csv_reader(f)
        .map_err(|e| CsvSourceError::Table(file, e))
}
