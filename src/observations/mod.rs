//! Sources of raw station observations.
//!
//! An observation source answers one query per subbasin with two tables: the stations near
//! the subbasin centroid and the observed values at those stations. Neither table is
//! interpreted here; column detection and joining happen in [`crate::normalize`].
use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use error_stack::{Context, ResultExt};
use serde::{Deserialize, Serialize};

use crate::{
    path_relative_to_config,
    subbasin::Subbasin,
    utils::pattern_replacement::QueryPatternReplacer,
};

mod csv_files;
mod external_script;
mod table;

pub use table::{RawTable, TableError};

/// An error while retrieving the station and observation tables for one subbasin.
#[derive(Debug)]
pub struct SourceError {
    source_type: ObservationSource,
    /// An enum describing the reason for the error.
    pub reason: SourceErrorType,
}

impl Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Error getting observations from {}: {}",
            self.source_type.long_string(),
            self.reason
        )
    }
}

impl Context for SourceError {}

impl SourceError {
    /// `true` if the source worked but had nothing to offer for this subbasin, as opposed to
    /// being misconfigured or failing.
    pub fn is_empty_result(&self) -> bool {
        matches!(self.reason, SourceErrorType::EmptyResult(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceErrorType {
    /// The source had no stations or no data files for the query.
    #[error("No data available: {0}")]
    EmptyResult(String),

    #[error("Could not open/read input: {0}")]
    IoError(String),

    #[error("Problem with the observation source configuration: {0}")]
    ConfigError(String),

    /// This represents a problem parsing the tables delivered by the source
    #[error("Error during parsing: {0}")]
    ParsingError(String),

    /// See the attached error stack for the cause
    #[error("see following error messages for cause")]
    Stack,
}

impl From<csv_files::CsvSourceError> for SourceErrorType {
    fn from(value: csv_files::CsvSourceError) -> Self {
        use csv_files::CsvSourceError as E;
        match value {
            E::MissingStationFile(_) | E::NoValueFiles(_) => SourceErrorType::EmptyResult(value.to_string()),
            E::BadGlob(_) | E::Pattern(_) => SourceErrorType::ConfigError(value.to_string()),
            E::ReadError(_, _) => SourceErrorType::IoError(value.to_string()),
            E::Table(_, _) => SourceErrorType::ParsingError(value.to_string()),
        }
    }
}

impl From<external_script::ScriptSourceError> for SourceErrorType {
    fn from(value: external_script::ScriptSourceError) -> Self {
        use external_script::ScriptSourceError as E;
        match value {
            E::ArgPatternError(_) | E::ScriptNotFound { .. } => SourceErrorType::ConfigError(value.to_string()),
            E::ScriptRunError { .. } | E::ScriptFailedError { .. } => SourceErrorType::IoError(value.to_string()),
            E::OutputParseError(_) | E::Table(_) => SourceErrorType::ParsingError(value.to_string()),
            E::NoStations => SourceErrorType::EmptyResult(value.to_string()),
        }
    }
}

/// The inputs a source needs to look up observations for one subbasin.
#[derive(Debug, Clone, Copy)]
pub struct SubbasinQuery<'a> {
    pub subbasin: &'a Subbasin,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub radius_km: f64,
}

impl<'a> SubbasinQuery<'a> {
    pub(crate) fn pattern_replacer(&self) -> QueryPatternReplacer {
        QueryPatternReplacer {
            subbasin_id: self.subbasin.id,
            start_date: self.start_date,
            end_date: self.end_date,
            lat: self.subbasin.lat,
            lon: self.subbasin.lon,
            radius_km: self.radius_km,
        }
    }
}

/// The two tables a source returns for one subbasin.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub stations: RawTable,
    pub values: RawTable,
}

/// An enum representing the different ways station observations can be provided.
///
/// In a run configuration file, this is given as the `[source]` table and selected with the
/// `type` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObservationSource {
    /// Station and observation tables are CSV files already on disk, e.g. exported from a
    /// provider's download tool. A minimal configuration is:
    ///
    /// ```toml
    /// [source]
    /// type = "CsvFilesV1"
    /// stations = "./data/{SUBBASIN:03}/stations.csv"
    /// values = "./data/{SUBBASIN:03}/values_*.csv"
    /// ```
    ///
    /// `stations` is a path to the station table and `values` is a glob pattern matching one
    /// or more observation tables, which must all have the same header. Both may contain
    /// the placeholders `{SUBBASIN}`, `{START_DATE}`, `{END_DATE}`, `{LAT}`, `{LON}` and
    /// `{RADIUS}`. Relative paths are interpreted relative to the configuration file.
    ///
    /// The station table needs a station id column (`station_id`, `station`, `stations_id`
    /// or `id`) and either a `distance` column in kilometers or `latitude` and `longitude`.
    /// The observation tables may be long (columns for station id, date, parameter and
    /// value) or wide (station id, date, and one column per parameter).
    CsvFilesV1 { stations: String, values: String },

    /// Station and observation tables are produced by an external program, e.g. a script
    /// wrapping a meteorological service's API:
    ///
    /// ```toml
    /// [source]
    /// type = "ExtScriptV1"
    /// script = "python3"
    /// args = ["fetch_dwd.py", "--lat={LAT}", "--lon={LON}", "--radius={RADIUS}",
    ///         "--start={START_DATE}", "--end={END_DATE}"]
    /// working_dir = "./scripts"
    /// ```
    ///
    /// The same placeholders as for `CsvFilesV1` can be used in the arguments. A script
    /// given without a directory is looked up on `PATH`. It must print a single JSON
    /// document to stdout with two arrays of flat records:
    ///
    /// ```json
    /// {"stations": [{"station_id": "00044", "latitude": 52.93, "longitude": 8.24, "distance": 12.3}],
    ///  "values": [{"station_id": "00044", "date": "2020-01-01", "parameter": "humidity", "value": 88.0}]}
    /// ```
    ///
    /// Any diagnostic output must go to stderr.
    ExtScriptV1 {
        script: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "curr_dir")]
        working_dir: PathBuf,
    },
}

impl ObservationSource {
    /// Make any relative paths in this source relative to the directory containing `config_file`.
    pub(crate) fn relative_to_config(self, config_file: &Path) -> Self {
        match self {
            ObservationSource::CsvFilesV1 { stations, values } => {
                let stations = path_relative_to_config(config_file, PathBuf::from(stations))
                    .to_string_lossy()
                    .to_string();
                let values = path_relative_to_config(config_file, PathBuf::from(values))
                    .to_string_lossy()
                    .to_string();
                Self::CsvFilesV1 { stations, values }
            }
            ObservationSource::ExtScriptV1 { script, args, working_dir } => {
                let working_dir = path_relative_to_config(config_file, working_dir);
                Self::ExtScriptV1 { script, args, working_dir }
            }
        }
    }

    /// Retrieve the station and observation tables for one subbasin.
    pub fn fetch(&self, query: &SubbasinQuery) -> error_stack::Result<SourceTables, SourceError> {
        match self {
            ObservationSource::CsvFilesV1 { stations, values } => {
                csv_files::read_csv_source(stations, values, query)
                    .map_err(|e| SourceError {
                        source_type: self.to_owned(),
                        reason: e.into(),
                    }.into())
            }
            ObservationSource::ExtScriptV1 { script, args, working_dir } => {
                external_script::read_with_script(script, args, working_dir, query)
                    .map_err(|e| SourceError {
                        source_type: self.to_owned(),
                        reason: e.into(),
                    })
                    .attach_printable_lazy(|| format!("subbasin was {}", query.subbasin.id))
            }
        }
    }

    /// Return a string including input paths suitable for display in error messages.
    fn long_string(&self) -> String {
        match self {
            ObservationSource::CsvFilesV1 { stations, values } => {
                format!("CSV files V1 (stations = {stations}, values = {values})")
            }
            ObservationSource::ExtScriptV1 { script, args: _, working_dir: _ } => {
                format!("External Script V1 ({script})")
            }
        }
    }
}

impl Display for ObservationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationSource::CsvFilesV1 { .. } => write!(f, "CsvFilesV1"),
            ObservationSource::ExtScriptV1 { .. } => write!(f, "ExtScriptV1"),
        }
    }
}

fn curr_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_de() {
        let src: ObservationSource = toml::from_str(
            "type = \"CsvFilesV1\"\nstations = \"st.csv\"\nvalues = \"v*.csv\"\n"
        ).unwrap();
        assert!(matches!(src, ObservationSource::CsvFilesV1 { .. }));

        let src: ObservationSource = toml::from_str("type = \"ExtScriptV1\"\nscript = \"fetch\"\n").unwrap();
        if let ObservationSource::ExtScriptV1 { script, args, working_dir } = src {
            assert_eq!(script, "fetch");
            assert!(args.is_empty());
            assert_eq!(working_dir, PathBuf::from("."));
        } else {
            panic!("wrong source type");
        }
    }

    #[test]
    fn test_relative_paths() {
        let src = ObservationSource::CsvFilesV1 { stations: "st.csv".to_string(), values: "/abs/v.csv".to_string() };
        let src = src.relative_to_config(Path::new("/runs/basin/run.toml"));
        if let ObservationSource::CsvFilesV1 { stations, values } = src {
            assert_eq!(stations, "/runs/basin/st.csv");
            assert_eq!(values, "/abs/v.csv");
        } else {
            panic!("wrong source type");
        }
    }
}
