//! Serialization of per-subbasin daily series into the legacy SWAT text files or the SWAT+
//! climate files, plus the index files that list every subbasin written in a run.
//!
//! Each output file is built in memory and written in one call, so a failure never leaves a
//! half-written file behind. Writes report their own success or failure; a failed file does
//! not stop the caller from attempting the others.
use std::{fmt::Display, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::{series::{Parameter, SubbasinSeries}, subbasin::Subbasin};

mod index;
mod legacy;
mod next_gen;

pub use index::{IndexAccumulator, IndexRecord};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Could not create output directory {}: {1}", .0.display())]
    CreateDir(PathBuf, std::io::Error),
    #[error("Could not write {}: {1}", .0.display())]
    WriteFile(PathBuf, std::io::Error),
    #[error("Cannot write {variable} for subbasin {subbasin}: the series has no dates")]
    EmptySeries { variable: Variable, subbasin: u32 },
}

impl WriteError {
    /// The file (or directory) the failed write was aimed at, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            WriteError::CreateDir(p, _) | WriteError::WriteFile(p, _) => Some(p),
            WriteError::EmptySeries { .. } => None,
        }
    }
}

/// Which file family to produce. A run uses exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Legacy SWAT: `<prefix><id>.txt` files and `<prefix>.txt` index tables
    Legacy,
    /// SWAT+: `<prefix><id>.<ext>` files and `.cli` lists
    NextGen,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Legacy => write!(f, "legacy"),
            OutputFormat::NextGen => write!(f, "next-gen"),
        }
    }
}

/// The columns of the legacy temperature file. SWAT+ temperature files are always max/min.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemperatureColumns {
    #[default]
    MaxMin,
    MaxMinMean,
}

impl TemperatureColumns {
    pub fn parameters(&self) -> &'static [Parameter] {
        match self {
            TemperatureColumns::MaxMin => &[Parameter::TemperatureAirMax2m, Parameter::TemperatureAirMin2m],
            TemperatureColumns::MaxMinMean => &[
                Parameter::TemperatureAirMax2m,
                Parameter::TemperatureAirMin2m,
                Parameter::TemperatureAirMean2m,
            ],
        }
    }
}

/// The five variable families that get one file per subbasin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    Temperature,
    Precipitation,
    Humidity,
    Wind,
    Solar,
}

impl Variable {
    pub const ALL: [Variable; 5] = [
        Self::Temperature,
        Self::Precipitation,
        Self::Humidity,
        Self::Wind,
        Self::Solar,
    ];

    /// File name prefix, shared by both families.
    pub fn prefix(&self) -> &'static str {
        match self {
            Variable::Temperature => "tmp",
            Variable::Precipitation => "pcp",
            Variable::Humidity => "rh",
            Variable::Wind => "wind",
            Variable::Solar => "solar",
        }
    }

    /// Extension of the SWAT+ data files.
    pub fn next_gen_extension(&self) -> &'static str {
        match self {
            Variable::Temperature => "tmp",
            Variable::Precipitation => "pcp",
            Variable::Humidity => "hmd",
            Variable::Wind => "wnd",
            Variable::Solar => "slr",
        }
    }

    /// Name of the SWAT+ `.cli` list file for this variable.
    pub fn cli_file_name(&self) -> String {
        format!("{}.cli", self.next_gen_extension())
    }

    /// Name used to identify this variable in index records.
    pub fn index_name(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::Precipitation => "precipitation_height",
            Variable::Humidity => "humidity",
            Variable::Wind => "wind_speed",
            Variable::Solar => "radiation_global",
        }
    }

    /// The per-subbasin station name, e.g. `pcp007`.
    pub fn station_name(&self, subbasin_id: u32) -> String {
        format!("{}{subbasin_id:03}", self.prefix())
    }

    /// The parameters that make up this variable's columns, in file order.
    pub fn parameters(&self, temperature_columns: TemperatureColumns) -> &'static [Parameter] {
        match self {
            Variable::Temperature => temperature_columns.parameters(),
            Variable::Precipitation => &[Parameter::PrecipitationHeight],
            Variable::Humidity => &[Parameter::Humidity],
            Variable::Wind => &[Parameter::WindSpeed],
            Variable::Solar => &[Parameter::RadiationGlobal],
        }
    }

    /// The name of the data file for one subbasin in the given family.
    pub fn file_name(&self, subbasin_id: u32, format: OutputFormat) -> String {
        match format {
            OutputFormat::Legacy => format!("{}.txt", self.station_name(subbasin_id)),
            OutputFormat::NextGen => format!("{}.{}", self.station_name(subbasin_id), self.next_gen_extension()),
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index_name())
    }
}

/// Writes the series of one run in a single output family.
#[derive(Debug, Clone)]
pub struct SeriesWriter {
    output_dir: PathBuf,
    format: OutputFormat,
    legacy_temperature_columns: TemperatureColumns,
}

impl SeriesWriter {
    pub fn new(output_dir: PathBuf, format: OutputFormat, legacy_temperature_columns: TemperatureColumns) -> Self {
        Self { output_dir, format, legacy_temperature_columns }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Create the output directory if needed.
    pub fn ensure_output_dir(&self) -> Result<(), WriteError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| WriteError::CreateDir(self.output_dir.clone(), e))
    }

    /// Write one variable's file for one subbasin, returning the path written.
    pub fn write_variable(&self, subbasin: &Subbasin, series: &SubbasinSeries, variable: Variable) -> Result<PathBuf, WriteError> {
        if series.is_empty() {
            return Err(WriteError::EmptySeries { variable, subbasin: subbasin.id });
        }

        let file_name = variable.file_name(subbasin.id, self.format);
        let contents = match self.format {
            OutputFormat::Legacy => {
                legacy::render_series(series, variable.parameters(self.legacy_temperature_columns))
            },
            OutputFormat::NextGen => {
                // SWAT+ temperature files always have exactly max and min
                let params = variable.parameters(TemperatureColumns::MaxMin);
                next_gen::render_series(&file_name, subbasin, series, params)
            },
        };

        let path = self.output_dir.join(&file_name);
        write_whole_file(&path, &contents)?;
        log::info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Write every variable for one subbasin. Each file succeeds or fails independently;
    /// successful ones are recorded in `index`.
    pub fn write_subbasin(&self, subbasin: &Subbasin, series: &SubbasinSeries, index: &mut IndexAccumulator) -> Vec<Result<PathBuf, WriteError>> {
        Variable::ALL.iter()
            .map(|&variable| {
                let res = self.write_variable(subbasin, series, variable);
                if res.is_ok() {
                    index.record(variable, subbasin);
                }
                res
            })
            .collect()
    }

    /// Write the index files for this family from everything accumulated over the run.
    pub fn write_index_files(&self, index: &IndexAccumulator) -> Vec<Result<PathBuf, WriteError>> {
        match self.format {
            OutputFormat::Legacy => index::write_legacy_index_files(&self.output_dir, index),
            OutputFormat::NextGen => index::write_cli_files(&self.output_dir, index),
        }
    }
}

pub(crate) fn write_whole_file(path: &Path, contents: &str) -> Result<(), WriteError> {
    std::fs::write(path, contents)
        .map_err(|e| WriteError::WriteFile(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn example_series() -> SubbasinSeries {
        let mut series = SubbasinSeries::new(SubbasinSeries::daily_axis(ymd(2020, 12, 30), ymd(2021, 1, 2)));
        series.insert(Parameter::TemperatureAirMax2m, vec![Some(3.5), Some(-99.0), Some(4.123), None]).unwrap();
        series.insert(Parameter::TemperatureAirMin2m, vec![Some(-1.25), Some(-99.0), None, None]).unwrap();
        series.insert(Parameter::TemperatureAirMean2m, vec![Some(1.0), Some(0.5), Some(2.0), None]).unwrap();
        series.insert(Parameter::PrecipitationHeight, vec![Some(0.0), Some(12.346), Some(-99.0), Some(1.0)]).unwrap();
        series
    }

    fn subbasin() -> Subbasin {
        Subbasin { id: 7, lat: 51.2345, lon: 12.3456, elev: Some(105.5) }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(Variable::Temperature.file_name(7, OutputFormat::Legacy), "tmp007.txt");
        assert_eq!(Variable::Humidity.file_name(12, OutputFormat::NextGen), "rh012.hmd");
        assert_eq!(Variable::Solar.file_name(123, OutputFormat::NextGen), "solar123.slr");
        assert_eq!(Variable::Wind.cli_file_name(), "wnd.cli");
        assert_eq!(Variable::Precipitation.station_name(1), "pcp001");
    }

    #[test]
    fn test_legacy_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeriesWriter::new(dir.path().to_path_buf(), OutputFormat::Legacy, TemperatureColumns::MaxMin);
        let series = example_series();
        let path = writer.write_variable(&subbasin(), &series, Variable::Temperature).unwrap();
        assert_eq!(path.file_name().unwrap(), "tmp007.txt");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "20201230\n3.50,-1.25\n-99.00,-99.00\n4.12,\n,");

        let parsed = legacy::parse_series(&text, 2).unwrap();
        assert_eq!(parsed.0, ymd(2020, 12, 30));
        let maxes: Vec<Option<f64>> = parsed.1.iter().map(|r| r[0]).collect();
        assert_eq!(maxes, vec![Some(3.5), Some(-99.0), Some(4.12), None]);
    }

    #[test]
    fn test_legacy_with_mean() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeriesWriter::new(dir.path().to_path_buf(), OutputFormat::Legacy, TemperatureColumns::MaxMinMean);
        let path = writer.write_variable(&subbasin(), &example_series(), Variable::Temperature).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().nth(1), Some("3.50,-1.25,1.00"));
    }

    #[test]
    fn test_next_gen_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeriesWriter::new(dir.path().to_path_buf(), OutputFormat::NextGen, TemperatureColumns::MaxMinMean);
        let series = example_series();
        let path = writer.write_variable(&subbasin(), &series, Variable::Precipitation).unwrap();
        assert_eq!(path.file_name().unwrap(), "pcp007.pcp");

        let text = std::fs::read_to_string(&path).unwrap();
        let expected = "pcp007.pcp\nnbyr\ttstep\tlat\tlon\telev\n2\t0\t51.23\t12.35\t105.50\n\
                        2020\t365\t0.00\n2020\t366\t12.35\n2021\t1\t-99.00\n2021\t2\t1.00\n";
        assert_eq!(text, expected);

        let parsed = next_gen::parse_series(&text).unwrap();
        let dates: Vec<NaiveDate> = parsed.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, series.dates());
        assert_eq!(parsed[1].1, vec![Some(12.35)]);

        // Temperature ignores the legacy mean column setting
        let path = writer.write_variable(&subbasin(), &series, Variable::Temperature).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().nth(3), Some("2020\t365\t3.50\t-1.25"));
        assert_eq!(text.lines().nth(6), Some("2021\t2\t\t"));
    }

    #[test]
    fn test_missing_parameter_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeriesWriter::new(dir.path().to_path_buf(), OutputFormat::Legacy, TemperatureColumns::MaxMin);
        let path = writer.write_variable(&subbasin(), &example_series(), Variable::Wind).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "20201230\n\n\n\n");
    }

    #[test]
    fn test_write_subbasin_records_index() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SeriesWriter::new(dir.path().to_path_buf(), OutputFormat::NextGen, TemperatureColumns::MaxMin);
        let mut index = IndexAccumulator::default();
        let results = writer.write_subbasin(&subbasin(), &example_series(), &mut index);
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(index.subbasin_ids(), vec![7]);
        assert_eq!(index.records().len(), 5);
    }

    #[test]
    fn test_failed_write_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not_created");
        let writer = SeriesWriter::new(missing, OutputFormat::Legacy, TemperatureColumns::MaxMin);
        let mut index = IndexAccumulator::default();
        let results = writer.write_subbasin(&subbasin(), &example_series(), &mut index);
        assert!(results.iter().all(|r| matches!(r, Err(WriteError::WriteFile(_, _)))));
        assert!(index.records().is_empty());

        let empty = SubbasinSeries::new(vec![]);
        let err = writer.write_variable(&subbasin(), &empty, Variable::Solar).unwrap_err();
        assert!(matches!(err, WriteError::EmptySeries { .. }));
        assert!(err.path().is_none());
    }
}
