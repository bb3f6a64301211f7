//! The per-subbasin pipeline (fetch, normalize, correct, interpolate) and the run driver that
//! feeds its output to the writer.
use std::{collections::BTreeMap, fmt::Display, path::{Path, PathBuf}};

use chrono::NaiveDate;
use error_stack::{AttachmentKind, FrameKind, ResultExt};
use log::{debug, info, warn};

use crate::{
    config::RunConfig,
    interpolation::{IdwInterpolator, InterpolationError},
    normalize::{normalize, read_station_table, NormalizeError},
    observations::{ObservationSource, SourceError, SubbasinQuery},
    richter::RichterParams,
    series::{Parameter, SeriesError, SubbasinSeries},
    subbasin::{read_subbasin_table, Subbasin},
    writer::{IndexAccumulator, SeriesWriter, WriteError},
};

/// Errors that stop a run before any subbasin is processed.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("The run configuration is invalid")]
    Config,
    #[error("Could not load the subbasin table")]
    Subbasins,
    #[error("Could not load the Richter parameters")]
    Richter,
    #[error("Could not prepare the output directory")]
    OutputDir,
}

/// Why one subbasin was skipped. None of these stop the run.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("no data available ({0})")]
    NoData(String),
    #[error("{0}")]
    Source(String),
    #[error("could not interpret the observation tables: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("cannot interpolate {parameter} on {date}: {error}")]
    Interpolation { parameter: Parameter, date: NaiveDate, error: InterpolationError },
    #[error(transparent)]
    Series(#[from] SeriesError),
}

impl From<error_stack::Report<SourceError>> for SkipReason {
    fn from(value: error_stack::Report<SourceError>) -> Self {
        debug!("Observation source error detail:\n{value:?}");
        let err = value.current_context();
        if err.is_empty_result() {
            Self::NoData(err.reason.to_string())
        } else {
            Self::Source(report_chain(&value))
        }
    }
}

/// Every context and printable attachment in a report, outermost first, joined into one line.
fn report_chain<C>(report: &error_stack::Report<C>) -> String {
    report.frames()
        .filter_map(|frame| match frame.kind() {
            FrameKind::Context(context) => Some(context.to_string()),
            FrameKind::Attachment(AttachmentKind::Printable(attachment)) => Some(attachment.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A file that could not be written.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWrite {
    pub path: PathBuf,
    pub reason: String,
}

/// What happened to each subbasin and output file in a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Subbasins whose series were produced, in processing order
    pub processed: Vec<u32>,
    /// Subbasins that were skipped, with the reason
    pub skipped: Vec<(u32, String)>,
    pub failed_writes: Vec<FailedWrite>,
}

impl RunSummary {
    /// `true` if every subbasin was processed and every file written.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed_writes.is_empty()
    }

    fn add_write_failure(&mut self, err: WriteError, fallback_path: &Path) {
        let path = err.path().unwrap_or(fallback_path).to_path_buf();
        warn!("{err}");
        self.failed_writes.push(FailedWrite { path, reason: err.to_string() });
    }

    /// Record the outcome of writing one subbasin's files. A subbasin counts as processed
    /// only if at least one of its files was written.
    fn add_subbasin_writes(&mut self, subbasin_id: u32, results: Vec<Result<PathBuf, WriteError>>, fallback_path: &Path) {
        let mut n_written = 0;
        for res in results {
            match res {
                Ok(_) => n_written += 1,
                Err(e) => self.add_write_failure(e, fallback_path),
            }
        }

        if n_written > 0 {
            self.processed.push(subbasin_id);
        } else {
            warn!("Skipping subbasin {subbasin_id}: none of its files could be written");
            self.skipped.push((subbasin_id, "none of its files could be written".to_string()));
        }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} subbasins processed, {} skipped, {} files failed to write",
            self.processed.len(), self.skipped.len(), self.failed_writes.len()
        )
    }
}

/// The run-wide settings needed to turn one subbasin's observations into its series.
#[derive(Debug, Clone)]
pub struct SubbasinPipeline {
    source: ObservationSource,
    start_date: NaiveDate,
    end_date: NaiveDate,
    radius_km: f64,
    nearest_stations: BTreeMap<String, usize>,
    interpolator: IdwInterpolator,
    richter: Option<RichterParams>,
}

impl SubbasinPipeline {
    pub fn new(
        source: ObservationSource,
        start_date: NaiveDate,
        end_date: NaiveDate,
        radius_km: f64,
        interpolator: IdwInterpolator,
        richter: Option<RichterParams>,
    ) -> Self {
        Self { source, start_date, end_date, radius_km, nearest_stations: BTreeMap::new(), interpolator, richter }
    }

    pub fn with_nearest_stations(mut self, nearest_stations: BTreeMap<String, usize>) -> Self {
        self.nearest_stations = nearest_stations;
        self
    }

    /// Build the pipeline for a run, loading the Richter parameters if correction is enabled.
    pub fn from_config(config: &RunConfig) -> error_stack::Result<Self, RunError> {
        let richter = match (config.richter.enabled, &config.richter.parameter_file) {
            (true, Some(file)) => {
                let params = RichterParams::load_csv(file)
                    .change_context(RunError::Richter)?;
                Some(params)
            },
            (true, None) => {
                return Err(error_stack::Report::new(RunError::Richter)
                    .attach_printable("richter.enabled is true but no parameter_file was given"));
            },
            (false, _) => None,
        };

        let pipeline = Self::new(
            config.source.clone(),
            config.start_date,
            config.end_date,
            config.search_radius_km,
            config.interpolation,
            richter,
        ).with_nearest_stations(config.nearest_stations.clone());
        Ok(pipeline)
    }

    /// Produce the series block for one subbasin.
    ///
    /// Every recognized parameter present in the observations gets a series on the full
    /// date axis. Parameters with no observations in the date range get no series at all,
    /// which the writer renders as blank fields.
    pub fn process_subbasin(&self, subbasin: &Subbasin) -> Result<SubbasinSeries, SkipReason> {
        let query = SubbasinQuery {
            subbasin,
            start_date: self.start_date,
            end_date: self.end_date,
            radius_km: self.radius_km,
        };
        let tables = self.source.fetch(&query)?;

        let stations = read_station_table(&tables.stations, subbasin)?;
        if stations.is_empty() {
            return Err(SkipReason::NoData("no stations with a distance or coordinates".to_string()));
        }
        debug!("Subbasin {}: {} stations", subbasin.id, stations.len());

        let mut obs = normalize(&stations, &tables.values)?;
        obs.restrict_dates(self.start_date, self.end_date);

        // Correct at the gauge, before any stations are dropped
        if let Some(richter) = &self.richter {
            let n = richter.correct_observations(&mut obs);
            debug!("Subbasin {}: {n} precipitation values had a matching temperature for the Richter correction", subbasin.id);
        }

        obs.select_stations(self.radius_km, &self.nearest_stations);
        if obs.n_values() == 0 {
            return Err(SkipReason::NoData(format!(
                "no observations between {} and {} from stations within {} km",
                self.start_date, self.end_date, self.radius_km
            )));
        }

        for name in obs.parameters() {
            if name.parse::<Parameter>().is_err() {
                debug!("Subbasin {}: ignoring unrecognized parameter '{name}'", subbasin.id);
            }
        }

        let mut series = SubbasinSeries::new(SubbasinSeries::daily_axis(self.start_date, self.end_date));
        for parameter in Parameter::ALL {
            let name = parameter.provider_name();
            if !obs.contains_parameter(name) {
                debug!("Subbasin {}: no {name} observations, its columns will be blank", subbasin.id);
                continue;
            }

            let values = series.dates()
                .iter()
                .map(|&date| {
                    self.interpolator.interpolate(&obs.pairs(name, date))
                        .map(Some)
                        .map_err(|error| SkipReason::Interpolation { parameter, date, error })
                })
                .collect::<Result<Vec<_>, _>>()?;
            series.insert(parameter, values)?;
        }

        Ok(series)
    }
}

/// Process every subbasin in the configuration, write its files, then write the index files.
///
/// Only problems that prevent the run from starting are returned as errors. Skipped
/// subbasins and failed writes are logged and reported in the [`RunSummary`].
pub fn run(config: &RunConfig) -> error_stack::Result<RunSummary, RunError> {
    config.validate()
        .change_context(RunError::Config)?;
    let subbasins = read_subbasin_table(&config.subbasin_file)
        .change_context(RunError::Subbasins)?;
    let pipeline = SubbasinPipeline::from_config(config)?;

    let writer = SeriesWriter::new(config.output_dir.clone(), config.output_format, config.legacy_temperature_columns);
    writer.ensure_output_dir()
        .change_context(RunError::OutputDir)?;

    info!(
        "Writing {} climate files for {} subbasins from {} to {}",
        config.output_format, subbasins.len(), config.start_date, config.end_date
    );

    let mut index = IndexAccumulator::default();
    let mut summary = RunSummary::default();

    for subbasin in subbasins.iter() {
        info!("Processing subbasin {}", subbasin.id);
        match pipeline.process_subbasin(subbasin) {
            Ok(series) => {
                let results = writer.write_subbasin(subbasin, &series, &mut index);
                summary.add_subbasin_writes(subbasin.id, results, writer.output_dir());
            },
            Err(reason) => {
                warn!("Skipping subbasin {}: {reason}", subbasin.id);
                summary.skipped.push((subbasin.id, reason.to_string()));
            }
        }
    }

    for res in writer.write_index_files(&index) {
        if let Err(e) = res {
            summary.add_write_failure(e, writer.output_dir());
        }
    }

    info!("{summary}");
    Ok(summary)
}
