use std::{collections::BTreeMap, path::{Path, PathBuf}};

use chrono::NaiveDate;
use error_stack::ResultExt;
use serde::{Deserialize, Serialize};

use crate::{
    interpolation::IdwInterpolator,
    observations::ObservationSource,
    path_relative_to_config,
    writer::{OutputFormat, TemperatureColumns},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Could not parse configuration file {}", .0.display())]
    ParseError(PathBuf),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the Richter precipitation correction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RichterConfig {
    /// Whether to correct station precipitation before interpolation.
    #[serde(default)]
    pub enabled: bool,

    /// CSV file with the Richter coefficients, required when `enabled` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_file: Option<PathBuf>,
}

/// Everything needed to produce climate files for one set of subbasins.
///
/// Relative paths are interpreted relative to the directory containing the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// CSV table of subbasins with columns `id`, `lat`, `lon` and optionally `elev`.
    pub subbasin_file: PathBuf,

    /// Directory to write the climate files into. It is created if it does not exist.
    pub output_dir: PathBuf,

    /// First day of the output series (YYYY-MM-DD).
    pub start_date: NaiveDate,

    /// Last day of the output series (YYYY-MM-DD), inclusive.
    pub end_date: NaiveDate,

    /// Stations farther than this from a subbasin centroid are not used.
    pub search_radius_km: f64,

    /// Either "legacy" (SWAT `.txt` files) or "next-gen" (SWAT+ files and `.cli` lists).
    pub output_format: OutputFormat,

    /// Temperature columns in legacy files: "max-min" or "max-min-mean".
    #[serde(default)]
    pub legacy_temperature_columns: TemperatureColumns,

    #[serde(default)]
    pub interpolation: IdwInterpolator,

    #[serde(default)]
    pub richter: RichterConfig,

    pub source: ObservationSource,

    /// Parameters (by provider name) that use the N nearest reporting stations instead of the
    /// search radius.
    #[serde(default)]
    pub nearest_stations: BTreeMap<String, usize>,
}

impl RunConfig {
    /// Read, resolve relative paths in, and validate a TOML run configuration.
    pub fn from_toml_file(config_file: &Path) -> error_stack::Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(config_file)
            .change_context_lazy(|| ConfigError::IoError(
                format!("could not read configuration file {}", config_file.display())
            ))?;

        let cfg: Self = toml::from_str(&contents)
            .change_context_lazy(|| ConfigError::ParseError(config_file.to_path_buf()))?;

        let cfg = cfg.relative_to_config(config_file);
        cfg.validate()?;
        Ok(cfg)
    }

    fn relative_to_config(self, config_file: &Path) -> Self {
        let richter = RichterConfig {
            enabled: self.richter.enabled,
            parameter_file: self.richter.parameter_file.map(|p| path_relative_to_config(config_file, p)),
        };

        Self {
            subbasin_file: path_relative_to_config(config_file, self.subbasin_file),
            output_dir: path_relative_to_config(config_file, self.output_dir),
            source: self.source.relative_to_config(config_file),
            richter,
            ..self
        }
    }

    /// Check the preconditions a run needs. Any failure here means the run cannot start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_date < self.start_date {
            return Err(ConfigError::Invalid(format!(
                "end_date ({}) is before start_date ({})", self.end_date, self.start_date
            )));
        }

        if !(self.search_radius_km > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "search_radius_km must be > 0, got {}", self.search_radius_km
            )));
        }

        if !(self.interpolation.power > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "interpolation.power must be > 0, got {}", self.interpolation.power
            )));
        }

        if self.richter.enabled && self.richter.parameter_file.is_none() {
            return Err(ConfigError::Invalid(
                "richter.enabled is true but richter.parameter_file is not set".to_string()
            ));
        }

        if let Some((param, _)) = self.nearest_stations.iter().find(|(_, n)| **n == 0) {
            return Err(ConfigError::Invalid(format!(
                "nearest_stations.{param} must be at least 1"
            )));
        }

        Ok(())
    }
}
