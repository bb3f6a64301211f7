use std::{collections::BTreeMap, path::PathBuf};

use chrono::NaiveDate;

use crate::{
    config::{RichterConfig, RunConfig},
    interpolation::IdwInterpolator,
    observations::ObservationSource,
    series::Parameter,
    writer::{OutputFormat, TemperatureColumns},
};

/// Example Richter coefficients, as a parameter table ready to be
/// referenced from `richter.parameter_file`.
pub static RICHTER_PARAMETERS: &'static str = include_str!("etc/richter_parameters.csv");

/// An example run configuration, to be edited by the user before running.
pub fn default_run_config() -> RunConfig {
    RunConfig {
        subbasin_file: PathBuf::from("subbasins.csv"),
        output_dir: PathBuf::from("climate"),
        start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
        end_date: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or_default(),
        search_radius_km: 30.0,
        output_format: OutputFormat::NextGen,
        legacy_temperature_columns: TemperatureColumns::default(),
        interpolation: IdwInterpolator::default(),
        richter: RichterConfig { enabled: true, parameter_file: Some(PathBuf::from("richter_parameters.csv")) },
        source: ObservationSource::CsvFilesV1 {
            stations: "observations/{SUBBASIN:03}/stations.csv".to_string(),
            values: "observations/{SUBBASIN:03}/values_*.csv".to_string(),
        },
        nearest_stations: BTreeMap::from([(Parameter::RadiationGlobal.provider_name().to_string(), 3)]),
    }
}

pub fn default_run_config_toml() -> String {
    let s = toml::to_string_pretty(&default_run_config())
        .expect("failed to serialize the default run configuration as TOML - this is a bug");
    s
}
