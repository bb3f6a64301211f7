//! Provider parameter names and the block of daily series produced for one subbasin.
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("Unknown parameter name '{0}'")]
    UnknownParameter(String),
    #[error("Series for {param} has {got} values, but the date axis has {expected} dates")]
    LengthMismatch { param: Parameter, got: usize, expected: usize },
}

/// The daily parameters the observation provider can deliver and that the writers know how
/// to place into an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Parameter {
    PrecipitationHeight,
    Humidity,
    WindSpeed,
    TemperatureAirMax2m,
    TemperatureAirMin2m,
    TemperatureAirMean2m,
    RadiationGlobal,
}

impl Parameter {
    pub const ALL: [Parameter; 7] = [
        Self::PrecipitationHeight,
        Self::Humidity,
        Self::WindSpeed,
        Self::TemperatureAirMax2m,
        Self::TemperatureAirMin2m,
        Self::TemperatureAirMean2m,
        Self::RadiationGlobal,
    ];

    /// The name the observation provider uses for this parameter.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Parameter::PrecipitationHeight => "precipitation_height",
            Parameter::Humidity => "humidity",
            Parameter::WindSpeed => "wind_speed",
            Parameter::TemperatureAirMax2m => "temperature_air_max_2m",
            Parameter::TemperatureAirMin2m => "temperature_air_min_2m",
            Parameter::TemperatureAirMean2m => "temperature_air_mean_2m",
            Parameter::RadiationGlobal => "radiation_global",
        }
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.provider_name())
    }
}

impl FromStr for Parameter {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "precipitation_height" | "pcp" => Ok(Self::PrecipitationHeight),
            "humidity" | "rh" => Ok(Self::Humidity),
            "wind_speed" | "wind" => Ok(Self::WindSpeed),
            "temperature_air_max_2m" | "max_Temperature" | "Max_Temperature" | "tmax" | "temperature_max" => Ok(Self::TemperatureAirMax2m),
            "temperature_air_min_2m" | "min_Temperature" | "Min_Temperature" | "tmin" | "temperature_min" => Ok(Self::TemperatureAirMin2m),
            "temperature_air_mean_2m" | "temperature" | "tmean" | "temperature_mean" => Ok(Self::TemperatureAirMean2m),
            "radiation_global" | "solar" => Ok(Self::RadiationGlobal),
            _ => Err(SeriesError::UnknownParameter(s.to_string())),
        }
    }
}

/// All daily series for one subbasin.
///
/// The date axis is stored once, so every parameter necessarily shares the same length and
/// ordering. A value of `None` means the parameter had no value to write for that date (it
/// renders as a blank field), while the interpolation sentinel is carried as an ordinary
/// `Some(-99.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubbasinSeries {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<Parameter, Vec<Option<f64>>>,
}

impl SubbasinSeries {
    /// Create an empty block over `dates`, which must be ascending and unique.
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]), "series dates must be strictly ascending");
        Self { dates, columns: BTreeMap::new() }
    }

    /// Every calendar day from `start` to `end`, inclusive.
    pub fn daily_axis(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start.iter_days().take_while(|d| *d <= end).collect()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Add (or replace) the series for `param`. Errors if its length differs from the date axis.
    pub fn insert(&mut self, param: Parameter, values: Vec<Option<f64>>) -> Result<(), SeriesError> {
        if values.len() != self.dates.len() {
            return Err(SeriesError::LengthMismatch { param, got: values.len(), expected: self.dates.len() });
        }
        self.columns.insert(param, values);
        Ok(())
    }

    pub fn get(&self, param: Parameter) -> Option<&[Option<f64>]> {
        self.columns.get(&param).map(|v| v.as_slice())
    }

    pub fn parameters(&self) -> impl Iterator<Item = Parameter> + '_ {
        self.columns.keys().copied()
    }

    /// The value of `param` on the `idx`-th date, `None` if the parameter is absent.
    pub fn value_at(&self, param: Parameter, idx: usize) -> Option<f64> {
        self.columns.get(&param)
            .and_then(|v| v.get(idx).copied())
            .flatten()
    }

    /// The first date of the axis, if there is one.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }
}
