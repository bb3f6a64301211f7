//! Richter (1995) correction of systematic precipitation gauge undercatch.
//!
//! The correction adds `b * p^epsilon` to a raw precipitation value `p`, with the coefficient
//! pair chosen by the air temperature on that day (snow, mixed precipitation, or rain) and,
//! for rain, by the calendar month (summer or winter). The added amount is capped at
//! `maximum_changes * p`.
use std::{collections::HashMap, fmt::Display, path::{Path, PathBuf}};

use chrono::{Datelike, NaiveDate};
use error_stack::ResultExt;
use serde::Deserialize;

use crate::{normalize::CanonicalObservations, series::Parameter, MISSING_SENTINEL};

#[derive(Debug, thiserror::Error)]
pub enum RichterError {
    #[error("Cannot read Richter parameter file {}", .0.display())]
    ReadError(PathBuf),
    #[error("Error parsing Richter parameter file {}", .0.display())]
    CsvError(PathBuf),
    #[error("Richter parameter file {} has no data row", .0.display())]
    NoParameters(PathBuf),
    #[error("Invalid Richter parameters: {0}")]
    Invalid(String),
}

/// The coefficients of the Richter correction.
///
/// When read from a CSV file, the column names follow the Richter parameter table used by
/// the hydrological modelling group, e.g. `epsilon_Snow`, `b_Snow`, `T_Snow`, `maximum_changes`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RichterParams {
    #[serde(rename = "epsilon_Snow")]
    pub eps_snow: f64,
    #[serde(rename = "b_Snow")]
    pub b_snow: f64,
    #[serde(rename = "epsilon_Mix")]
    pub eps_mix: f64,
    #[serde(rename = "b_Mix")]
    pub b_mix: f64,
    #[serde(rename = "epsilon_Summer")]
    pub eps_summer: f64,
    #[serde(rename = "b_Summer")]
    pub b_summer: f64,
    #[serde(rename = "epsilon_Winter")]
    pub eps_winter: f64,
    #[serde(rename = "b_Winter")]
    pub b_winter: f64,
    /// Temperatures at or below this (degrees C) are treated as snow.
    #[serde(rename = "T_Snow")]
    pub t_snow: f64,
    /// Temperatures above `t_snow` and at or below this (degrees C) are treated as mixed precipitation.
    #[serde(rename = "T_Mix")]
    pub t_mix: f64,
    /// Maximum change as a fraction of the raw precipitation.
    #[serde(rename = "maximum_changes")]
    pub max_fraction: f64,
    #[serde(rename = "Summer_month_Start")]
    pub summer_month_start: u32,
    #[serde(rename = "Winter_month_Start")]
    pub winter_month_start: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Snow,
    Mix,
    SummerRain,
    WinterRain,
}

impl Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Snow => write!(f, "snow"),
            Regime::Mix => write!(f, "mixed"),
            Regime::SummerRain => write!(f, "summer rain"),
            Regime::WinterRain => write!(f, "winter rain"),
        }
    }
}

impl RichterParams {
    /// Read the parameters from the first data row of a CSV file and validate them.
    pub fn load_csv(file: &Path) -> error_stack::Result<Self, RichterError> {
        let f = std::fs::File::open(file)
            .change_context_lazy(|| RichterError::ReadError(file.to_path_buf()))?;
        let params = Self::read_csv_inner(f)
            .change_context_lazy(|| RichterError::CsvError(file.to_path_buf()))?
            .ok_or_else(|| RichterError::NoParameters(file.to_path_buf()))?;
        params.validate()?;
        Ok(params)
    }

    fn read_csv_inner<R: std::io::Read>(input: R) -> Result<Option<Self>, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(input);
        rdr.deserialize().next().transpose()
    }

    /// Check that the thresholds split temperature into three ordered regimes and that
    /// the month thresholds and maximum change are usable.
    pub fn validate(&self) -> Result<(), RichterError> {
        if !(self.t_snow < self.t_mix) {
            return Err(RichterError::Invalid(format!(
                "T_Snow ({}) must be less than T_Mix ({})", self.t_snow, self.t_mix
            )));
        }
        for (name, month) in [("Summer_month_Start", self.summer_month_start), ("Winter_month_Start", self.winter_month_start)] {
            if !(1..=12).contains(&month) {
                return Err(RichterError::Invalid(format!("{name} must be a month number 1-12, got {month}")));
            }
        }
        if !(self.max_fraction >= 0.0) {
            return Err(RichterError::Invalid(format!(
                "maximum_changes must be >= 0, got {}", self.max_fraction
            )));
        }
        Ok(())
    }

    /// Choose the correction regime for a day. Both temperature thresholds are inclusive
    /// on the colder side. Summer runs from `summer_month_start` through the end of the
    /// year and from January up to (but not including) `winter_month_start`.
    pub fn select_regime(&self, temperature: f64, month: u32) -> Regime {
        if temperature <= self.t_snow {
            Regime::Snow
        } else if temperature <= self.t_mix {
            Regime::Mix
        } else if month >= self.summer_month_start || month < self.winter_month_start {
            Regime::SummerRain
        } else {
            Regime::WinterRain
        }
    }

    /// The `(epsilon, b)` pair for a regime.
    pub fn coefficients(&self, regime: Regime) -> (f64, f64) {
        match regime {
            Regime::Snow => (self.eps_snow, self.b_snow),
            Regime::Mix => (self.eps_mix, self.b_mix),
            Regime::SummerRain => (self.eps_summer, self.b_summer),
            Regime::WinterRain => (self.eps_winter, self.b_winter),
        }
    }

    /// Correct one precipitation value.
    ///
    /// Missing or sentinel precipitation, negative precipitation, and days without a
    /// temperature are passed through unchanged. The result is rounded to 2 decimal places.
    pub fn correct(&self, precipitation: Option<f64>, temperature: Option<f64>, date: NaiveDate) -> Option<f64> {
        let pcp = precipitation?;
        if pcp == MISSING_SENTINEL || !pcp.is_finite() || pcp < 0.0 {
            return Some(pcp);
        }
        let temp = match temperature {
            Some(t) if t.is_finite() => t,
            _ => return Some(pcp),
        };

        let regime = self.select_regime(temp, date.month());
        let (eps, b) = self.coefficients(regime);
        let change = (b * pcp.powf(eps)).min(self.max_fraction * pcp);
        Some(round_to_hundredths(pcp + change))
    }

    /// Correct every station-level precipitation value in `obs` in place, using the mean
    /// air temperature reported by the same station on the same day. Returns the number of
    /// values that had a matching temperature.
    pub fn correct_observations(&self, obs: &mut CanonicalObservations) -> usize {
        let precip_key = Parameter::PrecipitationHeight.provider_name();
        let temp_key = Parameter::TemperatureAirMean2m.provider_name();

        let temperatures: HashMap<(NaiveDate, String), f64> = obs.by_date(temp_key)
            .map(|by_date| {
                by_date.iter()
                    .flat_map(|(date, values)| values.iter().map(move |sv| ((*date, sv.station_id.clone()), sv.value)))
                    .collect()
            })
            .unwrap_or_default();

        let Some(precip) = obs.by_date_mut(precip_key) else {
            return 0;
        };

        let mut n_matched = 0;
        for (date, values) in precip.iter_mut() {
            for sv in values.iter_mut() {
                let temp = temperatures.get(&(*date, sv.station_id.clone())).copied();
                if temp.is_some() {
                    n_matched += 1;
                }
                if let Some(v) = self.correct(Some(sv.value), temp, *date) {
                    sv.value = v;
                }
            }
        }
        n_matched
    }
}

fn round_to_hundredths(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_params() -> RichterParams {
        RichterParams {
            eps_snow: 1.0,
            b_snow: 0.2,
            eps_mix: 0.55,
            b_mix: 0.535,
            eps_summer: 0.38,
            b_summer: 0.345,
            eps_winter: 0.46,
            b_winter: 0.34,
            t_snow: 0.0,
            t_mix: 3.0,
            max_fraction: 0.5,
            summer_month_start: 5,
            winter_month_start: 1,
        }
    }

    fn date(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, m, 15).unwrap()
    }

    #[test]
    fn test_snow_example() {
        let p = example_params();
        let c = p.correct(Some(10.0), Some(-5.0), date(1)).unwrap();
        assert!((c - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_boundaries() {
        let p = example_params();
        assert_eq!(p.select_regime(0.0, 7), Regime::Snow);
        assert_eq!(p.select_regime(0.01, 7), Regime::Mix);
        assert_eq!(p.select_regime(3.0, 7), Regime::Mix);
        assert_eq!(p.select_regime(3.01, 7), Regime::SummerRain);
    }

    #[test]
    fn test_season_wraps_year() {
        let mut p = example_params();
        p.summer_month_start = 11;
        p.winter_month_start = 4;
        // summer: Nov, Dec, Jan, Feb, Mar
        for m in [11, 12, 1, 2, 3] {
            assert_eq!(p.select_regime(10.0, m), Regime::SummerRain, "month {m}");
        }
        for m in 4..=10 {
            assert_eq!(p.select_regime(10.0, m), Regime::WinterRain, "month {m}");
        }
    }

    #[test]
    fn test_change_is_capped() {
        let mut p = example_params();
        p.b_snow = 5.0;
        let c = p.correct(Some(4.0), Some(-10.0), date(2)).unwrap();
        assert!((c - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_correction_bounds() {
        let p = example_params();
        for pcp in [0.1, 0.5, 1.0, 3.3, 12.0, 48.7] {
            for temp in [-8.0, 0.0, 1.5, 3.0, 15.0] {
                for m in [1, 6, 11] {
                    let c = p.correct(Some(pcp), Some(temp), date(m)).unwrap();
                    // allow for the rounding to hundredths
                    assert!(c >= pcp - 0.005, "{pcp} {temp} {m} -> {c}");
                    assert!(c <= pcp * (1.0 + p.max_fraction) + 0.005, "{pcp} {temp} {m} -> {c}");
                }
            }
        }
    }

    #[test]
    fn test_passthrough() {
        let p = example_params();
        assert_eq!(p.correct(None, Some(1.0), date(3)), None);
        assert_eq!(p.correct(Some(-99.0), Some(1.0), date(3)), Some(-99.0));
        assert_eq!(p.correct(Some(2.345), None, date(3)), Some(2.345));
        assert_eq!(p.correct(Some(2.345), Some(f64::NAN), date(3)), Some(2.345));
        assert_eq!(p.correct(Some(0.0), Some(10.0), date(7)), Some(0.0));
    }

    #[test]
    fn test_read_csv() {
        let table = "epsilon_Snow,b_Snow,epsilon_Mix,b_Mix,epsilon_Summer,b_Summer,epsilon_Winter,b_Winter,T_Snow,T_Mix,maximum_changes,Summer_month_Start,Winter_month_Start
        0.82, 0.72, 0.55, 0.535, 0.38, 0.345, 0.46, 0.34, 0.0, 3.0, 0.5, 5, 1";
        let p = RichterParams::read_csv_inner(table.as_bytes()).unwrap().unwrap();
        assert_eq!(p.b_snow, 0.72);
        assert_eq!(p.summer_month_start, 5);
        p.validate().unwrap();

        let mut bad = p;
        bad.t_mix = -1.0;
        assert!(bad.validate().is_err());
        let mut bad = p;
        bad.winter_month_start = 13;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_correct_station_values() {
        use crate::normalize::StationValue;

        let p = example_params();
        let d = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let sv = |id: &str, value: f64| StationValue { station_id: id.to_string(), distance_km: 1.0, value };

        let mut obs = CanonicalObservations::default();
        obs.push("precipitation_height", d, sv("A", 4.0));
        obs.push("precipitation_height", d, sv("B", 4.0));
        obs.push("temperature_air_mean_2m", d, sv("A", -2.0));
        obs.push("temperature_air_mean_2m", d, sv("C", 20.0));

        assert_eq!(p.correct_observations(&mut obs), 1);
        // A is snow: 4 + 0.2 * 4 = 4.8; B has no temperature and is left alone
        assert_eq!(obs.pairs("precipitation_height", d), vec![(1.0, 4.8), (1.0, 4.0)]);
        assert_eq!(obs.pairs("temperature_air_mean_2m", d), vec![(1.0, -2.0), (1.0, 20.0)]);

        let mut no_precip = CanonicalObservations::default();
        no_precip.push("humidity", d, sv("A", 50.0));
        assert_eq!(p.correct_observations(&mut no_precip), 0);
    }
}
