//! Inverse-distance weighting of station values to a single target point.
use serde::{Deserialize, Serialize};

use crate::MISSING_SENTINEL;

/// Distances at or below this are treated as a station sitting on the target point.
pub const EXACT_HIT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    #[error("no station had a finite distance and value to interpolate from")]
    InsufficientData,
    #[error("distance and value lists have different lengths ({distances} vs. {values})")]
    MismatchedLengths { distances: usize, values: usize },
}

/// What to do when a date has no usable station values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdwStrategy {
    /// Report [`InterpolationError::InsufficientData`] to the caller.
    Strict,
    /// Substitute [`MISSING_SENTINEL`].
    #[default]
    Lenient,
}

/// Interpolate one scalar from parallel lists of distances and values.
///
/// Pairs where either element is not finite are dropped first. If any remaining station is
/// within [`EXACT_HIT_EPSILON`] of the target, the mean of those stations is returned and all
/// other stations are ignored. Otherwise each value is weighted by `1 / distance^power`.
pub fn inverse_distance_weight(distances: &[f64], values: &[f64], power: f64) -> Result<f64, InterpolationError> {
    if distances.len() != values.len() {
        return Err(InterpolationError::MismatchedLengths { distances: distances.len(), values: values.len() });
    }

    idw_from_pairs(distances.iter().copied().zip(values.iter().copied()), power)
}

/// [`inverse_distance_weight`] over `(distance, value)` pairs.
pub fn idw_from_pairs<I>(pairs: I, power: f64) -> Result<f64, InterpolationError>
where I: IntoIterator<Item = (f64, f64)>
{
    let pairs = pairs.into_iter()
        .filter(|(d, v)| d.is_finite() && v.is_finite());

    let mut hit_sum = 0.0;
    let mut n_hits = 0usize;
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut n_valid = 0usize;

    for (d, v) in pairs {
        n_valid += 1;
        if d <= EXACT_HIT_EPSILON {
            hit_sum += v;
            n_hits += 1;
        } else if n_hits == 0 {
            let w = 1.0 / d.powf(power);
            weighted_sum += w * v;
            weight_sum += w;
        }
    }

    if n_valid == 0 {
        Err(InterpolationError::InsufficientData)
    } else if n_hits > 0 {
        Ok(hit_sum / n_hits as f64)
    } else {
        Ok(weighted_sum / weight_sum)
    }
}

/// An inverse-distance interpolator with a fixed power and missing-data strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdwInterpolator {
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default)]
    pub strategy: IdwStrategy,
}

impl Default for IdwInterpolator {
    fn default() -> Self {
        Self { power: default_power(), strategy: IdwStrategy::default() }
    }
}

impl IdwInterpolator {
    pub fn new(power: f64, strategy: IdwStrategy) -> Self {
        Self { power, strategy }
    }

    /// Interpolate from `(distance, value)` pairs. With the lenient strategy, insufficient data
    /// yields `Ok(MISSING_SENTINEL)`; with the strict strategy it is returned as an error.
    pub fn interpolate(&self, pairs: &[(f64, f64)]) -> Result<f64, InterpolationError> {
        match (idw_from_pairs(pairs.iter().copied(), self.power), self.strategy) {
            (Err(InterpolationError::InsufficientData), IdwStrategy::Lenient) => Ok(MISSING_SENTINEL),
            (res, _) => res,
        }
    }
}

fn default_power() -> f64 {
    2.0
}
