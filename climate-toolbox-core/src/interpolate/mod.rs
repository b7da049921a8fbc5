//! Scattered-data interpolation
//!
//! Estimates values at arbitrary target locations from irregularly placed known
//! `(lat, lon) -> value` samples. Targets that the chosen method cannot support
//! (outside the triangulated hull for [`ScatteredMethod::Linear`]) come back as NaN.

mod delaunay;
mod nearest;

pub use delaunay::{LinearTriangulation, Triangulation};
pub use nearest::NearestNeighbour;

use crate::field::FloatValue;
use serde::{Deserialize, Serialize};

/// A location in `(lat, lon)` coordinate space
pub type Location = [FloatValue; 2];

/// Method for scattered data interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScatteredMethod {
    /// Nearest known sample.
    Nearest,
    /// Piecewise-linear interpolation on a Delaunay triangulation.
    #[default]
    Linear,
}

impl ScatteredMethod {
    pub fn interpolator(&self) -> Box<dyn ScatteredInterpolator + Send + Sync> {
        match self {
            ScatteredMethod::Nearest => Box::new(NearestNeighbour),
            ScatteredMethod::Linear => Box::new(LinearTriangulation),
        }
    }
}

impl std::str::FromStr for ScatteredMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(ScatteredMethod::Nearest),
            "linear" => Ok(ScatteredMethod::Linear),
            other => Err(format!(
                "unknown interpolation method '{}', expected 'linear' or 'nearest'",
                other
            )),
        }
    }
}

impl std::fmt::Display for ScatteredMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScatteredMethod::Nearest => write!(f, "nearest"),
            ScatteredMethod::Linear => write!(f, "linear"),
        }
    }
}

/// Scattered data interpolation algorithms.
pub trait ScatteredInterpolator {
    /// Fewest known samples for which the method can produce any estimate
    fn min_known_points(&self) -> usize;

    /// Interpolate scattered data at target locations.
    ///
    /// # Arguments
    /// * `known` - Known sample locations
    /// * `values` - Known values, one per entry of `known`
    /// * `targets` - Locations to estimate
    ///
    /// Returns one estimate per target; NaN where no estimate can be made.
    fn interpolate(
        &self,
        known: &[Location],
        values: &[FloatValue],
        targets: &[Location],
    ) -> Vec<FloatValue>;
}

/// Interpolate `targets` from `known` samples with `method`.
pub fn griddata(
    method: ScatteredMethod,
    known: &[Location],
    values: &[FloatValue],
    targets: &[Location],
) -> Vec<FloatValue> {
    method.interpolator().interpolate(known, values, targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_from_string() {
        assert_eq!(
            "linear".parse::<ScatteredMethod>().unwrap(),
            ScatteredMethod::Linear
        );
        assert_eq!(
            "nearest".parse::<ScatteredMethod>().unwrap(),
            ScatteredMethod::Nearest
        );
        assert!("cubic".parse::<ScatteredMethod>().is_err());
    }

    #[test]
    fn method_serialises_as_snake_case() {
        let json = serde_json::to_string(&ScatteredMethod::Nearest).unwrap();
        assert_eq!(json, "\"nearest\"");
    }

    #[test]
    fn griddata_dispatches_to_method() {
        let known = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]];
        let values = [0.0, 1.0, 2.0];
        let targets = [[0.9, 0.05]];
        let nearest = griddata(ScatteredMethod::Nearest, &known, &values, &targets);
        assert_eq!(nearest, vec![2.0]);
        let linear = griddata(ScatteredMethod::Linear, &known, &values, &targets);
        assert!((linear[0] - (0.9 * 2.0 + 0.05)).abs() < 1e-12);
    }
}
