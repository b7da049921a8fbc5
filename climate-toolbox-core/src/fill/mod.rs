//! Iterative hole filling of gridded fields
//!
//! Missing cells are repaired slice by slice. Within a slice, the missing cells are
//! grouped into 4-connected patches; one patch per attempt is enclosed in a window
//! grown until its edges are free of missing cells, and every cell of that window is
//! re-estimated by scattered interpolation from the window's valid cells. Attempts
//! are bounded, so a slice whose holes cannot be supported by the chosen method is
//! returned partially filled together with a [`FillWarning`].
//!
//! ```rust
//! use climate_toolbox_core::field::{Axis, GriddedField};
//! use climate_toolbox_core::fill::fill_holes;
//! use climate_toolbox_core::parameters::FillParameters;
//!
//! let mut values: Vec<f64> = (1..=16).map(|v| v as f64).collect();
//! values[5] = f64::NAN;
//! let mut field = GriddedField::from_shape_vec(
//!     vec![
//!         Axis::new("lat", vec![0.0, 1.0, 2.0, 3.0]),
//!         Axis::new("lon", vec![0.0, 1.0, 2.0, 3.0]),
//!     ],
//!     values,
//!     "lat",
//!     "lon",
//! )
//! .unwrap();
//!
//! let report = fill_holes(&mut field, &FillParameters::default()).unwrap();
//! assert!(report.is_complete());
//! assert!((field.values()[[1, 1]] - 6.0).abs() < 1e-9);
//! ```

mod engine;
mod patches;
mod window;

pub use engine::{FillOutcome, IterativeFillEngine};
pub use patches::{label_patches, Patch};
pub use window::{BoundingWindow, CoordinateRange};

use crate::errors::ToolboxResult;
use crate::field::GriddedField;
use crate::mask::{normalize_missing, MissingMask};
use crate::parameters::FillParameters;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{info, warn};

/// Recoverable problem encountered while filling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillWarning {
    /// The attempt budget of a slice ran out; the slice is returned partially filled
    RetryBudgetExceeded {
        /// `(axis name, index)` of each broadcast axis locating the slice
        slice: Vec<(String, usize)>,
        attempts: usize,
        remaining: usize,
    },
}

impl std::fmt::Display for FillWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillWarning::RetryBudgetExceeded {
                slice,
                attempts,
                remaining,
            } => {
                write!(
                    f,
                    "Maximum allowed attempts ({}) exceeded while filling slice {{",
                    attempts
                )?;
                for (i, (name, index)) in slice.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, index)?;
                }
                write!(f, "}}; {} cells remain missing", remaining)
            }
        }
    }
}

/// Summary of a [`fill_holes`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Number of lat/lon slices in the field
    pub slices: usize,
    /// Slices that contained at least one missing cell
    pub slices_with_missing: usize,
    /// Infinite or sentinel cells converted to NaN before filling
    pub normalized: usize,
    /// Cells that were missing and now hold an estimate
    pub filled: usize,
    pub warnings: Vec<FillWarning>,
}

impl FillReport {
    /// No slice was left with missing cells
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.warnings
            .iter()
            .map(|w| match w {
                FillWarning::RetryBudgetExceeded { remaining, .. } => *remaining,
            })
            .sum()
    }
}

/// Fill the missing cells of every lat/lon slice of `field` in place.
///
/// Infinite values and values at or above `params.sentinel` are first replaced by
/// NaN across the whole field. Each slice with missing cells is then copied into its
/// own buffer, filled with an [`IterativeFillEngine`], and written back. Coordinates
/// and shape are never modified.
pub fn fill_holes(field: &mut GriddedField, params: &FillParameters) -> ToolboxResult<FillReport> {
    let mut report = FillReport {
        slices: field.n_slices(),
        normalized: normalize_missing(field.values_mut(), params.sentinel),
        ..Default::default()
    };

    let lat = field.lat().clone();
    let lon = field.lon().clone();
    let engine = IterativeFillEngine::new(params);

    let mut jobs: Vec<(Vec<usize>, Array2<f64>)> = Vec::new();
    for flat in 0..report.slices {
        let index = field.unravel_slice(flat);
        let slice = field.slice_view(&index)?;
        if !MissingMask::from_slice(slice, params.sentinel).any() {
            continue;
        }
        report.slices_with_missing += 1;
        let buffer = slice.to_owned();

        if params.parallel {
            jobs.push((index, buffer));
        } else {
            let mut buffer = buffer;
            let outcome = engine.fill_slice(buffer.view_mut(), lat.view(), lon.view());
            field.slice_view_mut(&index)?.assign(&buffer);
            record(&mut report, field, &index, outcome);
        }
    }

    if params.parallel {
        let outcomes: Vec<FillOutcome> = jobs
            .par_iter_mut()
            .map(|(_, buffer)| engine.fill_slice(buffer.view_mut(), lat.view(), lon.view()))
            .collect();
        for ((index, buffer), outcome) in jobs.into_iter().zip(outcomes) {
            field.slice_view_mut(&index)?.assign(&buffer);
            record(&mut report, field, &index, outcome);
        }
    }

    info!(
        slices = report.slices,
        slices_with_missing = report.slices_with_missing,
        normalized = report.normalized,
        filled = report.filled,
        remaining = report.remaining(),
        "Filled missing cells"
    );
    Ok(report)
}

fn record(report: &mut FillReport, field: &GriddedField, index: &[usize], outcome: FillOutcome) {
    match outcome {
        FillOutcome::Untouched => {}
        FillOutcome::Complete { filled, .. } => report.filled += filled,
        FillOutcome::BudgetExhausted {
            attempts,
            filled,
            remaining,
        } => {
            report.filled += filled;
            let slice: Vec<(String, usize)> = field
                .broadcast_axes()
                .map(|(_, axis)| axis.name.clone())
                .zip(index.iter().copied())
                .collect();
            warn!(
                slice = ?slice,
                attempts,
                remaining,
                "Maximum allowed attempts exceeded; slice left partially filled"
            );
            report.warnings.push(FillWarning::RetryBudgetExceeded {
                slice,
                attempts,
                remaining,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Axis;
    use crate::interpolate::ScatteredMethod;

    fn time_lat_lon(values: Vec<f64>, nt: usize, nlat: usize, nlon: usize) -> GriddedField {
        GriddedField::from_shape_vec(
            vec![
                Axis::positional("time", nt),
                Axis::new("lat", (0..nlat).map(|i| -10.0 + 2.0 * i as f64).collect()),
                Axis::new("lon", (0..nlon).map(|i| 100.0 + 0.5 * i as f64).collect()),
            ],
            values,
            "lat",
            "lon",
        )
        .unwrap()
    }

    #[test]
    fn sentinel_and_infinite_values_are_filled() {
        let (nt, nlat, nlon) = (2, 5, 5);
        let mut values: Vec<f64> = (0..nt * nlat * nlon).map(|v| (v % 7) as f64).collect();
        values[12] = f64::INFINITY;
        values[25 + 12] = 1e20;
        let mut field = time_lat_lon(values, nt, nlat, nlon);

        let report = fill_holes(&mut field, &FillParameters::default()).unwrap();
        assert_eq!(report.slices, 2);
        assert_eq!(report.slices_with_missing, 2);
        assert_eq!(report.normalized, 2);
        assert_eq!(report.filled, 2);
        assert!(report.is_complete());
        assert!(field.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn slices_without_holes_are_skipped() {
        let (nt, nlat, nlon) = (3, 4, 4);
        let mut values: Vec<f64> = (0..nt * nlat * nlon).map(|v| v as f64).collect();
        values[16 + 5] = f64::NAN;
        let mut field = time_lat_lon(values.clone(), nt, nlat, nlon);

        let report = fill_holes(&mut field, &FillParameters::default()).unwrap();
        assert_eq!(report.slices_with_missing, 1);
        for (i, (after, before)) in field.values().iter().zip(values.iter()).enumerate() {
            if !(16..32).contains(&i) {
                assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn exhausted_slices_are_reported_with_their_position() {
        let (nt, nlat, nlon) = (2, 3, 3);
        let mut values = vec![1.0; nt * nlat * nlon];
        // corner of the second time slice
        values[9] = f64::NAN;
        let mut field = time_lat_lon(values, nt, nlat, nlon);

        let report = fill_holes(&mut field, &FillParameters::default()).unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.remaining(), 1);
        assert_eq!(
            report.warnings,
            vec![FillWarning::RetryBudgetExceeded {
                slice: vec![("time".to_string(), 1)],
                attempts: 10,
                remaining: 1,
            }]
        );
        let message = report.warnings[0].to_string();
        assert!(message.contains("time: 1"), "{}", message);
        assert!(field.values()[[1, 0, 0]].is_nan());
    }

    #[test]
    fn parallel_matches_sequential() {
        let (nt, nlat, nlon) = (6, 6, 7);
        let mut values: Vec<f64> = (0..nt * nlat * nlon)
            .map(|v| ((v * 31) % 17) as f64)
            .collect();
        for t in 0..nt {
            values[t * nlat * nlon + 2 * nlon + 3] = f64::NAN;
            values[t * nlat * nlon + 4 * nlon + (t % 5) + 1] = f64::NAN;
        }
        let mut sequential = time_lat_lon(values.clone(), nt, nlat, nlon);
        let mut parallel = time_lat_lon(values, nt, nlat, nlon);

        let seq_report = fill_holes(&mut sequential, &FillParameters::default()).unwrap();
        let par_report = fill_holes(
            &mut parallel,
            &FillParameters {
                parallel: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(seq_report, par_report);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn nearest_method_is_used_when_requested() {
        let (nt, nlat, nlon) = (1, 3, 3);
        let mut values = vec![5.0; nt * nlat * nlon];
        values[0] = f64::NAN;
        let mut field = time_lat_lon(values, nt, nlat, nlon);
        let params = FillParameters {
            method: ScatteredMethod::Nearest,
            ..Default::default()
        };
        let report = fill_holes(&mut field, &params).unwrap();
        assert!(report.is_complete());
        assert_eq!(field.values()[[0, 0, 0]], 5.0);
    }
}
