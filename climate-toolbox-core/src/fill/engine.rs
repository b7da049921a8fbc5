//! Iterative filling of missing patches within one 2-D slice

use super::patches::{label_patches, Patch};
use crate::field::FloatValue;
use crate::interpolate::{Location, ScatteredInterpolator};
use crate::mask::MissingMask;
use crate::parameters::{FillParameters, PatchOrder};
use ndarray::{ArrayView1, ArrayViewMut2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Result of filling a single slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The slice had no missing cells
    Untouched,
    /// Every missing cell was filled
    Complete { attempts: usize, filled: usize },
    /// The attempt budget ran out with cells still missing
    BudgetExhausted {
        attempts: usize,
        filled: usize,
        remaining: usize,
    },
}

impl FillOutcome {
    pub fn remaining(&self) -> usize {
        match self {
            FillOutcome::BudgetExhausted { remaining, .. } => *remaining,
            _ => 0,
        }
    }
}

/// Drives patch labelling, window growth and local interpolation for one slice.
pub struct IterativeFillEngine {
    interpolator: Box<dyn ScatteredInterpolator + Send + Sync>,
    max_attempts: usize,
    sentinel: FloatValue,
    patch_order: PatchOrder,
}

impl IterativeFillEngine {
    pub fn new(params: &FillParameters) -> Self {
        Self {
            interpolator: params.method.interpolator(),
            max_attempts: params.max_attempts,
            sentinel: params.sentinel,
            patch_order: params.patch_order,
        }
    }

    /// Engine with a caller-supplied interpolator
    pub fn with_interpolator(
        params: &FillParameters,
        interpolator: Box<dyn ScatteredInterpolator + Send + Sync>,
    ) -> Self {
        Self {
            interpolator,
            ..Self::new(params)
        }
    }

    /// Fill the missing cells of `slice` (indexed `[lat, lon]`) in place.
    ///
    /// Only missing cells and cells inside a grown window are written, and only with
    /// finite estimates, so a valid cell is never turned into a missing one.
    pub fn fill_slice(
        &self,
        mut slice: ArrayViewMut2<'_, FloatValue>,
        lat: ArrayView1<'_, FloatValue>,
        lon: ArrayView1<'_, FloatValue>,
    ) -> FillOutcome {
        let initial = MissingMask::from_slice(slice.view(), self.sentinel).count();
        if initial == 0 {
            return FillOutcome::Untouched;
        }

        let mut budget = self.max_attempts;
        let mut attempts = 0;
        let mut rng = match self.patch_order {
            PatchOrder::Random { seed } => Some(ChaCha8Rng::seed_from_u64(seed)),
            _ => None,
        };

        loop {
            let mask = MissingMask::from_slice(slice.view(), self.sentinel);
            let patches = label_patches(&mask);
            if patches.is_empty() {
                return FillOutcome::Complete {
                    attempts,
                    filled: initial,
                };
            }

            budget = budget.max(patches.len() * 2);
            if attempts >= budget {
                let remaining = mask.count();
                return FillOutcome::BudgetExhausted {
                    attempts,
                    filled: initial - remaining,
                    remaining,
                };
            }

            let patch = self.select_patch(&patches, attempts, rng.as_mut());
            attempts += 1;
            self.fill_patch(&mut slice, &mask, patch, lat, lon);
        }
    }

    fn select_patch<'a>(
        &self,
        patches: &'a [Patch],
        attempt: usize,
        rng: Option<&mut ChaCha8Rng>,
    ) -> &'a Patch {
        let index = match (self.patch_order, rng) {
            (PatchOrder::Random { .. }, Some(rng)) => rng.gen_range(0..patches.len()),
            (PatchOrder::LargestFirst, _) => patches
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
                .map(|(i, _)| i)
                .unwrap_or(0),
            _ => attempt % patches.len(),
        };
        &patches[index]
    }

    /// Grow a window around `patch` and interpolate every cell inside it from the
    /// window's valid cells.
    fn fill_patch(
        &self,
        slice: &mut ArrayViewMut2<'_, FloatValue>,
        mask: &MissingMask,
        patch: &Patch,
        lat: ArrayView1<'_, FloatValue>,
        lon: ArrayView1<'_, FloatValue>,
    ) {
        let window = patch.bounds().grow(mask);
        let (rows, cols) = window.coordinate_range(lat, lon).select(lat, lon);

        let mut known: Vec<Location> = Vec::new();
        let mut known_values = Vec::new();
        let mut targets: Vec<Location> = Vec::with_capacity(rows.len() * cols.len());
        let mut positions = Vec::with_capacity(rows.len() * cols.len());
        for &r in &rows {
            for &c in &cols {
                let location = [lat[r], lon[c]];
                if !mask.is_missing(r, c) {
                    known.push(location);
                    known_values.push(slice[[r, c]]);
                }
                targets.push(location);
                positions.push((r, c));
            }
        }

        if known.len() < self.interpolator.min_known_points() {
            debug!(
                window = ?window,
                known = known.len(),
                "Too few valid cells to interpolate; patch left for a later attempt"
            );
            return;
        }

        let estimates = self
            .interpolator
            .interpolate(&known, &known_values, &targets);
        let mut written = 0;
        for ((r, c), value) in positions.into_iter().zip(estimates) {
            if value.is_finite() && value < self.sentinel {
                slice[[r, c]] = value;
                written += 1;
            }
        }
        debug!(
            window = ?window,
            patch_cells = patch.len(),
            written,
            "Interpolated window"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolate::ScatteredMethod;
    use ndarray::{array, Array1, Array2};

    const NAN: f64 = f64::NAN;

    fn coords(n: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| i as f64))
    }

    fn engine() -> IterativeFillEngine {
        IterativeFillEngine::new(&FillParameters::default())
    }

    fn count_missing(values: &Array2<f64>) -> usize {
        values.iter().filter(|v| v.is_nan()).count()
    }

    #[test]
    fn untouched_when_nothing_missing() {
        let mut values = array![[1.0, 2.0], [3.0, 4.0]];
        let before = values.clone();
        let outcome = engine().fill_slice(values.view_mut(), coords(2).view(), coords(2).view());
        assert_eq!(outcome, FillOutcome::Untouched);
        assert_eq!(values, before);
    }

    #[test]
    fn single_interior_hole_converges() {
        let mut values = Array2::from_shape_fn((5, 6), |(r, c)| 2.0 * r as f64 + c as f64);
        values[[2, 3]] = NAN;
        values[[2, 4]] = NAN;
        let outcome = engine().fill_slice(values.view_mut(), coords(5).view(), coords(6).view());
        assert_eq!(
            outcome,
            FillOutcome::Complete {
                attempts: 1,
                filled: 2
            }
        );
        assert!((values[[2, 3]] - 7.0).abs() < 1e-9);
        assert!((values[[2, 4]] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn cells_outside_every_window_keep_their_values() {
        let mut values = Array2::from_shape_fn((6, 6), |(r, c)| (r * 6 + c) as f64);
        values[[1, 1]] = NAN;
        let before = values.clone();
        engine().fill_slice(values.view_mut(), coords(6).view(), coords(6).view());
        for r in 3..6 {
            for c in 0..6 {
                assert_eq!(values[[r, c]], before[[r, c]]);
            }
        }
        assert_eq!(count_missing(&values), 0);
    }

    #[test]
    fn several_patches_are_all_filled() {
        let mut values = Array2::from_shape_fn((8, 8), |(r, c)| (r + c) as f64);
        for (r, c) in [(1, 1), (1, 6), (5, 2), (6, 6), (6, 5)] {
            values[[r, c]] = NAN;
        }
        let outcome = engine().fill_slice(values.view_mut(), coords(8).view(), coords(8).view());
        assert!(matches!(outcome, FillOutcome::Complete { filled: 5, .. }));
        assert_eq!(count_missing(&values), 0);
    }

    #[test]
    fn unreachable_corner_exhausts_budget() {
        // With linear interpolation a corner hole is outside the hull of its neighbours
        let mut values = Array2::from_elem((4, 4), 1.0);
        values[[0, 0]] = NAN;
        let outcome = engine().fill_slice(values.view_mut(), coords(4).view(), coords(4).view());
        assert_eq!(
            outcome,
            FillOutcome::BudgetExhausted {
                attempts: 10,
                filled: 0,
                remaining: 1
            }
        );
        assert_eq!(outcome.remaining(), 1);
        // the other cells were only ever rewritten with their own values
        assert_eq!(count_missing(&values), 1);
    }

    #[test]
    fn nearest_fills_corners() {
        let params = FillParameters {
            method: ScatteredMethod::Nearest,
            ..Default::default()
        };
        let mut values = Array2::from_elem((4, 4), 3.0);
        values[[0, 0]] = NAN;
        values[[3, 3]] = NAN;
        let outcome = IterativeFillEngine::new(&params).fill_slice(
            values.view_mut(),
            coords(4).view(),
            coords(4).view(),
        );
        assert!(matches!(outcome, FillOutcome::Complete { .. }));
        assert_eq!(values[[0, 0]], 3.0);
        assert_eq!(values[[3, 3]], 3.0);
    }

    #[test]
    fn budget_is_raised_for_many_patches() {
        // Eight holes along the top edge; the one in the corner can never be filled linearly
        let mut values = Array2::from_elem((3, 16), 1.0);
        for c in (0..16).step_by(2) {
            values[[0, c]] = NAN;
        }
        let outcome = engine().fill_slice(values.view_mut(), coords(3).view(), coords(16).view());
        assert_eq!(
            outcome,
            FillOutcome::BudgetExhausted {
                attempts: 16,
                filled: 7,
                remaining: 1
            }
        );
        assert!(values[[0, 0]].is_nan());
    }

    /// Run the default engine on `values` and check that no valid cell changed.
    fn fill_underdetermined(values: &mut Array2<f64>) -> FillOutcome {
        let before = values.clone();
        let (rows, cols) = values.dim();
        let outcome = engine().fill_slice(values.view_mut(), coords(rows).view(), coords(cols).view());
        for (a, b) in values.iter().zip(before.iter()) {
            assert!(a.is_nan() && b.is_nan() || a == b);
        }
        outcome
    }

    #[test]
    fn slice_without_valid_cells_is_left_missing() {
        let mut values = Array2::from_elem((4, 5), NAN);
        assert_eq!(
            fill_underdetermined(&mut values),
            FillOutcome::BudgetExhausted {
                attempts: 10,
                filled: 0,
                remaining: 20
            }
        );
    }

    #[test]
    fn two_valid_cells_cannot_be_triangulated() {
        let mut values = Array2::from_elem((4, 5), NAN);
        values[[1, 1]] = 4.0;
        values[[2, 3]] = 6.0;
        assert_eq!(
            fill_underdetermined(&mut values),
            FillOutcome::BudgetExhausted {
                attempts: 10,
                filled: 0,
                remaining: 18
            }
        );
        assert_eq!(values[[1, 1]], 4.0);
        assert_eq!(values[[2, 3]], 6.0);
    }

    #[test]
    fn single_valid_row_is_collinear() {
        let mut values = Array2::from_elem((4, 5), NAN);
        for c in 0..5 {
            values[[1, c]] = c as f64;
        }
        assert_eq!(
            fill_underdetermined(&mut values),
            FillOutcome::BudgetExhausted {
                attempts: 10,
                filled: 0,
                remaining: 15
            }
        );
    }

    #[test]
    fn missing_count_never_increases() {
        let mut values = Array2::from_shape_fn((10, 10), |(r, c)| ((r * 7 + c * 3) % 11) as f64);
        for (r, c) in [(0, 0), (2, 3), (2, 4), (3, 3), (7, 8), (9, 9), (5, 0)] {
            values[[r, c]] = NAN;
        }
        let params = FillParameters {
            max_attempts: 1,
            ..Default::default()
        };
        let engine = IterativeFillEngine::new(&params);
        let lat = coords(10);
        let lon = coords(10);
        let mut previous = count_missing(&values);
        // each call runs a small number of attempts; the missing count must not grow
        for _ in 0..10 {
            engine.fill_slice(values.view_mut(), lat.view(), lon.view());
            let now = count_missing(&values);
            assert!(now <= previous);
            previous = now;
        }
    }

    #[test]
    fn patch_orders_agree_on_result() {
        let base = Array2::from_shape_fn((7, 7), |(r, c)| 0.5 * r as f64 - c as f64);
        for order in [
            PatchOrder::RoundRobin,
            PatchOrder::LargestFirst,
            PatchOrder::Random { seed: 42 },
        ] {
            let mut values = base.clone();
            values[[1, 1]] = NAN;
            values[[4, 4]] = NAN;
            values[[4, 5]] = NAN;
            let params = FillParameters {
                patch_order: order,
                ..Default::default()
            };
            IterativeFillEngine::new(&params).fill_slice(
                values.view_mut(),
                coords(7).view(),
                coords(7).view(),
            );
            for (v, b) in values.iter().zip(base.iter()) {
                assert!((v - b).abs() < 1e-9, "{:?}: {} vs {}", order, v, b);
            }
        }
    }

    #[test]
    fn largest_first_selects_biggest_patch() {
        let values = array![[NAN, 1.0, NAN, NAN], [1.0, 1.0, 1.0, NAN]];
        let mask = MissingMask::from_slice(values.view(), 1e10);
        let patches = label_patches(&mask);
        let params = FillParameters {
            patch_order: PatchOrder::LargestFirst,
            ..Default::default()
        };
        let engine = IterativeFillEngine::new(&params);
        assert_eq!(engine.select_patch(&patches, 0, None).len(), 3);
    }
}
