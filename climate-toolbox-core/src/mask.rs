//! Classification of missing cells
//!
//! Missingness is derived from the values, never stored: a cell is missing when it
//! is NaN, infinite, or at/above the sentinel threshold used by upstream data
//! producers to flag fill values.

use crate::field::FloatValue;
use ndarray::{Array2, ArrayView2, ArrayViewMutD};

/// Default threshold at or above which a value is treated as a fill sentinel
pub const DEFAULT_SENTINEL: FloatValue = 1e10;

/// Whether `value` counts as missing under `sentinel`
#[inline]
pub fn is_missing(value: FloatValue, sentinel: FloatValue) -> bool {
    !value.is_finite() || value >= sentinel
}

/// Replace infinite and sentinel values by NaN, returning how many cells were rewritten.
///
/// Existing NaN cells are left alone and are not counted.
pub fn normalize_missing(mut values: ArrayViewMutD<'_, FloatValue>, sentinel: FloatValue) -> usize {
    let mut replaced = 0;
    values.map_inplace(|v| {
        if !v.is_nan() && is_missing(*v, sentinel) {
            *v = FloatValue::NAN;
            replaced += 1;
        }
    });
    replaced
}

/// Boolean missing-cell mask of a 2-D slice (`true` = missing)
#[derive(Debug, Clone, PartialEq)]
pub struct MissingMask {
    mask: Array2<bool>,
}

impl MissingMask {
    pub fn from_slice(slice: ArrayView2<'_, FloatValue>, sentinel: FloatValue) -> Self {
        Self {
            mask: slice.map(|v| is_missing(*v, sentinel)),
        }
    }

    pub fn count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    pub fn any(&self) -> bool {
        self.mask.iter().any(|m| *m)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    #[inline]
    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        self.mask[[row, col]]
    }

    /// Any missing cell in `row` between columns `col_min..=col_max`
    pub fn row_has_missing(&self, row: usize, col_min: usize, col_max: usize) -> bool {
        (col_min..=col_max).any(|c| self.mask[[row, c]])
    }

    /// Any missing cell in `col` between rows `row_min..=row_max`
    pub fn col_has_missing(&self, col: usize, row_min: usize, row_max: usize) -> bool {
        (row_min..=row_max).any(|r| self.mask[[r, col]])
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn classifies_nan_inf_and_sentinel() {
        assert!(is_missing(f64::NAN, DEFAULT_SENTINEL));
        assert!(is_missing(f64::INFINITY, DEFAULT_SENTINEL));
        assert!(is_missing(f64::NEG_INFINITY, DEFAULT_SENTINEL));
        assert!(is_missing(1e10, DEFAULT_SENTINEL));
        assert!(is_missing(1e20, DEFAULT_SENTINEL));
        assert!(!is_missing(9.9e9, DEFAULT_SENTINEL));
        assert!(!is_missing(-1e20, DEFAULT_SENTINEL));
        assert!(!is_missing(0.0, DEFAULT_SENTINEL));
    }

    #[test]
    fn normalize_rewrites_only_non_nan_missing_cells() {
        let mut values = ArrayD::from_shape_vec(
            IxDyn(&[2, 3]),
            vec![1.0, f64::INFINITY, f64::NAN, 1e12, -5.0, f64::NEG_INFINITY],
        )
        .unwrap();
        let replaced = normalize_missing(values.view_mut(), DEFAULT_SENTINEL);
        assert_eq!(replaced, 3);
        assert_eq!(values[[0, 0]], 1.0);
        assert_eq!(values[[1, 1]], -5.0);
        assert_eq!(values.iter().filter(|v| v.is_nan()).count(), 4);
    }

    #[test]
    fn mask_queries() {
        let slice = array![[1.0, f64::NAN, 3.0], [4.0, 5.0, f64::NAN]];
        let mask = MissingMask::from_slice(slice.view(), DEFAULT_SENTINEL);
        assert_eq!(mask.count(), 2);
        assert!(mask.any());
        assert!(mask.row_has_missing(0, 0, 2));
        assert!(!mask.row_has_missing(0, 2, 2));
        assert!(mask.col_has_missing(2, 0, 1));
        assert!(!mask.col_has_missing(0, 0, 1));
    }
}
