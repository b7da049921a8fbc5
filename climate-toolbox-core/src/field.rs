//! Gridded fields with named, coordinate-carrying axes
//!
//! A [`GriddedField`] is an N-dimensional array of samples in which two axes are
//! identified as the spatial latitude and longitude axes. All remaining axes are
//! broadcast axes (typically time); algorithms that work on 2-D data visit each
//! broadcast slice independently.
//!
//! # Examples
//!
//! ```rust
//! use climate_toolbox_core::field::{Axis, GriddedField};
//!
//! let field = GriddedField::from_shape_vec(
//!     vec![
//!         Axis::new("lat", vec![-1.0, 1.0]),
//!         Axis::new("lon", vec![10.0, 20.0, 30.0]),
//!     ],
//!     vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
//!     "lat",
//!     "lon",
//! )
//! .unwrap();
//!
//! assert_eq!(field.n_slices(), 1);
//! assert_eq!(field.slice_view(&[]).unwrap()[[1, 2]], 6.0);
//! ```

use crate::errors::{ToolboxError, ToolboxResult};
use ndarray::{Array1, ArrayD, ArrayView2, ArrayViewMut2, Axis as NdAxis, IxDyn, Ix2};
use serde::{Deserialize, Serialize};

/// Floating point type used for all sample values and coordinates
pub type FloatValue = f64;

/// A named axis and its physical coordinate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub coords: Array1<FloatValue>,
}

impl Axis {
    pub fn new(name: &str, coords: Vec<FloatValue>) -> Self {
        Self {
            name: name.to_string(),
            coords: Array1::from_vec(coords),
        }
    }

    /// Axis whose coordinates are simply the positions `0..len`
    pub fn positional(name: &str, len: usize) -> Self {
        Self::new(name, (0..len).map(|i| i as FloatValue).collect())
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Verify the coordinates are strictly increasing or strictly decreasing.
    pub fn check_strictly_monotonic(&self) -> ToolboxResult<()> {
        if self.coords.len() < 2 {
            return Ok(());
        }
        let increasing = self.coords[1] > self.coords[0];
        for (position, pair) in self.coords.windows(2).into_iter().enumerate() {
            let ordered = if increasing {
                pair[1] > pair[0]
            } else {
                pair[1] < pair[0]
            };
            if !ordered {
                return Err(ToolboxError::NonMonotonicCoordinate {
                    axis: self.name.clone(),
                    position: position + 1,
                });
            }
        }
        Ok(())
    }
}

/// An N-dimensional field with identified latitude and longitude axes.
///
/// Coordinates and shape are fixed at construction; only cell values may be
/// mutated afterwards (see [`GriddedField::values_mut`]).
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    axes: Vec<Axis>,
    values: ArrayD<FloatValue>,
    lat_axis: usize,
    lon_axis: usize,
}

impl GriddedField {
    /// Create a new field.
    ///
    /// The shape of `values` must match the axis lengths in order and the spatial
    /// axes must carry strictly monotonic coordinates.
    pub fn new(
        axes: Vec<Axis>,
        values: ArrayD<FloatValue>,
        lat_name: &str,
        lon_name: &str,
    ) -> ToolboxResult<Self> {
        let expected: Vec<usize> = axes.iter().map(Axis::len).collect();
        if values.shape() != expected.as_slice() {
            return Err(ToolboxError::ShapeMismatch(format!(
                "values have shape {:?} but axes describe {:?}",
                values.shape(),
                expected
            )));
        }
        let find = |name: &str| {
            axes.iter()
                .position(|a| a.name == name)
                .ok_or_else(|| ToolboxError::UnknownAxis(name.to_string()))
        };
        let lat_axis = find(lat_name)?;
        let lon_axis = find(lon_name)?;
        if lat_axis == lon_axis {
            return Err(ToolboxError::ShapeMismatch(
                "latitude and longitude must be different axes".to_string(),
            ));
        }
        axes[lat_axis].check_strictly_monotonic()?;
        axes[lon_axis].check_strictly_monotonic()?;

        Ok(Self {
            axes,
            values,
            lat_axis,
            lon_axis,
        })
    }

    /// Create a new field from row-major flat values
    pub fn from_shape_vec(
        axes: Vec<Axis>,
        values: Vec<FloatValue>,
        lat_name: &str,
        lon_name: &str,
    ) -> ToolboxResult<Self> {
        let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let values = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| ToolboxError::ShapeMismatch(e.to_string()))?;
        Self::new(axes, values, lat_name, lon_name)
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn axis_index(&self, name: &str) -> ToolboxResult<usize> {
        self.axes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| ToolboxError::UnknownAxis(name.to_string()))
    }

    pub fn lat_axis(&self) -> usize {
        self.lat_axis
    }

    pub fn lon_axis(&self) -> usize {
        self.lon_axis
    }

    pub fn lat(&self) -> &Array1<FloatValue> {
        &self.axes[self.lat_axis].coords
    }

    pub fn lon(&self) -> &Array1<FloatValue> {
        &self.axes[self.lon_axis].coords
    }

    pub fn values(&self) -> &ArrayD<FloatValue> {
        &self.values
    }

    /// Mutable access to the cell values. The shape cannot be changed through this view.
    pub fn values_mut(&mut self) -> ndarray::ArrayViewMutD<'_, FloatValue> {
        self.values.view_mut()
    }

    pub fn into_values(self) -> ArrayD<FloatValue> {
        self.values
    }

    pub fn is_spatial(&self, axis: usize) -> bool {
        axis == self.lat_axis || axis == self.lon_axis
    }

    /// Broadcast (non-spatial) axes with their positions, in field order
    pub fn broadcast_axes(&self) -> impl Iterator<Item = (usize, &Axis)> {
        self.axes
            .iter()
            .enumerate()
            .filter(move |(i, _)| !self.is_spatial(*i))
    }

    pub fn broadcast_shape(&self) -> Vec<usize> {
        self.broadcast_axes().map(|(_, a)| a.len()).collect()
    }

    /// Number of 2-D lat/lon slices in the field
    pub fn n_slices(&self) -> usize {
        self.broadcast_shape().iter().product()
    }

    /// Convert a flat slice number into one index per broadcast axis (row-major).
    pub fn unravel_slice(&self, flat: usize) -> Vec<usize> {
        unravel(flat, &self.broadcast_shape())
    }

    /// View of one lat/lon slice, indexed as `[lat, lon]`.
    ///
    /// `index` holds one position per broadcast axis, in field order.
    pub fn slice_view(&self, index: &[usize]) -> ToolboxResult<ArrayView2<'_, FloatValue>> {
        let positions = self.broadcast_positions(index)?;
        let mut view = self.values.view();
        for (axis, i) in positions.into_iter().rev() {
            view = view.index_axis_move(NdAxis(axis), i);
        }
        let view = view
            .into_dimensionality::<Ix2>()
            .map_err(|e| ToolboxError::ShapeMismatch(e.to_string()))?;
        Ok(if self.lat_axis < self.lon_axis {
            view
        } else {
            view.reversed_axes()
        })
    }

    /// Mutable view of one lat/lon slice, indexed as `[lat, lon]`.
    pub fn slice_view_mut(
        &mut self,
        index: &[usize],
    ) -> ToolboxResult<ArrayViewMut2<'_, FloatValue>> {
        let positions = self.broadcast_positions(index)?;
        let transpose = self.lat_axis > self.lon_axis;
        let mut view = self.values.view_mut();
        for (axis, i) in positions.into_iter().rev() {
            view = view.index_axis_move(NdAxis(axis), i);
        }
        let view = view
            .into_dimensionality::<Ix2>()
            .map_err(|e| ToolboxError::ShapeMismatch(e.to_string()))?;
        Ok(if transpose { view.reversed_axes() } else { view })
    }

    /// Pair each broadcast axis position with the requested index, validating bounds.
    fn broadcast_positions(&self, index: &[usize]) -> ToolboxResult<Vec<(usize, usize)>> {
        let broadcast: Vec<(usize, &Axis)> = self.broadcast_axes().collect();
        if broadcast.len() != index.len() {
            return Err(ToolboxError::ShapeMismatch(format!(
                "expected {} broadcast indices, got {}",
                broadcast.len(),
                index.len()
            )));
        }
        broadcast
            .into_iter()
            .zip(index.iter())
            .map(|((axis, a), &i)| {
                if i < a.len() {
                    Ok((axis, i))
                } else {
                    Err(ToolboxError::ShapeMismatch(format!(
                        "index {} out of bounds for axis '{}' of length {}",
                        i,
                        a.name,
                        a.len()
                    )))
                }
            })
            .collect()
    }

    /// Swap in a reordered axis together with the matching values.
    ///
    /// Used by longitude standardization, which changes both the coordinates and the
    /// order of the values along one axis.
    pub(crate) fn with_reordered_axis(
        mut self,
        axis: usize,
        coords: Vec<FloatValue>,
        order: &[usize],
    ) -> ToolboxResult<Self> {
        self.values = self.values.select(NdAxis(axis), order);
        self.axes[axis].coords = Array1::from_vec(coords);
        self.axes[axis].check_strictly_monotonic()?;
        Ok(self)
    }

    /// Re-target which axes are treated as spatial.
    pub(crate) fn with_spatial_axes(mut self, lat_axis: usize, lon_axis: usize) -> Self {
        self.lat_axis = lat_axis;
        self.lon_axis = lon_axis;
        self
    }
}

/// Row-major unravel of a flat index over `shape`
pub(crate) fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (slot, &len) in index.iter_mut().zip(shape.iter()).rev() {
        if len > 0 {
            *slot = flat % len;
            flat /= len;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lat_lon_time() -> GriddedField {
        // dims: lat(2) x time(3) x lon(2)
        let values: Vec<f64> = (0..12).map(|v| v as f64).collect();
        GriddedField::from_shape_vec(
            vec![
                Axis::new("lat", vec![0.0, 1.0]),
                Axis::positional("time", 3),
                Axis::new("lon", vec![5.0, 6.0]),
            ],
            values,
            "lat",
            "lon",
        )
        .unwrap()
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let res = GriddedField::from_shape_vec(
            vec![Axis::new("lat", vec![0.0, 1.0]), Axis::new("lon", vec![0.0])],
            vec![1.0, 2.0, 3.0],
            "lat",
            "lon",
        );
        assert!(matches!(res, Err(ToolboxError::ShapeMismatch(_))));
    }

    #[test]
    fn non_monotonic_spatial_axis_is_rejected() {
        let res = GriddedField::from_shape_vec(
            vec![
                Axis::new("lat", vec![0.0, 2.0, 1.0]),
                Axis::new("lon", vec![0.0]),
            ],
            vec![1.0, 2.0, 3.0],
            "lat",
            "lon",
        );
        match res {
            Err(ToolboxError::NonMonotonicCoordinate { axis, position }) => {
                assert_eq!(axis, "lat");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn decreasing_coordinates_are_monotonic() {
        let axis = Axis::new("lat", vec![3.0, 2.0, 1.0]);
        assert!(axis.check_strictly_monotonic().is_ok());
    }

    #[test]
    fn slices_skip_broadcast_axes() {
        let field = lat_lon_time();
        assert_eq!(field.broadcast_shape(), vec![3]);
        assert_eq!(field.n_slices(), 3);

        let slice = field.slice_view(&[1]).unwrap();
        assert_eq!(slice.shape(), &[2, 2]);
        // value at (lat=1, time=1, lon=0) = 1*6 + 1*2 + 0
        assert_eq!(slice[[1, 0]], 8.0);
        assert_eq!(slice[[0, 1]], 3.0);
    }

    #[test]
    fn slices_are_lat_lon_ordered_when_lon_comes_first() {
        let field = GriddedField::from_shape_vec(
            vec![
                Axis::new("lon", vec![0.0, 1.0, 2.0]),
                Axis::new("lat", vec![0.0, 1.0]),
            ],
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            "lat",
            "lon",
        )
        .unwrap();
        let slice = field.slice_view(&[]).unwrap();
        assert_eq!(slice.shape(), &[2, 3]);
        assert_eq!(slice[[1, 2]], 5.0);
    }

    #[test]
    fn slice_view_mut_writes_through() {
        let mut field = lat_lon_time();
        field.slice_view_mut(&[2]).unwrap()[[0, 0]] = -1.0;
        assert_eq!(field.values()[[0, 2, 0]], -1.0);
    }

    #[test]
    fn out_of_bounds_slice_is_an_error() {
        let field = lat_lon_time();
        assert!(field.slice_view(&[3]).is_err());
        assert!(field.slice_view(&[]).is_err());
    }

    #[test]
    fn unravel_is_row_major() {
        assert_eq!(unravel(5, &[2, 3]), vec![1, 2]);
        assert_eq!(unravel(0, &[]), Vec::<usize>::new());
    }
}
