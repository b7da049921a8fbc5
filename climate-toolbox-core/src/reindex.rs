//! Resampling of gridded fields onto table points
//!
//! Each row of a [`PointWeightTable`] names a grid cell by its coordinates. The
//! [`PointReindexer`] looks those cells up in a [`GriddedField`] and collapses the
//! latitude and longitude axes into a single leading point axis, keeping every
//! broadcast axis unchanged.

use crate::errors::{ToolboxError, ToolboxResult};
use crate::field::{Axis, FloatValue, GriddedField};
use crate::parameters::PointLookup;
use crate::weights::PointWeightTable;
use ndarray::{ArrayD, ArrayView1, ArrayViewD, Axis as NdAxis, IxDyn};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Field values sampled at table points.
///
/// `values` has the point axis first, followed by the broadcast axes of the source
/// field in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct PointField {
    point_ids: Vec<i64>,
    axes: Vec<Axis>,
    values: ArrayD<FloatValue>,
}

impl PointField {
    pub fn n_points(&self) -> usize {
        self.point_ids.len()
    }

    pub fn point_ids(&self) -> &[i64] {
        &self.point_ids
    }

    /// Broadcast axes following the point axis
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn values(&self) -> &ArrayD<FloatValue> {
        &self.values
    }

    /// Values of one point across the broadcast axes
    pub fn point(&self, position: usize) -> ArrayViewD<'_, FloatValue> {
        self.values.index_axis(NdAxis(0), position)
    }
}

/// Coordinate to index lookup along one spatial axis
enum AxisLookup {
    Exact(HashMap<u64, usize>),
    /// Coordinates sorted ascending, paired with their axis positions
    Nearest(Vec<(FloatValue, usize)>, FloatValue),
}

impl AxisLookup {
    fn new(coords: ArrayView1<'_, FloatValue>, policy: PointLookup) -> Self {
        match policy {
            PointLookup::Tolerance(tolerance) => {
                let mut sorted: Vec<(FloatValue, usize)> =
                    coords.iter().copied().zip(0..).collect();
                sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
                AxisLookup::Nearest(sorted, tolerance.abs())
            }
            PointLookup::Exact | PointLookup::MissingAsNan => AxisLookup::Exact(
                coords
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (coordinate_key(v), i))
                    .collect(),
            ),
        }
    }

    fn find(&self, value: FloatValue) -> Option<usize> {
        match self {
            AxisLookup::Exact(index) => index.get(&coordinate_key(value)).copied(),
            AxisLookup::Nearest(sorted, tolerance) => {
                let split = sorted.partition_point(|(v, _)| *v < value);
                let candidates = [split.checked_sub(1), Some(split)];
                candidates
                    .into_iter()
                    .flatten()
                    .filter_map(|i| sorted.get(i))
                    .map(|&(v, i)| ((v - value).abs(), i))
                    .filter(|(distance, _)| *distance <= *tolerance)
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(_, i)| i)
            }
        }
    }
}

/// Bit pattern used for exact matching; `-0.0` and `0.0` are the same coordinate.
fn coordinate_key(value: FloatValue) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Looks up table points in gridded fields
#[derive(Debug, Clone, Copy, Default)]
pub struct PointReindexer {
    lookup: PointLookup,
}

impl PointReindexer {
    pub fn new(lookup: PointLookup) -> Self {
        Self { lookup }
    }

    /// Grid cell `(lat index, lon index)` of every table row.
    ///
    /// `None` marks a row without a matching cell, which is only returned under
    /// [`PointLookup::MissingAsNan`].
    pub fn locate(
        &self,
        field: &GriddedField,
        table: &PointWeightTable,
    ) -> ToolboxResult<Vec<Option<(usize, usize)>>> {
        let lat_lookup = AxisLookup::new(field.lat().view(), self.lookup);
        let lon_lookup = AxisLookup::new(field.lon().view(), self.lookup);

        let mut misses = 0usize;
        let cells = table
            .lon()
            .iter()
            .zip(table.lat())
            .enumerate()
            .map(|(row, (&lon, &lat))| {
                match (lat_lookup.find(lat), lon_lookup.find(lon)) {
                    (Some(i), Some(j)) => Ok(Some((i, j))),
                    _ if self.lookup == PointLookup::MissingAsNan => {
                        misses += 1;
                        Ok(None)
                    }
                    _ => Err(ToolboxError::PointLookupMiss { row, lon, lat }),
                }
            })
            .collect::<ToolboxResult<Vec<_>>>()?;

        if misses > 0 {
            warn!(
                misses,
                points = table.len(),
                "Table points without a matching grid cell were set to NaN"
            );
        }
        Ok(cells)
    }

    /// Sample `field` at every point of `table`.
    pub fn reindex(
        &self,
        field: &GriddedField,
        table: &PointWeightTable,
    ) -> ToolboxResult<PointField> {
        let cells = self.locate(field, table)?;

        // Bring the spatial axes to the front so each cell is a view over the
        // broadcast axes
        let mut order = vec![field.lat_axis(), field.lon_axis()];
        order.extend(field.broadcast_axes().map(|(i, _)| i));
        let spatial_first = field.values().view().permuted_axes(IxDyn(&order));

        let broadcast_shape = field.broadcast_shape();
        let mut shape = vec![table.len()];
        shape.extend_from_slice(&broadcast_shape);
        let mut values = ArrayD::from_elem(IxDyn(&shape), FloatValue::NAN);

        for (position, cell) in cells.iter().enumerate() {
            if let Some((i, j)) = *cell {
                let source = spatial_first
                    .index_axis(NdAxis(0), i)
                    .index_axis_move(NdAxis(0), j);
                values.index_axis_mut(NdAxis(0), position).assign(&source);
            }
        }

        debug!(
            points = table.len(),
            broadcast = ?broadcast_shape,
            "Reindexed field to table points"
        );
        Ok(PointField {
            point_ids: table.point_ids().to_vec(),
            axes: field.broadcast_axes().map(|(_, a)| a.clone()).collect(),
            values,
        })
    }
}

/// Sample `field` at every point of `table` using the given lookup policy.
pub fn reindex_to_points(
    field: &GriddedField,
    table: &PointWeightTable,
    lookup: PointLookup,
) -> ToolboxResult<PointField> {
    PointReindexer::new(lookup).reindex(field, table)
}
