//! Longitude standardization
//!
//! Rescales longitudes given on a 0..360 convention into -180..180 and sorts the
//! axis, reordering the values to match. Fill and point lookup compare coordinate
//! values directly, so fields and weight tables must share this convention.

use crate::errors::{ToolboxError, ToolboxResult};
use crate::field::{FloatValue, GriddedField};
use tracing::debug;

/// Axis names recognised as longitude when none is specified
pub const DEFAULT_LON_NAMES: [&str; 2] = ["lon", "longitude"];

/// Wrap a single longitude into the -180..180 convention.
///
/// Values above 180 are shifted by -360; everything else is returned unchanged.
#[inline]
pub fn wrap_longitude(lon: FloatValue) -> FloatValue {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Wrap and sort longitude coordinates.
///
/// Returns the sorted coordinates and, for each output position, the input position
/// it came from.
pub fn standardize_coordinates(lon: &[FloatValue]) -> (Vec<FloatValue>, Vec<usize>) {
    let wrapped: Vec<FloatValue> = lon.iter().map(|&v| wrap_longitude(v)).collect();
    let mut order: Vec<usize> = (0..wrapped.len()).collect();
    order.sort_by(|&a, &b| wrapped[a].total_cmp(&wrapped[b]));
    let sorted = order.iter().map(|&i| wrapped[i]).collect();
    (sorted, order)
}

/// Find the single axis of `field` whose name is one of `lon_names`.
pub fn find_longitude_axis(field: &GriddedField, lon_names: &[&str]) -> ToolboxResult<usize> {
    let found: Vec<usize> = field
        .axes()
        .iter()
        .enumerate()
        .filter(|(_, a)| lon_names.contains(&a.name.as_str()))
        .map(|(i, _)| i)
        .collect();
    match found.as_slice() {
        [axis] => Ok(*axis),
        _ => Err(ToolboxError::AmbiguousSpatialAxis {
            candidates: lon_names.iter().map(|s| s.to_string()).collect(),
            found: found
                .iter()
                .map(|&i| field.axes()[i].name.clone())
                .collect(),
        }),
    }
}

/// Rescale the longitude axis of `field` into -180..180 and sort it ascending.
///
/// Exactly one axis name of the field must appear in `lon_names`. The axis keeps its
/// name and becomes the field's longitude axis; values are reordered along it.
pub fn standardize_longitude(
    field: GriddedField,
    lon_names: &[&str],
) -> ToolboxResult<GriddedField> {
    let axis = find_longitude_axis(&field, lon_names)?;
    let coords = field.axes()[axis].coords.to_vec();
    let (sorted, order) = standardize_coordinates(&coords);

    let lat_axis = field.lat_axis();
    if axis == lat_axis {
        return Err(ToolboxError::AmbiguousSpatialAxis {
            candidates: lon_names.iter().map(|s| s.to_string()).collect(),
            found: vec![field.axes()[axis].name.clone()],
        });
    }
    let shifted = coords.iter().filter(|&&v| v > 180.0).count();
    debug!(
        axis = %field.axes()[axis].name,
        shifted,
        "Standardized longitude axis"
    );
    field
        .with_spatial_axes(lat_axis, axis)
        .with_reordered_axis(axis, sorted, &order)
}
