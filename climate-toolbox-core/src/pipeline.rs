//! End-to-end operations combining the individual steps

use crate::aggregate::{RegionAggregate, WeightedRegionalReducer};
use crate::errors::ToolboxResult;
use crate::field::GriddedField;
use crate::fill::{fill_holes, FillReport};
use crate::longitude::standardize_longitude;
use crate::parameters::{AggregationParameters, FillParameters};
use crate::reindex::PointReindexer;
use crate::weights::PointWeightTable;

/// Prepare a freshly loaded field for aggregation.
///
/// Missing cells are filled first, then the longitude axis (found among
/// `lon_names`) is wrapped into -180..180 and sorted.
pub fn prepare_field(
    mut field: GriddedField,
    params: &FillParameters,
    lon_names: &[&str],
) -> ToolboxResult<(GriddedField, FillReport)> {
    let report = fill_holes(&mut field, params)?;
    let field = standardize_longitude(field, lon_names)?;
    Ok((field, report))
}

/// Reduce a gridded field to weighted regional averages.
///
/// The field is sampled at every point of `table`, and the samples are grouped by
/// the `params.agglev` column and averaged with the `params.aggwt` weights.
pub fn weighted_aggregate_grid_to_regions(
    field: &GriddedField,
    table: &PointWeightTable,
    params: &AggregationParameters,
) -> ToolboxResult<RegionAggregate> {
    let points = PointReindexer::new(params.lookup).reindex(field, table)?;
    WeightedRegionalReducer::new(params.clone()).reduce(&points, table)
}
