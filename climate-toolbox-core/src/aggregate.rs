//! Weighted reduction of point samples to regions
//!
//! Each region's value is the weight-normalised average of its points,
//! `sum(value * weight) / sum(weight)`, computed independently for every position
//! along the broadcast axes. Points whose primary weight is missing or not positive
//! fall back to a backup weight column. A region whose weights sum to zero yields
//! NaN or infinity, which is passed through unchanged.

use crate::errors::{ToolboxError, ToolboxResult};
use crate::field::{Axis, FloatValue};
use crate::parameters::AggregationParameters;
use crate::reindex::PointField;
use crate::weights::{PointWeightTable, RegionId};
use ndarray::{ArrayD, ArrayViewD, Axis as NdAxis, IxDyn};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Replace missing or non-positive primary weights by the backup weight of the same point.
pub fn effective_weights(primary: &[FloatValue], backup: &[FloatValue]) -> Vec<FloatValue> {
    primary
        .iter()
        .zip(backup)
        .map(|(&w, &b)| if w > 0.0 { w } else { b })
        .collect()
}

/// Weighted regional averages.
///
/// `values` has the region axis first, followed by the broadcast axes of the source
/// field. Regions are sorted by id.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionAggregate {
    level: String,
    regions: Vec<RegionId>,
    axes: Vec<Axis>,
    values: ArrayD<FloatValue>,
}

impl RegionAggregate {
    /// Name of the region-id column the points were grouped by
    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn values(&self) -> &ArrayD<FloatValue> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Values of one region across the broadcast axes
    pub fn get(&self, region: &RegionId) -> Option<ArrayViewD<'_, FloatValue>> {
        self.regions
            .binary_search(region)
            .ok()
            .map(|i| self.values.index_axis(NdAxis(0), i))
    }
}

impl Serialize for RegionAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut dims = vec![self.level.as_str()];
        dims.extend(self.axes.iter().map(|a| a.name.as_str()));
        let mut state = serializer.serialize_struct("RegionAggregate", 5)?;
        state.serialize_field("dims", &dims)?;
        state.serialize_field("regions", &self.regions)?;
        state.serialize_field("axes", &self.axes)?;
        state.serialize_field("shape", self.values.shape())?;
        state.serialize_field("values", &self.values.iter().collect::<Vec<_>>())?;
        state.end()
    }
}

/// Groups table points by region and averages them with per-point weights
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRegionalReducer {
    params: AggregationParameters,
}

impl WeightedRegionalReducer {
    pub fn new(params: AggregationParameters) -> Self {
        Self { params }
    }

    /// Weight of every table point after backup substitution
    pub fn weights(&self, table: &PointWeightTable) -> ToolboxResult<Vec<FloatValue>> {
        let primary = table.weights(&self.params.aggwt)?;
        let backup = table.weights(&self.params.backup_aggwt)?;
        let weights = effective_weights(&primary, &backup);

        let substituted = primary.iter().filter(|&&w| w.is_nan() || w <= 0.0).count();
        if substituted > 0 {
            debug!(
                aggwt = %self.params.aggwt,
                backup_aggwt = %self.params.backup_aggwt,
                substituted,
                "Used backup weights"
            );
        }
        Ok(weights)
    }

    /// Point positions of every region, in region order
    pub fn groups(
        &self,
        table: &PointWeightTable,
    ) -> ToolboxResult<BTreeMap<RegionId, Vec<usize>>> {
        let ids = table.region_ids(&self.params.agglev)?;
        let mut groups: BTreeMap<RegionId, Vec<usize>> = BTreeMap::new();
        for (position, id) in ids.into_iter().enumerate() {
            groups.entry(id).or_default().push(position);
        }
        Ok(groups)
    }

    pub fn reduce(
        &self,
        points: &PointField,
        table: &PointWeightTable,
    ) -> ToolboxResult<RegionAggregate> {
        if points.n_points() != table.len() {
            return Err(ToolboxError::ShapeMismatch(format!(
                "{} sampled points but {} table rows",
                points.n_points(),
                table.len()
            )));
        }
        let weights = self.weights(table)?;
        let groups = self.groups(table)?;

        let broadcast_shape = &points.values().shape()[1..];
        let mut shape = vec![groups.len()];
        shape.extend_from_slice(broadcast_shape);
        let mut values = ArrayD::zeros(IxDyn(&shape));

        let mut zero_weight = Vec::new();
        for (slot, (region, members)) in groups.iter().enumerate() {
            let mut numerator = ArrayD::<FloatValue>::zeros(IxDyn(broadcast_shape));
            let mut total = 0.0;
            for &p in members {
                numerator.scaled_add(weights[p], &points.point(p));
                total += weights[p];
            }
            if total == 0.0 {
                zero_weight.push(region.clone());
            }
            values
                .index_axis_mut(NdAxis(0), slot)
                .assign(&(numerator / total));
        }
        if !zero_weight.is_empty() {
            warn!(
                agglev = %self.params.agglev,
                regions = ?zero_weight,
                "Regions with zero total weight have undefined averages"
            );
        }

        Ok(RegionAggregate {
            level: self.params.agglev.clone(),
            regions: groups.into_keys().collect(),
            axes: points.axes().to_vec(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::GriddedField;
    use crate::parameters::PointLookup;
    use crate::reindex::reindex_to_points;
    use is_close::is_close;

    /// One row of lon points with two time steps
    fn points(values: &[f64]) -> (GriddedField, PointWeightTable) {
        let n = values.len();
        let lon: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let mut flat = values.to_vec();
        flat.extend(values.iter().map(|v| v * 2.0));
        let field = GriddedField::from_shape_vec(
            vec![
                Axis::new("time", vec![0.0, 1.0]),
                Axis::new("lat", vec![0.0]),
                Axis::new("lon", lon.clone()),
            ],
            flat,
            "lat",
            "lon",
        )
        .unwrap();
        let table = PointWeightTable::new(lon, vec![0.0; n]).unwrap();
        (field, table)
    }

    fn reduce(
        field: &GriddedField,
        table: &PointWeightTable,
        params: AggregationParameters,
    ) -> RegionAggregate {
        let sampled = reindex_to_points(field, table, PointLookup::Exact).unwrap();
        WeightedRegionalReducer::new(params).reduce(&sampled, table).unwrap()
    }

    #[test]
    fn fallback_replaces_missing_and_non_positive() {
        let w = effective_weights(&[1.0, 0.0, -2.0, f64::NAN], &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(w, vec![1.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn identical_weights_give_the_mean() {
        let (field, table) = points(&[1.0, 2.0, 6.0]);
        let table = table
            .with_regions("hierid", ["R", "R", "R"])
            .unwrap()
            .with_weights("areawt", vec![0.3, 0.3, 0.3])
            .unwrap();
        let out = reduce(&field, &table, AggregationParameters::new("areawt", "hierid"));
        let r = out.get(&"R".into()).unwrap();
        assert!(is_close!(r[[0]], 3.0));
        assert!(is_close!(r[[1]], 6.0));
    }

    #[test]
    fn single_point_region_is_its_value() {
        let (field, table) = points(&[4.0, 9.0]);
        let table = table
            .with_regions("ISO", ["USA", "CAN"])
            .unwrap()
            .with_weights("popwt", vec![123.4, 0.001])
            .unwrap()
            .with_weights("areawt", vec![1.0, 1.0])
            .unwrap();
        let out = reduce(&field, &table, AggregationParameters::new("popwt", "ISO"));
        assert_eq!(out.regions(), &[RegionId::from("CAN"), RegionId::from("USA")]);
        assert!(is_close!(out.get(&"USA".into()).unwrap()[[0]], 4.0));
        assert!(is_close!(out.get(&"CAN".into()).unwrap()[[1]], 18.0));
        assert_eq!(out.level(), "ISO");
    }

    #[test]
    fn backup_weight_is_used_in_both_sums() {
        let (field, table) = points(&[1.0, 5.0]);
        let with_primary = table
            .clone()
            .with_regions("hierid", ["A", "A"])
            .unwrap()
            .with_weights("popwt", vec![1.0, 3.0])
            .unwrap()
            .with_weights("areawt", vec![9.0, 9.0])
            .unwrap();
        let with_backup = table
            .with_regions("hierid", ["A", "A"])
            .unwrap()
            .with_weights("popwt", vec![1.0, f64::NAN])
            .unwrap()
            .with_weights("areawt", vec![9.0, 3.0])
            .unwrap();
        let params = AggregationParameters::new("popwt", "hierid");
        let a = reduce(&field, &with_primary, params.clone());
        let b = reduce(&field, &with_backup, params);
        assert_eq!(a.values(), b.values());
        assert!(is_close!(a.values()[[0, 0]], 4.0));
    }

    #[test]
    fn zero_total_weight_propagates() {
        let (field, table) = points(&[1.0, 2.0, 3.0]);
        let table = table
            .with_regions("hierid", ["A", "B", "B"])
            .unwrap()
            .with_weights("areawt", vec![0.0, 1.0, 1.0])
            .unwrap();
        let out = reduce(&field, &table, AggregationParameters::new("areawt", "hierid"));
        assert!(out.get(&"A".into()).unwrap().iter().all(|v| !v.is_finite()));
        assert!(is_close!(out.get(&"B".into()).unwrap()[[0]], 2.5));
    }

    #[test]
    fn integer_and_text_ids_are_separate_regions() {
        let (field, table) = points(&[1.0, 2.0]);
        let table = table
            .with_column(
                "mixed",
                crate::weights::ColumnValues::Text(vec!["1".to_string(), "1".to_string()]),
            )
            .unwrap()
            .with_regions("fips", [1_i64, 2])
            .unwrap()
            .with_weights("areawt", vec![1.0, 1.0])
            .unwrap();
        let out = reduce(&field, &table, AggregationParameters::new("areawt", "mixed"));
        assert_eq!(out.regions(), &[RegionId::from("1")]);
        let out = reduce(&field, &table, AggregationParameters::new("areawt", "fips"));
        assert_eq!(out.regions(), &[RegionId::Integer(1), RegionId::Integer(2)]);
        assert!(out.get(&RegionId::from("1")).is_none());
    }

    #[test]
    fn row_count_must_match() {
        let (field, table) = points(&[1.0, 2.0]);
        let sampled = reindex_to_points(&field, &table, PointLookup::Exact).unwrap();
        let shorter = PointWeightTable::new(vec![0.0], vec![0.0])
            .unwrap()
            .with_regions("hierid", ["A"])
            .unwrap()
            .with_weights("areawt", vec![1.0])
            .unwrap();
        assert!(matches!(
            WeightedRegionalReducer::new(AggregationParameters::new("areawt", "hierid"))
                .reduce(&sampled, &shorter),
            Err(ToolboxError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn serializes_with_dims() {
        let (field, table) = points(&[1.0]);
        let table = table
            .with_regions("hierid", ["A"])
            .unwrap()
            .with_weights("areawt", vec![1.0])
            .unwrap();
        let out = reduce(&field, &table, AggregationParameters::new("areawt", "hierid"));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["dims"], serde_json::json!(["hierid", "time"]));
        assert_eq!(json["regions"], serde_json::json!(["A"]));
        assert_eq!(json["values"], serde_json::json!([1.0, 2.0]));
    }
}
