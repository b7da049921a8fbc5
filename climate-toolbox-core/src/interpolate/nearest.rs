use super::{Location, ScatteredInterpolator};
use crate::field::FloatValue;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A known sample in the search tree
#[derive(Debug, Clone, Copy)]
struct Sample {
    location: Location,
    index: usize,
}

impl RTreeObject for Sample {
    type Envelope = AABB<Location>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.location)
    }
}

impl PointDistance for Sample {
    fn distance_2(&self, point: &Location) -> FloatValue {
        let dx = self.location[0] - point[0];
        let dy = self.location[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Value of the closest known sample (Euclidean distance in coordinate space).
///
/// Ties resolve to the sample that appears first.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbour;

impl ScatteredInterpolator for NearestNeighbour {
    fn min_known_points(&self) -> usize {
        1
    }

    fn interpolate(
        &self,
        known: &[Location],
        values: &[FloatValue],
        targets: &[Location],
    ) -> Vec<FloatValue> {
        let tree = RTree::bulk_load(
            known
                .iter()
                .enumerate()
                .map(|(index, &location)| Sample { location, index })
                .collect(),
        );
        targets
            .iter()
            .map(|t| {
                let mut candidates = tree.nearest_neighbor_iter_with_distance_2(t);
                match candidates.next() {
                    Some((first, best_d2)) => {
                        let index = candidates
                            .take_while(|(_, d2)| *d2 == best_d2)
                            .fold(first.index, |acc, (s, _)| acc.min(s.index));
                        values[index]
                    }
                    None => FloatValue::NAN,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_closest_sample() {
        let known = [[0.0, 0.0], [10.0, 10.0]];
        let values = [1.0, 2.0];
        let out = NearestNeighbour.interpolate(&known, &values, &[[1.0, 2.0], [9.0, 6.0]]);
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn ties_resolve_to_first_sample() {
        let known = [[0.0, 0.0], [2.0, 0.0]];
        let values = [1.0, 2.0];
        let out = NearestNeighbour.interpolate(&known, &values, &[[1.0, 0.0]]);
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn equidistant_samples_resolve_by_order_not_position() {
        let known = [[1.0, 1.0], [-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0]];
        let values = [10.0, 20.0, 30.0, 40.0];
        let out = NearestNeighbour.interpolate(&known, &values, &[[0.0, 0.0], [0.0, 1.0]]);
        assert_eq!(out, vec![10.0, 10.0]);
    }

    #[test]
    fn matches_exhaustive_search_on_a_grid() {
        let known: Vec<Location> = (0..12)
            .flat_map(|r| (0..9).map(move |c| [r as f64 * 0.7, c as f64 * 1.3]))
            .collect();
        let values: Vec<f64> = (0..known.len()).map(|i| i as f64).collect();
        let targets: Vec<Location> = (0..40)
            .map(|i| [(i as f64 * 0.37) % 8.0, (i as f64 * 0.91) % 11.0])
            .collect();
        let out = NearestNeighbour.interpolate(&known, &values, &targets);
        for (t, v) in targets.iter().zip(out.iter()) {
            let d2 = |k: &Location| (k[0] - t[0]).powi(2) + (k[1] - t[1]).powi(2);
            let best = known.iter().map(d2).fold(f64::INFINITY, f64::min);
            assert_eq!(d2(&known[*v as usize]), best);
        }
    }

    #[test]
    fn no_samples_gives_nan() {
        let out = NearestNeighbour.interpolate(&[], &[], &[[0.0, 0.0]]);
        assert!(out[0].is_nan());
    }
}
