//! Piecewise-linear interpolation on a Delaunay triangulation.
//!
//! The triangulation is built incrementally (Bowyer-Watson) inside a large enclosing
//! triangle whose vertices are discarded once every sample has been inserted. Finished
//! triangles are indexed by their bounding boxes in an R-tree for point location.

use super::{Location, ScatteredInterpolator};
use crate::field::FloatValue;
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};
use std::collections::HashSet;

/// Barycentric tolerance for targets lying on a triangle edge
const EDGE_TOLERANCE: FloatValue = 1e-9;
/// Relative tolerance under which a point counts as on (not inside) a circumcircle
const CIRCLE_TOLERANCE: FloatValue = 1e-12;
/// Size of the enclosing triangle relative to the sample extent
const SUPER_TRIANGLE_SCALE: FloatValue = 50.0;

#[derive(Debug, Clone, Copy)]
struct Triangle {
    vertices: [usize; 3],
    centre: Location,
    radius2: FloatValue,
}

impl Triangle {
    /// Build a triangle with its circumcircle; `None` when the vertices are collinear.
    fn new(points: &[Location], vertices: [usize; 3]) -> Option<Self> {
        let [a, b, c] = vertices.map(|v| points[v]);
        let d = 2.0 * (a[0] * (b[1] - c[1]) + b[0] * (c[1] - a[1]) + c[0] * (a[1] - b[1]));
        if d.abs() <= FloatValue::EPSILON * scale(&[a, b, c]) {
            return None;
        }
        let a2 = a[0] * a[0] + a[1] * a[1];
        let b2 = b[0] * b[0] + b[1] * b[1];
        let c2 = c[0] * c[0] + c[1] * c[1];
        let ux = (a2 * (b[1] - c[1]) + b2 * (c[1] - a[1]) + c2 * (a[1] - b[1])) / d;
        let uy = (a2 * (c[0] - b[0]) + b2 * (a[0] - c[0]) + c2 * (b[0] - a[0])) / d;
        let radius2 = (a[0] - ux).powi(2) + (a[1] - uy).powi(2);
        Some(Self {
            vertices,
            centre: [ux, uy],
            radius2,
        })
    }

    fn circumcircle_contains(&self, p: Location) -> bool {
        let d2 = (p[0] - self.centre[0]).powi(2) + (p[1] - self.centre[1]).powi(2);
        d2 < self.radius2 * (1.0 - CIRCLE_TOLERANCE)
    }

    fn edges(&self) -> [[usize; 2]; 3] {
        let [a, b, c] = self.vertices;
        [[a, b], [b, c], [c, a]]
    }
}

fn scale(points: &[Location]) -> FloatValue {
    points
        .iter()
        .flat_map(|p| p.iter())
        .fold(1.0, |acc: FloatValue, v| acc.max(v.abs()))
        .powi(2)
}

fn same_edge(a: &[usize; 2], b: &[usize; 2]) -> bool {
    (a[0] == b[0] && a[1] == b[1]) || (a[0] == b[1] && a[1] == b[0])
}

/// Bounding box of one finished triangle, padded by the edge tolerance
#[derive(Debug, Clone)]
struct TriangleEnvelope {
    triangle: usize,
    aabb: AABB<Location>,
}

impl TriangleEnvelope {
    fn new(triangle: usize, corners: [Location; 3]) -> Self {
        let aabb = AABB::from_points(corners.iter());
        let (lower, upper) = (aabb.lower(), aabb.upper());
        Self {
            triangle,
            aabb: AABB::from_corners(
                [lower[0] - EDGE_TOLERANCE, lower[1] - EDGE_TOLERANCE],
                [upper[0] + EDGE_TOLERANCE, upper[1] + EDGE_TOLERANCE],
            ),
        }
    }
}

impl RTreeObject for TriangleEnvelope {
    type Envelope = AABB<Location>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

impl PointDistance for TriangleEnvelope {
    fn distance_2(&self, point: &Location) -> FloatValue {
        self.aabb.distance_2(point)
    }

    fn contains_point(&self, point: &Location) -> bool {
        self.aabb.contains_point(point)
    }
}

/// Delaunay triangulation of a set of 2-D samples.
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<Location>,
    triangles: Vec<[usize; 3]>,
    index: RTree<TriangleEnvelope>,
}

impl Triangulation {
    /// Triangulate `points`.
    ///
    /// Duplicate points are inserted once. Fewer than three distinct, non-collinear
    /// points produce an empty triangulation.
    pub fn new(points: &[Location]) -> Self {
        let n = points.len();
        let empty = Self {
            points: points.to_vec(),
            triangles: Vec::new(),
            index: RTree::new(),
        };
        if n < 3 {
            return empty;
        }

        let (mut min, mut max) = ([FloatValue::INFINITY; 2], [FloatValue::NEG_INFINITY; 2]);
        for p in points {
            for k in 0..2 {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        let span = (max[0] - min[0]).max(max[1] - min[1]);
        if !(span > 0.0) || !span.is_finite() {
            return empty;
        }
        let mid = [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0];
        let s = SUPER_TRIANGLE_SCALE * span;

        let mut all = points.to_vec();
        all.push([mid[0] - s, mid[1] - s]);
        all.push([mid[0], mid[1] + s]);
        all.push([mid[0] + s, mid[1] - s]);

        let mut triangles = match Triangle::new(&all, [n, n + 1, n + 2]) {
            Some(t) => vec![t],
            None => return empty,
        };

        let mut seen = HashSet::with_capacity(n);
        for (index, &p) in points.iter().enumerate() {
            if !seen.insert((p[0].to_bits(), p[1].to_bits())) {
                continue;
            }

            let (bad, good): (Vec<Triangle>, Vec<Triangle>) = triangles
                .into_iter()
                .partition(|t| t.circumcircle_contains(p));

            // Edges of the cavity boundary appear exactly once among the bad triangles
            let mut boundary: Vec<[usize; 2]> = Vec::new();
            for edge in bad.iter().flat_map(|t| t.edges()) {
                match boundary.iter().position(|e| same_edge(e, &edge)) {
                    Some(pos) => {
                        boundary.swap_remove(pos);
                    }
                    None => boundary.push(edge),
                }
            }

            triangles = good;
            triangles.extend(
                boundary
                    .into_iter()
                    .filter_map(|[a, b]| Triangle::new(&all, [a, b, index])),
            );
        }

        let triangles: Vec<[usize; 3]> = triangles
            .into_iter()
            .map(|t| t.vertices)
            .filter(|v| v.iter().all(|&i| i < n))
            .collect();
        let index = RTree::bulk_load(
            triangles
                .iter()
                .enumerate()
                .map(|(i, v)| TriangleEnvelope::new(i, v.map(|k| points[k])))
                .collect(),
        );

        Self {
            points: points.to_vec(),
            triangles,
            index,
        }
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Find a triangle containing `target` and its barycentric weights.
    ///
    /// On a shared edge the triangle built first wins.
    pub fn locate(&self, target: Location) -> Option<([usize; 3], [FloatValue; 3])> {
        self.index
            .locate_all_at_point(&target)
            .filter_map(|envelope| {
                let vertices = self.triangles[envelope.triangle];
                self.barycentric(vertices, target)
                    .map(|weights| (envelope.triangle, vertices, weights))
            })
            .min_by_key(|(triangle, _, _)| *triangle)
            .map(|(_, vertices, weights)| (vertices, weights))
    }

    fn barycentric(&self, vertices: [usize; 3], target: Location) -> Option<[FloatValue; 3]> {
        let [a, b, c] = vertices.map(|v| self.points[v]);
        let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
        if det == 0.0 {
            return None;
        }
        let l1 = ((b[1] - c[1]) * (target[0] - c[0]) + (c[0] - b[0]) * (target[1] - c[1])) / det;
        let l2 = ((c[1] - a[1]) * (target[0] - c[0]) + (a[0] - c[0]) * (target[1] - c[1])) / det;
        let l3 = 1.0 - l1 - l2;
        if l1 >= -EDGE_TOLERANCE && l2 >= -EDGE_TOLERANCE && l3 >= -EDGE_TOLERANCE {
            Some([l1, l2, l3])
        } else {
            None
        }
    }
}

/// Linear interpolation inside the convex hull of the known samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTriangulation;

impl ScatteredInterpolator for LinearTriangulation {
    fn min_known_points(&self) -> usize {
        3
    }

    fn interpolate(
        &self,
        known: &[Location],
        values: &[FloatValue],
        targets: &[Location],
    ) -> Vec<FloatValue> {
        let triangulation = Triangulation::new(known);
        targets
            .iter()
            .map(|&t| match triangulation.locate(t) {
                Some((vertices, weights)) => vertices
                    .iter()
                    .zip(weights.iter())
                    .map(|(&v, w)| values[v] * w)
                    .sum(),
                None => FloatValue::NAN,
            })
            .collect()
    }
}
