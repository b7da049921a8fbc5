//! Growth of the index window around a missing patch

use crate::field::FloatValue;
use crate::mask::MissingMask;
use ndarray::ArrayView1;

/// Inclusive index bounds of a rectangular sub-grid, as `[lat_min..=lat_max, lon_min..=lon_max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingWindow {
    pub lat_min: usize,
    pub lat_max: usize,
    pub lon_min: usize,
    pub lon_max: usize,
}

impl BoundingWindow {
    /// Expand each edge outwards until it is free of missing cells or reaches the grid edge.
    ///
    /// Edges are grown one at a time in the order lat-min, lat-max, lon-min, lon-max,
    /// each checked against the current extent of the other axis. The result is the
    /// smallest (possibly asymmetric) window whose unclamped edges are fully valid.
    pub fn grow(self, mask: &MissingMask) -> Self {
        let (rows, cols) = mask.shape();
        let mut w = self;

        while w.lat_min > 0 && mask.row_has_missing(w.lat_min, w.lon_min, w.lon_max) {
            w.lat_min -= 1;
        }
        while w.lat_max + 1 < rows && mask.row_has_missing(w.lat_max, w.lon_min, w.lon_max) {
            w.lat_max += 1;
        }
        while w.lon_min > 0 && mask.col_has_missing(w.lon_min, w.lat_min, w.lat_max) {
            w.lon_min -= 1;
        }
        while w.lon_max + 1 < cols && mask.col_has_missing(w.lon_max, w.lat_min, w.lat_max) {
            w.lon_max += 1;
        }
        w
    }

    /// Physical coordinate extent of the window.
    pub fn coordinate_range(
        &self,
        lat: ArrayView1<'_, FloatValue>,
        lon: ArrayView1<'_, FloatValue>,
    ) -> CoordinateRange {
        CoordinateRange {
            lat: ordered(lat[self.lat_min], lat[self.lat_max]),
            lon: ordered(lon[self.lon_min], lon[self.lon_max]),
        }
    }

    pub fn n_cells(&self) -> usize {
        (self.lat_max - self.lat_min + 1) * (self.lon_max - self.lon_min + 1)
    }
}

fn ordered(a: FloatValue, b: FloatValue) -> (FloatValue, FloatValue) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Closed latitude and longitude intervals in coordinate units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateRange {
    pub lat: (FloatValue, FloatValue),
    pub lon: (FloatValue, FloatValue),
}

impl CoordinateRange {
    /// Indices along each axis whose coordinate falls inside the range.
    ///
    /// Selection is by value, not position, so it is authoritative even where the
    /// index window and the coordinate window disagree.
    pub fn select(
        &self,
        lat: ArrayView1<'_, FloatValue>,
        lon: ArrayView1<'_, FloatValue>,
    ) -> (Vec<usize>, Vec<usize>) {
        let within = |coords: ArrayView1<'_, FloatValue>, (lo, hi): (FloatValue, FloatValue)| {
            coords
                .iter()
                .enumerate()
                .filter(|(_, &v)| v >= lo && v <= hi)
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        };
        (within(lat, self.lat), within(lon, self.lon))
    }
}
