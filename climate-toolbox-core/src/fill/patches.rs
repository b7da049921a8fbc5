//! Connected-component labelling of missing cells

use super::window::BoundingWindow;
use crate::mask::MissingMask;
use std::collections::VecDeque;

/// A maximal 4-connected set of missing cells in one slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// `(row, col)` positions in the order they were discovered
    cells: Vec<(usize, usize)>,
}

impl Patch {
    pub fn cells(&self) -> &[(usize, usize)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Smallest index window containing every cell of the patch
    pub fn bounds(&self) -> BoundingWindow {
        let (r0, c0) = self.cells[0];
        self.cells.iter().fold(
            BoundingWindow {
                lat_min: r0,
                lat_max: r0,
                lon_min: c0,
                lon_max: c0,
            },
            |w, &(r, c)| BoundingWindow {
                lat_min: w.lat_min.min(r),
                lat_max: w.lat_max.max(r),
                lon_min: w.lon_min.min(c),
                lon_max: w.lon_max.max(c),
            },
        )
    }
}

/// Label the missing cells of `mask` into patches.
///
/// Patches are returned in row-major order of their first cell, so labelling the
/// same mask twice yields the same sequence.
pub fn label_patches(mask: &MissingMask) -> Vec<Patch> {
    let (rows, cols) = mask.shape();
    let mut visited = vec![false; rows * cols];
    let mut patches = Vec::new();
    let mut queue = VecDeque::new();

    for r in 0..rows {
        for c in 0..cols {
            if visited[r * cols + c] || !mask.is_missing(r, c) {
                continue;
            }
            visited[r * cols + c] = true;
            queue.push_back((r, c));
            let mut cells = Vec::new();

            while let Some((pr, pc)) = queue.pop_front() {
                cells.push((pr, pc));
                let neighbours = [
                    (pr.wrapping_sub(1), pc),
                    (pr + 1, pc),
                    (pr, pc.wrapping_sub(1)),
                    (pr, pc + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows
                        && nc < cols
                        && !visited[nr * cols + nc]
                        && mask.is_missing(nr, nc)
                    {
                        visited[nr * cols + nc] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }
            patches.push(Patch { cells });
        }
    }
    patches
}
