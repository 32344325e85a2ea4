//! Uniform grid broad phase
//!
//! Each edge is registered in every cell its (margin-grown) bounds overlap,
//! so long edges are never lost to a far-away center. Candidate pairs come
//! from each cell and its 26 neighbours, filtered by a bounds overlap check.

use crate::geometry::{BoundingBox, Point};

/// Target number of edges per grid cell
pub const EDGES_PER_CELL: usize = 8;

/// Upper bound on cells along any axis
pub const MAX_CELLS_PER_AXIS: usize = 32;

/// Uniform spatial grid over edge bounds
#[derive(Debug)]
pub struct UniformGrid {
    dims: [usize; 3],
    origin: Point,
    cell_size: [f64; 3],
    cells: Vec<Vec<usize>>,
}

impl UniformGrid {
    /// Bucket `boxes` (one per edge) into a grid sized for
    /// [`EDGES_PER_CELL`]. `None` for an empty slice.
    pub fn build(boxes: &[BoundingBox]) -> Option<Self> {
        let (first, rest) = boxes.split_first()?;
        let mut bounds = *first;
        for b in rest {
            bounds.merge(b);
        }

        let size = bounds.size();
        let extents = [size.x, size.y, size.z];
        let step = Self::target_cell_size(&extents, boxes.len());

        let mut dims = [1usize; 3];
        let mut cell_size = [1.0f64; 3];
        for axis in 0..3 {
            if extents[axis] > 0.0 {
                dims[axis] = Self::axis_cells(extents[axis], step);
                cell_size[axis] = extents[axis] / dims[axis] as f64;
            }
        }

        let mut grid = Self {
            dims,
            origin: bounds.min,
            cell_size,
            cells: vec![Vec::new(); dims[0] * dims[1] * dims[2]],
        };
        for (index, b) in boxes.iter().enumerate() {
            let lo = grid.cell_of(&b.min);
            let hi = grid.cell_of(&b.max);
            for x in lo[0]..=hi[0] {
                for y in lo[1]..=hi[1] {
                    for z in lo[2]..=hi[2] {
                        let flat = grid.flat([x, y, z]);
                        grid.cells[flat].push(index);
                    }
                }
            }
        }
        Some(grid)
    }

    /// Edge length of a cube cell holding about [`EDGES_PER_CELL`] edges,
    /// over the axes that have any extent
    fn target_cell_size(extents: &[f64; 3], edge_count: usize) -> f64 {
        let active: Vec<f64> = extents.iter().copied().filter(|e| *e > 0.0).collect();
        if active.is_empty() {
            return 0.0;
        }
        let target_cells = (edge_count / EDGES_PER_CELL).max(1) as f64;
        let volume: f64 = active.iter().product();
        (volume / target_cells).powf(1.0 / active.len() as f64)
    }

    fn axis_cells(extent: f64, step: f64) -> usize {
        if step > 0.0 && step.is_finite() {
            ((extent / step) as usize).clamp(1, MAX_CELLS_PER_AXIS)
        } else {
            1
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    fn cell_of(&self, p: &Point) -> [usize; 3] {
        let coords = [
            p.x - self.origin.x,
            p.y - self.origin.y,
            p.z - self.origin.z,
        ];
        let mut cell = [0usize; 3];
        for axis in 0..3 {
            // Negative offsets saturate to 0
            let raw = (coords[axis] / self.cell_size[axis]) as usize;
            cell[axis] = raw.min(self.dims[axis] - 1);
        }
        cell
    }

    #[inline]
    fn flat(&self, [x, y, z]: [usize; 3]) -> usize {
        x * self.dims[1] * self.dims[2] + y * self.dims[2] + z
    }

    /// Unique `(i, j)` pairs with `i < j` whose cells are adjacent and whose
    /// bounds overlap, sorted
    pub fn candidate_pairs(&self, boxes: &[BoundingBox]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();

        for x in 0..self.dims[0] {
            for y in 0..self.dims[1] {
                for z in 0..self.dims[2] {
                    let here = &self.cells[self.flat([x, y, z])];
                    if here.is_empty() {
                        continue;
                    }
                    for neighbour in self.neighbourhood([x, y, z]) {
                        let there = &self.cells[self.flat(neighbour)];
                        for &i in here {
                            for &j in there {
                                if i < j && boxes[i].intersects(&boxes[j]) {
                                    pairs.push((i, j));
                                }
                            }
                        }
                    }
                }
            }
        }

        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// The cell itself and every in-bounds neighbour (up to 27 cells)
    fn neighbourhood(&self, [x, y, z]: [usize; 3]) -> Vec<[usize; 3]> {
        let span = |c: usize, dim: usize| c.saturating_sub(1)..=(c + 1).min(dim - 1);
        let mut out = Vec::with_capacity(27);
        for nx in span(x, self.dims[0]) {
            for ny in span(y, self.dims[1]) {
                for nz in span(z, self.dims[2]) {
                    out.push([nx, ny, nz]);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f64, y: f64) -> BoundingBox {
        BoundingBox {
            min: Point::new(x, y, 0.0),
            max: Point::new(x + 1.0, y + 1.0, 0.0),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(UniformGrid::build(&[]).is_none());
    }

    #[test]
    fn test_dims_are_capped() {
        let boxes: Vec<BoundingBox> = (0..5000)
            .map(|i| unit_box((i % 100) as f64 * 10.0, (i / 100) as f64 * 10.0))
            .collect();
        let grid = UniformGrid::build(&boxes).unwrap();
        let dims = grid.dims();
        assert!(dims.iter().all(|d| (1..=MAX_CELLS_PER_AXIS).contains(d)));
        // Flat in z
        assert_eq!(dims[2], 1);
    }

    #[test]
    fn test_far_apart_boxes_are_not_paired() {
        let mut boxes: Vec<BoundingBox> = (0..40).map(|i| unit_box(i as f64 * 5.0, 0.0)).collect();
        // One overlapping pair
        boxes.push(unit_box(0.5, 0.5));
        let grid = UniformGrid::build(&boxes).unwrap();
        assert_eq!(grid.candidate_pairs(&boxes), vec![(0, 40)]);
    }

    #[test]
    fn test_pairs_are_unique_and_ordered() {
        let boxes: Vec<BoundingBox> = (0..30).map(|i| unit_box(i as f64 * 0.5, 0.0)).collect();
        let grid = UniformGrid::build(&boxes).unwrap();
        let pairs = grid.candidate_pairs(&boxes);

        assert!(pairs.iter().all(|(i, j)| i < j));
        let mut sorted = pairs.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), pairs.len());
        // Neighbours overlap at 0.5 spacing, boxes two apart touch at the edge
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(0, 2)));
        assert!(!pairs.contains(&(0, 3)));
    }
}
