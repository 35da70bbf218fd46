//! Active-extent index: which cells are wet or next to a wet cell.
//!
//! This is a cache over `water_depth`. Routing only touches faces whose two
//! cells are both marked, so a stale index slows the wetting front but
//! never loses water.

use rayon::prelude::*;

use super::geometry::{GridGeometry, NEIGHBORS_8};

#[derive(Debug, Clone, Default)]
pub struct ActiveExtent {
    /// Active columns per row, ascending.
    rows: Vec<Vec<usize>>,
    /// Same information as a dense mask.
    mask: Vec<bool>,
}

impl ActiveExtent {
    pub fn new(geometry: &GridGeometry) -> Self {
        Self {
            rows: vec![Vec::new(); geometry.rows],
            mask: vec![false; geometry.len()],
        }
    }

    /// Rebuilds the index from the current depths, one rayon task per row.
    pub fn rebuild(&mut self, geometry: &GridGeometry, depth: &[f64]) {
        let cols = geometry.cols;
        let wet = |i: usize| depth[i] > 0.0;

        self.rows
            .par_iter_mut()
            .zip(self.mask.par_chunks_mut(cols))
            .enumerate()
            .for_each(|(y, (list, mask_row))| {
                list.clear();
                for x in 0..cols {
                    let i = geometry.index(x, y);
                    let active = wet(i)
                        || NEIGHBORS_8
                            .iter()
                            .any(|&(dx, dy, _)| geometry.offset(x, y, dx, dy).is_some_and(|n| wet(n)));
                    mask_row[x] = active;
                    if active {
                        list.push(x);
                    }
                }
            });
    }

    /// Active columns in row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[usize] {
        &self.rows[y]
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.mask[index]
    }

    pub fn count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Iterator over every active cell index in row-major order.
    pub fn cells<'a>(&'a self, geometry: &'a GridGeometry) -> impl Iterator<Item = usize> + 'a {
        self.rows
            .iter()
            .enumerate()
            .flat_map(move |(y, cols)| cols.iter().map(move |&x| geometry.index(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_marks_wet_cell_and_ring() {
        let g = GridGeometry::new(5, 5, 1.0);
        let mut depth = vec![0.0; g.len()];
        depth[g.index(2, 2)] = 0.1;
        let mut extent = ActiveExtent::new(&g);
        extent.rebuild(&g, &depth);
        assert_eq!(extent.count(), 9);
        assert!(extent.contains(g.index(1, 1)));
        assert!(!extent.contains(g.index(0, 0)));
        assert_eq!(extent.row(2), &[1, 2, 3]);
    }

    #[test]
    fn test_rebuild_clears_dried_cells() {
        let g = GridGeometry::new(4, 4, 1.0);
        let mut depth = vec![0.0; g.len()];
        depth[0] = 1.0;
        let mut extent = ActiveExtent::new(&g);
        extent.rebuild(&g, &depth);
        assert_eq!(extent.count(), 4);
        depth[0] = 0.0;
        extent.rebuild(&g, &depth);
        assert_eq!(extent.count(), 0);
        assert_eq!(extent.cells(&g).count(), 0);
    }
}
