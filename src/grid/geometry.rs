//! Raster geometry and neighbour addressing.
//!
//! Cells are stored row-major: `index = row * cols + col`. Column `x` grows
//! east, row `y` grows south.

use serde::{Deserialize, Serialize};

/// Sentinel marking cells excluded from every computation.
pub const NODATA: f64 = -9999.0;

/// Returns true when `value` carries the no-data sentinel.
#[inline]
pub fn is_nodata(value: f64) -> bool {
    value <= NODATA
}

/// Cardinal directions in the order used by sediment outboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinal {
    North,
    East,
    South,
    West,
}

impl Cardinal {
    pub const ALL: [Cardinal; 4] = [Cardinal::North, Cardinal::East, Cardinal::South, Cardinal::West];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn offset(self) -> (i64, i64) {
        match self {
            Cardinal::North => (0, -1),
            Cardinal::East => (1, 0),
            Cardinal::South => (0, 1),
            Cardinal::West => (-1, 0),
        }
    }

    #[inline]
    pub fn opposite(self) -> Cardinal {
        match self {
            Cardinal::North => Cardinal::South,
            Cardinal::East => Cardinal::West,
            Cardinal::South => Cardinal::North,
            Cardinal::West => Cardinal::East,
        }
    }
}

/// 8-neighbour offsets with a flag for diagonal moves.
pub const NEIGHBORS_8: [(i64, i64, bool); 8] = [
    (0, -1, false),
    (1, -1, true),
    (1, 0, false),
    (1, 1, true),
    (0, 1, false),
    (-1, 1, true),
    (-1, 0, false),
    (-1, -1, true),
];

/// Fixed raster geometry for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub cols: usize,
    pub rows: usize,
    /// Cell edge length in metres.
    pub cell_size: f64,
    #[serde(default)]
    pub x_origin: f64,
    #[serde(default)]
    pub y_origin: f64,
}

impl GridGeometry {
    pub fn new(cols: usize, rows: usize, cell_size: f64) -> Self {
        Self {
            cols,
            rows,
            cell_size,
            x_origin: 0.0,
            y_origin: 0.0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.cols + x
    }

    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.cols, index / self.cols)
    }

    /// Index of the cell at `(x + dx, y + dy)`, or `None` outside the grid.
    #[inline]
    pub fn offset(&self, x: usize, y: usize, dx: i64, dy: i64) -> Option<usize> {
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        if nx < 0 || ny < 0 || nx >= self.cols as i64 || ny >= self.rows as i64 {
            None
        } else {
            Some(ny as usize * self.cols + nx as usize)
        }
    }

    #[inline]
    pub fn neighbor(&self, x: usize, y: usize, dir: Cardinal) -> Option<usize> {
        let (dx, dy) = dir.offset();
        self.offset(x, y, dx, dy)
    }

    /// True for cells on the outermost ring of the raster.
    #[inline]
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x + 1 == self.cols || y + 1 == self.rows
    }

    #[inline]
    pub fn is_interior(&self, x: usize, y: usize) -> bool {
        x < self.cols && y < self.rows && !self.is_edge(x, y)
    }

    #[inline]
    pub fn cell_area(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    /// Iterator over the indices of every edge cell, each visited once.
    pub fn edge_cells(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(move |&i| {
            let (x, y) = self.coords(i);
            self.is_edge(x, y)
        })
    }
}
