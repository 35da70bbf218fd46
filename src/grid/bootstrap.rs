//! Logical bootstrap schema: the already-parsed rasters a run starts from.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::geometry::{is_nodata, GridGeometry, NODATA};

/// Errors raised while validating bootstrap data, before a run starts.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Grid has no cells ({0} x {1})")]
    EmptyGrid(usize, usize),
    #[error("Cell size must be positive, got {0}")]
    InvalidCellSize(f64),
    #[error("Field '{field}' has {actual} values, expected {expected}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("No valid cell on the grid edge; water and sediment could never leave")]
    NoValidEdge,
    #[error("Grain record at ({0}, {1}) lies outside the grid")]
    GrainOutOfBounds(usize, usize),
    #[error("Grain record at ({col}, {row}) has {actual} fractions, expected {expected}")]
    GrainFractionMismatch {
        col: usize,
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Explicit composition for one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrainRecord {
    pub col: usize,
    pub row: usize,
    /// Active-layer masses per fraction (m).
    pub active: Vec<f64>,
    /// Strata masses, top first.
    #[serde(default)]
    pub strata: Vec<Vec<f64>>,
}

/// Rasters and tables required to start a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootstrap {
    pub geometry: GridGeometry,
    /// Surface elevation (m); `-9999` marks no-data.
    pub elevation: Vec<f64>,
    /// Erosion floor; defaults to no floor.
    #[serde(default)]
    pub bedrock: Option<Vec<f64>>,
    #[serde(default)]
    pub grain: Vec<GrainRecord>,
    /// Manning's n per cell.
    #[serde(default)]
    pub roughness: Option<Vec<f64>>,
    /// Rainfall zone index per cell.
    #[serde(default)]
    pub zones: Option<Vec<u16>>,
    /// Vegetation cover fraction per cell.
    #[serde(default)]
    pub vegetation: Option<Vec<f64>>,
    /// Initial loose dune sand thickness per cell (m).
    #[serde(default)]
    pub sand: Option<Vec<f64>>,
}

impl Bootstrap {
    /// Bootstrap with only an elevation raster.
    pub fn from_elevation(geometry: GridGeometry, elevation: Vec<f64>) -> Self {
        Self {
            geometry,
            elevation,
            bedrock: None,
            grain: Vec::new(),
            roughness: None,
            zones: None,
            vegetation: None,
            sand: None,
        }
    }

    /// Flat raster at `height`.
    pub fn flat(cols: usize, rows: usize, cell_size: f64, height: f64) -> Self {
        let geometry = GridGeometry::new(cols, rows, cell_size);
        Self::from_elevation(geometry, vec![height; geometry.len()])
    }

    /// Synthetic valley draining west: the floor falls by `gradient` per
    /// metre towards column 0 and the sides rise by `side_slope` per metre
    /// away from the middle row.
    pub fn valley(cols: usize, rows: usize, cell_size: f64, gradient: f64, side_slope: f64) -> Self {
        let geometry = GridGeometry::new(cols, rows, cell_size);
        let mid = rows.saturating_sub(1) as f64 / 2.0;
        let elevation = (0..geometry.len())
            .map(|i| {
                let (x, y) = geometry.coords(i);
                let along = x as f64 * cell_size * gradient;
                let across = (y as f64 - mid).abs() * cell_size * side_slope;
                10.0 + along + across
            })
            .collect();
        Self::from_elevation(geometry, elevation)
    }

    /// Reads a JSON bootstrap document and validates its shape.
    pub fn from_json_file(path: &Path, fractions: usize) -> Result<Self, BootstrapError> {
        let text = std::fs::read_to_string(path)?;
        let bootstrap: Bootstrap = serde_json::from_str(&text)?;
        bootstrap.validate(fractions)?;
        Ok(bootstrap)
    }

    /// Checks array shapes, the grid edge and grain records against
    /// `fractions` grain classes.
    pub fn validate(&self, fractions: usize) -> Result<(), BootstrapError> {
        let g = &self.geometry;
        if g.is_empty() {
            return Err(BootstrapError::EmptyGrid(g.cols, g.rows));
        }
        if !(g.cell_size > 0.0) {
            return Err(BootstrapError::InvalidCellSize(g.cell_size));
        }

        let expected = g.len();
        let check = |field: &'static str, actual: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(BootstrapError::ShapeMismatch { field, expected, actual })
            }
        };
        check("elevation", self.elevation.len())?;
        if let Some(v) = &self.bedrock {
            check("bedrock", v.len())?;
        }
        if let Some(v) = &self.roughness {
            check("roughness", v.len())?;
        }
        if let Some(v) = &self.zones {
            check("zones", v.len())?;
        }
        if let Some(v) = &self.vegetation {
            check("vegetation", v.len())?;
        }
        if let Some(v) = &self.sand {
            check("sand", v.len())?;
        }

        if !g.edge_cells().any(|i| !is_nodata(self.elevation[i])) {
            return Err(BootstrapError::NoValidEdge);
        }

        for record in &self.grain {
            if record.col >= g.cols || record.row >= g.rows {
                return Err(BootstrapError::GrainOutOfBounds(record.col, record.row));
            }
            let bad = std::iter::once(&record.active)
                .chain(record.strata.iter())
                .find(|m| m.len() != fractions);
            if let Some(m) = bad {
                return Err(BootstrapError::GrainFractionMismatch {
                    col: record.col,
                    row: record.row,
                    expected: fractions,
                    actual: m.len(),
                });
            }
        }

        if let Some(bedrock) = &self.bedrock {
            let above = self
                .elevation
                .iter()
                .zip(bedrock)
                .filter(|(e, b)| !is_nodata(**e) && **b > **e)
                .count();
            if above > 0 {
                warn!(cells = above, "bedrock above surface; surface will be raised to bedrock");
            }
        }
        Ok(())
    }

    /// Bedrock raster, or a floor far below every surface.
    pub fn bedrock_or_default(&self) -> Vec<f64> {
        match &self.bedrock {
            Some(b) => b.clone(),
            None => vec![NODATA; self.geometry.len()],
        }
    }
}
