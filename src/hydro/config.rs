//! Flow routing configuration.

use serde::{Deserialize, Serialize};

/// Parameters of the explicit shallow-water router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HydroConfig {
    pub gravity: f64,
    /// Manning's n where no roughness raster is given.
    pub manning: f64,
    pub courant: f64,
    /// Flow depths below this carry no discharge (m).
    pub hflow_threshold: f64,
    pub froude_limit: f64,
    /// Water-surface slope imposed on faces next to the grid edge.
    pub edge_slope: f64,
    /// Depth below which a cell is treated as dry for sediment and edge
    /// outflow (m).
    pub depth_threshold: f64,
    /// Starting step (s).
    pub initial_step: f64,
    /// Upper bound on the model step (s).
    pub max_step: f64,
    /// Largest |inflow - outflow| (m^3/s) tolerated before the step is
    /// pulled back to the Courant bound.
    pub in_out_tolerance: f64,
    /// Standing-water evaporation (m/day); zero disables it.
    pub evaporation_rate: f64,
}

impl Default for HydroConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            manning: 0.04,
            courant: 0.7,
            hflow_threshold: 1e-5,
            froude_limit: 0.8,
            edge_slope: 0.001,
            depth_threshold: 0.01,
            initial_step: 1.0,
            max_step: 3600.0,
            in_out_tolerance: 50.0,
            evaporation_rate: 0.0,
        }
    }
}
