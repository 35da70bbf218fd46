//! Dune sub-model configuration.

use serde::{Deserialize, Serialize};

use crate::grid::Cardinal;

/// Parameters for the aeolian slab model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuneConfig {
    /// Fine cells per coarse cell along each axis.
    pub multiplier: usize,
    /// Simulated hours between dune updates.
    pub interval_hours: f64,
    /// Direction the wind blows towards.
    pub wind: Cardinal,
    /// Thickness of one saltating slab (m).
    pub slab_thickness: f64,
    /// Hop length in fine cells.
    pub hop_length: usize,
    /// Deposition probability on a sandy cell.
    pub deposit_on_sand: f64,
    /// Deposition probability on bare substrate.
    pub deposit_on_bare: f64,
    /// Wind shadow angle in degrees.
    pub shadow_angle: f64,
    /// Angle of repose for loose sand in degrees.
    pub repose_angle: f64,
    /// Sand added to each upwind boundary cell per update (m).
    pub upstream_supply: f64,
    /// Saltation events per fine cell per update.
    pub events_per_cell: f64,
    /// Hops after which a slab is forced down.
    pub max_hops: u32,
    pub max_avalanche_sweeps: u32,
    pub seed: u64,
}

impl Default for DuneConfig {
    fn default() -> Self {
        Self {
            multiplier: 5,
            interval_hours: 1.0,
            wind: Cardinal::East,
            slab_thickness: 0.1,
            hop_length: 1,
            deposit_on_sand: 0.6,
            deposit_on_bare: 0.4,
            shadow_angle: 15.0,
            repose_angle: 30.0,
            upstream_supply: 0.0,
            events_per_cell: 1.0,
            max_hops: 1000,
            max_avalanche_sweeps: 50,
            seed: 0,
        }
    }
}

impl DuneConfig {
    #[inline]
    pub fn interval_seconds(&self) -> f64 {
        self.interval_hours * 3600.0
    }

    /// Largest stable height difference between fine neighbours.
    pub fn repose_drop(&self, fine_cell: f64) -> f64 {
        self.repose_angle.to_radians().tan() * fine_cell
    }

    pub fn shadow_gradient(&self) -> f64 {
        self.shadow_angle.to_radians().tan()
    }
}
