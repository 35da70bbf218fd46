//! Channel-curvature configuration.

use serde::{Deserialize, Serialize};

/// Parameters of the bank curvature estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LateralConfig {
    /// Shear stress (Pa) above which a cell counts as channel.
    pub channel_shear: f64,
    /// Plain smoothing passes over the bank values.
    pub smoothing_passes: u32,
    /// Extra passes that only average neighbours with a higher mean
    /// water surface, shifting curvature downstream.
    pub downstream_shift: u32,
    /// Cross-channel averaging stops once the largest change is below this.
    pub cross_channel_tolerance: f64,
    /// Upper bound on cross-channel averaging sweeps.
    pub max_cross_channel_sweeps: u32,
}

impl Default for LateralConfig {
    fn default() -> Self {
        Self {
            channel_shear: 0.1,
            smoothing_passes: 100,
            downstream_shift: 5,
            cross_channel_tolerance: 1e-4,
            max_cross_channel_sweeps: 10_000,
        }
    }
}
