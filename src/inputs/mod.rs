//! Boundary and input injection: catchment hydrology, reach point sources
//! and tidal stage.

pub mod catchment;
pub mod config;
pub mod reach;
pub mod series;
pub mod tidal;

pub use catchment::{reservoir_step, CatchmentHydrology};
pub use config::{CatchmentConfig, InputConfig, ReachConfig, RunoffLayout, TidalConfig};
pub use reach::ReachInput;
pub use series::{PointSource, SeriesError, StepTable};
pub use tidal::TidalInput;

/// Volumes injected during one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTally {
    /// Water volume (m^3).
    pub water: f64,
    /// Sediment volume per fraction (m^3).
    pub sediment: Vec<f64>,
}

impl InputTally {
    pub fn new(fractions: usize) -> Self {
        Self {
            water: 0.0,
            sediment: vec![0.0; fractions],
        }
    }

    /// Adds `other` into `self`, widening the sediment vector if needed.
    pub fn absorb(&mut self, other: &InputTally) {
        self.water += other.water;
        if self.sediment.len() < other.sediment.len() {
            self.sediment.resize(other.sediment.len(), 0.0);
        }
        for (a, b) in self.sediment.iter_mut().zip(&other.sediment) {
            *a += b;
        }
    }
}
