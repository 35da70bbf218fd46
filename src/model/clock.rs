//! Simulated time and the adaptive step.

use crate::hydro::{courant_limit, HydroConfig};

/// Simulated time, model step and iteration count.
///
/// `step` is the interval time advances by. It may grow past the Courant
/// bound while the sediment engine allows, but routing always uses the
/// bounded value returned by [`Clock::next_step`].
#[derive(Debug, Clone)]
pub struct Clock {
    /// Simulated time (s).
    pub time: f64,
    /// Model step (s).
    pub step: f64,
    pub iteration: u64,
    /// Deepest wet cell after the last depth update (m).
    pub max_depth: f64,
}

impl Clock {
    pub fn new(initial_step: f64) -> Self {
        Self {
            time: 0.0,
            step: initial_step,
            iteration: 0,
            max_depth: 0.0,
        }
    }

    /// Adjusts the model step for the coming iteration.
    ///
    /// # Arguments
    /// * `imbalance` - |inflow - outflow| of the last iteration (m^3/s)
    ///
    /// # Returns
    /// The routing step, never above the Courant bound.
    pub fn next_step(&mut self, hydro: &HydroConfig, cell_size: f64, imbalance: f64) -> f64 {
        let courant = courant_limit(hydro, cell_size, self.max_depth);
        if self.step < courant {
            self.step = courant;
        }
        if imbalance > hydro.in_out_tolerance && self.step > courant {
            self.step = courant;
        }
        self.step = self.step.min(hydro.max_step);
        self.step.min(courant)
    }

    /// Moves time forward by the model step.
    pub fn advance(&mut self) {
        self.iteration += 1;
        self.time += self.step;
    }
}
