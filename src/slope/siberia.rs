//! SIBERIA stream-power erosion.

use rayon::prelude::*;

use super::config::SiberiaConfig;
use super::diffusion::{apply_transfers, Transfer, DAY_IN_YEARS};
use crate::drainage::accumulate_drainage;
use crate::grid::{is_nodata, World, NEIGHBORS_8};

impl SiberiaConfig {
    /// Discharge proxy `beta3 * A^m3` for a contributing area in m^2.
    pub fn discharge(&self, area: f64) -> f64 {
        self.beta3 * area.max(0.0).powf(self.m3)
    }

    /// Slope at which the flux reaches `critical_flux` for discharge `q`.
    pub fn threshold_slope(&self, q: f64) -> f64 {
        if self.critical_flux <= 0.0 || q <= 0.0 {
            return 0.0;
        }
        (self.critical_flux / (self.beta1 * q.powf(self.m1))).powf(1.0 / self.n1)
    }

    /// Sediment flux (m^3/yr per unit width).
    pub fn flux(&self, q: f64, slope: f64) -> f64 {
        if q <= 0.0 || slope <= 0.0 {
            return 0.0;
        }
        self.beta1 * q.powf(self.m1) * slope.powf(self.n1)
    }
}

/// Moves stream-power flux from each cell to its steepest downslope
/// neighbour. Drainage area is refreshed first.
///
/// # Returns
/// The total thickness moved.
pub fn siberia(world: &mut World, config: &SiberiaConfig) -> f64 {
    accumulate_drainage(world);
    let g = world.geometry;
    let dx = g.cell_size;
    let years = config.interval_days * DAY_IN_YEARS;
    let w = &*world;

    let transfers: Vec<Transfer> = (1..g.rows.saturating_sub(1))
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row = Vec::new();
            for x in 1..g.cols - 1 {
                let i = g.index(x, y);
                let (elev, bedrock) = (w.elev[i], w.bedrock[i]);
                if is_nodata(elev) || (!is_nodata(bedrock) && elev <= bedrock) {
                    continue;
                }
                let steepest = NEIGHBORS_8
                    .iter()
                    .filter_map(|&(ox, oy, diag)| {
                        let j = g.offset(x, y, ox, oy)?;
                        let other = w.elev[j];
                        if is_nodata(other) || other >= elev {
                            return None;
                        }
                        let run = if diag { dx * std::f64::consts::SQRT_2 } else { dx };
                        Some((j, (elev - other) / run, elev - other))
                    })
                    .max_by(|a, b| a.1.total_cmp(&b.1));
                let Some((j, slope, drop)) = steepest else {
                    continue;
                };
                let q = config.discharge(w.area[i] * g.cell_area());
                if slope < config.threshold_slope(q) {
                    continue;
                }
                let mut amount = config.flux(q, slope) * years / dx;
                amount = amount.min(drop * 0.5);
                if !is_nodata(bedrock) {
                    amount = amount.min(elev - bedrock);
                }
                if amount > 0.0 {
                    row.push(Transfer { from: i, to: j, amount });
                }
            }
            row
        })
        .collect();
    apply_transfers(world, &transfers)
}
