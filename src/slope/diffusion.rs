//! Downslope diffusion: soil creep and area-scaled soil erosion.
//!
//! Transfers are computed from the elevations at the start of the call,
//! one rayon task per row, then applied in a single sequential pass so
//! composition moves with the material.

use rayon::prelude::*;

use super::config::{CreepConfig, SoilErosionConfig};
use crate::drainage::accumulate_drainage;
use crate::grid::{is_nodata, World, NEIGHBORS_8};

/// Years per day.
pub const DAY_IN_YEARS: f64 = 1.0 / 365.0;

/// A single cell-to-cell move of `amount` metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub from: usize,
    pub to: usize,
    pub amount: f64,
}

/// Downslope transfers for every interior cell above bedrock. Each
/// neighbour lower than the cell receives `drop / dist * k(i) / dist`;
/// a cell's total loss never cuts below its bedrock.
pub fn downslope_transfers<F>(world: &World, k: F) -> Vec<Transfer>
where
    F: Fn(usize) -> f64 + Sync,
{
    let g = world.geometry;
    let dx = g.cell_size;
    let diagonal = dx * std::f64::consts::SQRT_2;
    (1..g.rows.saturating_sub(1))
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row = Vec::new();
            for x in 1..g.cols - 1 {
                let i = g.index(x, y);
                let (elev, bedrock) = (world.elev[i], world.bedrock[i]);
                if is_nodata(elev) || (!is_nodata(bedrock) && elev <= bedrock) {
                    continue;
                }
                let coeff = k(i);
                if coeff <= 0.0 {
                    continue;
                }
                let start = row.len();
                let mut total = 0.0;
                for &(ox, oy, diag) in &NEIGHBORS_8 {
                    let Some(j) = g.offset(x, y, ox, oy) else {
                        continue;
                    };
                    let other = world.elev[j];
                    if is_nodata(other) || other >= elev {
                        continue;
                    }
                    let dist = if diag { diagonal } else { dx };
                    let mut amount = (elev - other) / dist * coeff / dist;
                    if !is_nodata(bedrock) {
                        amount = amount.min(elev - bedrock);
                    }
                    if amount > 0.0 {
                        total += amount;
                        row.push(Transfer { from: i, to: j, amount });
                    }
                }
                if !is_nodata(bedrock) && total > elev - bedrock {
                    let scale = (elev - bedrock) / total;
                    row[start..].iter_mut().for_each(|t| t.amount *= scale);
                }
            }
            row
        })
        .collect()
}

/// Applies transfers to elevation and composition.
///
/// # Returns
/// The total thickness moved.
pub fn apply_transfers(world: &mut World, transfers: &[Transfer]) -> f64 {
    let mut moved = 0.0;
    for t in transfers {
        world.elev[t.from] -= t.amount;
        world.elev[t.to] += t.amount;
        world.transfer_sediment(t.from, t.to, t.amount);
        moved += t.amount;
    }
    moved
}

/// One creep call covering `config.interval_days`.
pub fn creep(world: &mut World, config: &CreepConfig) -> f64 {
    let years = config.interval_days * DAY_IN_YEARS;
    let k = config.rate * years;
    let transfers = downslope_transfers(world, |_| k);
    apply_transfers(world, &transfers)
}

/// One soil-erosion call: creep scaled by the square root of the
/// contributing area. Drainage area is refreshed first.
pub fn soil_erosion(world: &mut World, config: &SoilErosionConfig) -> f64 {
    accumulate_drainage(world);
    let years = config.interval_days * DAY_IN_YEARS;
    let k = config.rate * years;
    let cell_area = world.geometry.cell_area();
    let area = &world.area;
    let transfers = downslope_transfers(world, |i| k * (area[i] * cell_area).sqrt());
    apply_transfers(world, &transfers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::sediment::SedimentConfig;

    fn hill() -> World {
        let mut b = Bootstrap::flat(5, 5, 1.0, 10.0);
        b.elevation[12] = 11.0;
        b.bedrock = Some(vec![0.0; 25]);
        World::from_bootstrap(&b, &SedimentConfig::default()).unwrap()
    }

    #[test]
    fn test_creep_lowers_peak_and_conserves_volume() {
        let mut w = hill();
        let before: f64 = w.elev.iter().sum();
        let moved = creep(&mut w, &CreepConfig::default());
        assert!(moved > 0.0);
        assert!(w.elev[12] < 11.0);
        assert!(w.elev[7] > 10.0);
        let after: f64 = w.elev.iter().sum();
        assert!((before - after).abs() < 1e-12);
    }

    #[test]
    fn test_cardinal_moves_more_than_diagonal() {
        let w = hill();
        let transfers = downslope_transfers(&w, |_| 1e-3);
        let to = |j: usize| transfers.iter().find(|t| t.from == 12 && t.to == j).map(|t| t.amount);
        let cardinal = to(7).unwrap();
        let diagonal = to(6).unwrap();
        assert!((cardinal / diagonal - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_bedrock_floor() {
        let mut w = hill();
        w.bedrock[12] = 10.999;
        let transfers = downslope_transfers(&w, |_| 1.0);
        let lost: f64 = transfers.iter().filter(|t| t.from == 12).map(|t| t.amount).sum();
        assert!(lost <= 0.001 + 1e-12);
    }

    #[test]
    fn test_flat_grid_does_not_creep() {
        let b = Bootstrap::flat(6, 6, 1.0, 3.0);
        let mut w = World::from_bootstrap(&b, &SedimentConfig::default()).unwrap();
        assert_eq!(creep(&mut w, &CreepConfig::default()), 0.0);
    }

    #[test]
    fn test_soil_erosion_scales_with_area() {
        let mut w = hill();
        let moved = soil_erosion(&mut w, &SoilErosionConfig::default());
        assert!(moved > 0.0);
        assert!(w.area.iter().all(|a| *a >= 1.0));
    }
}
