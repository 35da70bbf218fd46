//! Threshold slope failure.
//!
//! A pair of neighbours steeper than the failure angle is relaxed by moving
//! half of the excess height downslope, which leaves the pair exactly at
//! the threshold. Cells are visited in place, so a failure can cascade
//! within one sweep.

use super::config::LandslideConfig;
use crate::grid::{is_nodata, World, NEIGHBORS_8};

/// Drops this small are treated as stable.
const SLIDE_EPSILON: f64 = 1e-9;

/// Height each cell may not slide below: bedrock plus one active layer.
#[inline]
fn slide_floor(world: &World, i: usize) -> f64 {
    let b = world.bedrock[i];
    if is_nodata(b) {
        f64::NEG_INFINITY
    } else {
        b + world.grains.active_thickness
    }
}

/// Relaxes cell `(x, y)` against all 8 neighbours.
///
/// # Arguments
/// * `critical` - Allowed cardinal drop.
/// * `floor_critical` - Allowed drop once the cell is at its floor.
/// * `cap` - Largest single move, if any.
fn relax_cell(world: &mut World, x: usize, y: usize, critical: f64, floor_critical: f64, cap: Option<f64>) -> f64 {
    let g = world.geometry;
    let i = g.index(x, y);
    if !world.is_valid(i) {
        return 0.0;
    }
    let floor = slide_floor(world, i);
    let allowed = if world.elev[i] <= floor { floor_critical } else { critical };
    let mut moved = 0.0;
    for &(ox, oy, diag) in &NEIGHBORS_8 {
        let Some(j) = g.offset(x, y, ox, oy) else {
            continue;
        };
        if !world.is_valid(j) {
            continue;
        }
        let limit = if diag { allowed * std::f64::consts::SQRT_2 } else { allowed };
        let excess = world.elev[i] - world.elev[j] - limit;
        if excess <= SLIDE_EPSILON {
            continue;
        }
        let mut amount = excess * 0.5;
        if world.elev[i] - amount < floor {
            amount = world.elev[i] - floor;
        }
        if let Some(cap) = cap {
            amount = amount.min(cap);
        }
        if amount <= 0.0 {
            continue;
        }
        world.elev[i] -= amount;
        world.elev[j] += amount;
        world.transfer_sediment(i, j, amount);
        moved += amount;
    }
    moved
}

/// Relaxes every interior cell of the active extent once.
///
/// # Returns
/// The total thickness moved.
pub fn slide_active(world: &mut World, config: &LandslideConfig) -> f64 {
    let g = world.geometry;
    let critical = config.critical_drop(g.cell_size);
    let mut moved = 0.0;
    for y in 1..g.rows.saturating_sub(1) {
        let row: Vec<usize> = world.active.row(y).to_vec();
        for x in row {
            if !g.is_interior(x, y) {
                continue;
            }
            // At the floor nothing may slide.
            moved += relax_cell(world, x, y, critical, f64::INFINITY, None);
        }
    }
    moved
}

/// Sweeps the whole grid until nothing moves or `config.max_sweeps` is
/// reached. Loose dune sand is set aside during relaxation.
///
/// # Returns
/// `(thickness moved, sweeps run)`.
pub fn slide_whole_grid(world: &mut World, config: &LandslideConfig, erode_cap: f64) -> (f64, u32) {
    let g = world.geometry;
    let critical = config.critical_drop(g.cell_size);
    let floor_critical = 10.0 * g.cell_size;

    for (e, s) in world.elev.iter_mut().zip(&world.sand) {
        if !is_nodata(*e) {
            *e -= s;
        }
    }

    let mut total = 0.0;
    let mut sweeps = 0;
    while sweeps < config.max_sweeps {
        sweeps += 1;
        let mut moved = 0.0;
        for y in 1..g.rows.saturating_sub(1) {
            for x in 1..g.cols - 1 {
                moved += relax_cell(world, x, y, critical, floor_critical, Some(erode_cap));
            }
        }
        total += moved;
        if moved <= 0.0 {
            break;
        }
    }

    for (e, s) in world.elev.iter_mut().zip(&world.sand) {
        if !is_nodata(*e) {
            *e += s;
        }
    }
    (total, sweeps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::sediment::SedimentConfig;

    fn cliff() -> World {
        let mut b = Bootstrap::flat(7, 7, 1.0, 10.0);
        b.elevation[24] = 15.0;
        b.bedrock = Some(vec![0.0; 49]);
        let mut w = World::from_bootstrap(&b, &SedimentConfig::default()).unwrap();
        w.depth[24] = 0.5;
        let (g, depth) = (w.geometry, w.depth.clone());
        w.active.rebuild(&g, &depth);
        w
    }

    fn steepest(w: &World) -> f64 {
        let g = w.geometry;
        let mut worst: f64 = 0.0;
        for i in 0..g.len() {
            let (x, y) = g.coords(i);
            for &(ox, oy, diag) in &NEIGHBORS_8 {
                if let Some(j) = g.offset(x, y, ox, oy) {
                    let run = if diag { std::f64::consts::SQRT_2 } else { 1.0 };
                    worst = worst.max((w.elev[i] - w.elev[j]) / run);
                }
            }
        }
        worst
    }

    #[test]
    fn test_active_slide_reduces_peak_and_conserves() {
        let mut w = cliff();
        let before: f64 = w.elev.iter().sum();
        let moved = slide_active(&mut w, &LandslideConfig::default());
        assert!(moved > 0.0);
        assert!(w.elev[24] < 15.0);
        let after: f64 = w.elev.iter().sum();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn test_whole_grid_converges_to_failure_angle() {
        let mut w = cliff();
        let config = LandslideConfig {
            max_sweeps: 10_000,
            ..LandslideConfig::default()
        };
        let (_, sweeps) = slide_whole_grid(&mut w, &config, 10.0);
        assert!(sweeps < config.max_sweeps);
        assert!(steepest(&w) <= config.critical_drop(1.0) + 1e-6);
    }

    #[test]
    fn test_sand_is_restored() {
        let mut w = cliff();
        w.sand[10] = 0.3;
        w.elev[10] += 0.3;
        slide_whole_grid(&mut w, &LandslideConfig::default(), 0.05);
        assert!(w.elev[10] >= 10.3 - 1e-9);
    }

    #[test]
    fn test_floor_blocks_sliding() {
        let mut w = cliff();
        w.bedrock[24] = 15.0;
        let moved = slide_active(&mut w, &LandslideConfig::default());
        assert_eq!(moved, 0.0);
    }
}
