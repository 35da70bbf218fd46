//! Lateral bank transfer into eroding channel cells.
//!
//! Runs sequentially after the bedload commit: each transfer moves
//! material between two arbitrary cells, first along x then along y.

use super::config::SedimentConfig;
use crate::grid::{is_nodata, World};

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Amount moved from the higher neighbour `n` into channel cell `c`.
fn bank_amount(
    world: &World,
    c: usize,
    n: usize,
    outflow: f64,
    sediment: &SedimentConfig,
    threshold: f64,
    duration: f64,
) -> f64 {
    let bank = &sediment.bank;
    let dx = world.geometry.cell_size;
    let drop = world.elev[n] - world.elev[c];
    if drop <= 0.0 {
        return 0.0;
    }
    let mut amount = if world.depth[n] < threshold {
        duration * bank.lateral_constant * world.tau[c] * world.edge[n] / dx
    } else {
        bank.bed_proportion * outflow * drop / dx * 0.1
    };
    if amount <= 0.0 {
        return 0.0;
    }
    if let Some(veg) = &sediment.vegetation {
        amount *= 1.0 - world.veg_cover[n] * (1.0 - veg.lateral_restriction);
    }
    if !is_nodata(world.bedrock[n]) && world.elev[n] - amount < world.bedrock[n] {
        return 0.0;
    }
    amount.min(bank.cap_fraction * sediment.erode_cap).max(0.0)
}

/// Moves bank material toward every channel cell with outgoing bedload.
///
/// # Arguments
/// * `sources` - `(cell, outgoing bedload)` pairs from the sediment step.
/// * `duration` - `mult * dt` (s).
///
/// # Returns
/// The total thickness moved (m).
pub fn bank_transfer(
    world: &mut World,
    sources: &[(usize, f64)],
    sediment: &SedimentConfig,
    threshold: f64,
    duration: f64,
) -> f64 {
    let g = world.geometry;
    let mut moved = 0.0;
    for axis in [Axis::X, Axis::Y] {
        for &(c, outflow) in sources {
            let (x, y) = g.coords(c);
            let neighbours = match axis {
                Axis::X => [g.offset(x, y, -1, 0), g.offset(x, y, 1, 0)],
                Axis::Y => [g.offset(x, y, 0, -1), g.offset(x, y, 0, 1)],
            };
            for n in neighbours.into_iter().flatten() {
                let (nx, ny) = g.coords(n);
                if g.is_edge(nx, ny) || !world.is_valid(n) {
                    continue;
                }
                let amount = bank_amount(world, c, n, outflow, sediment, threshold, duration);
                if amount <= 0.0 {
                    continue;
                }
                world.elev[n] -= amount;
                world.elev[c] += amount;
                world.transfer_sediment(n, c, amount);
                moved += amount;
            }
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::sediment::VegetationConfig;

    fn valley() -> World {
        // Channel along x = 2 between higher banks.
        let mut b = Bootstrap::flat(5, 5, 1.0, 10.0);
        for y in 0..5 {
            b.elevation[y * 5 + 2] = 9.0;
        }
        b.bedrock = Some(vec![0.0; 25]);
        let mut w = World::from_bootstrap(&b, &SedimentConfig::default()).unwrap();
        for y in 0..5 {
            w.depth[y * 5 + 2] = 0.5;
            w.tau[y * 5 + 2] = 20.0;
        }
        w.edge.iter_mut().for_each(|e| *e = 1.0);
        w
    }

    #[test]
    fn test_dry_bank_moves_material_into_channel() {
        let mut w = valley();
        let config = SedimentConfig::default();
        let c = w.geometry.index(2, 2);
        let before: f64 = w.elev.iter().sum();
        let moved = bank_transfer(&mut w, &[(c, 0.01)], &config, 0.01, 100.0);
        assert!(moved > 0.0);
        assert!(w.elev[c] > 9.0);
        assert!(w.elev[w.geometry.index(1, 2)] < 10.0);
        let after: f64 = w.elev.iter().sum();
        assert!((before - after).abs() < 1e-12);
    }

    #[test]
    fn test_transfer_capped() {
        let mut w = valley();
        let config = SedimentConfig::default();
        let c = w.geometry.index(2, 2);
        bank_transfer(&mut w, &[(c, 0.01)], &config, 0.01, 1e9);
        let cap = config.bank.cap_fraction * config.erode_cap;
        assert!(10.0 - w.elev[w.geometry.index(1, 2)] <= cap + 1e-12);
    }

    #[test]
    fn test_edge_neighbours_never_donate() {
        let mut b = Bootstrap::flat(3, 3, 1.0, 10.0);
        b.elevation[4] = 9.0;
        let mut w = World::from_bootstrap(&b, &SedimentConfig::default()).unwrap();
        w.tau[4] = 20.0;
        w.edge.iter_mut().for_each(|e| *e = 1.0);
        let moved = bank_transfer(&mut w, &[(4, 0.01)], &SedimentConfig::default(), 0.01, 100.0);
        assert_eq!(moved, 0.0);
    }

    #[test]
    fn test_bedrock_blocks_transfer() {
        let mut w = valley();
        w.bedrock.iter_mut().for_each(|b| *b = 10.0);
        let c = w.geometry.index(2, 2);
        let moved = bank_transfer(&mut w, &[(c, 0.01)], &SedimentConfig::default(), 0.01, 100.0);
        assert_eq!(moved, 0.0);
    }

    #[test]
    fn test_vegetation_restricts_bank_transfer() {
        let bare = SedimentConfig::default();
        let mut w = valley();
        let c = w.geometry.index(2, 2);
        let open = bank_transfer(&mut w, &[(c, 0.01)], &bare, 0.01, 100.0);
        assert!(open > 0.0);
        assert!(open / 2.0 < bare.bank.cap_fraction * bare.erode_cap);

        let rooted = SedimentConfig {
            vegetation: Some(VegetationConfig {
                lateral_restriction: 0.1,
                ..VegetationConfig::default()
            }),
            ..SedimentConfig::default()
        };
        let mut w = valley();
        w.veg_cover.iter_mut().for_each(|v| *v = 1.0);
        let held = bank_transfer(&mut w, &[(c, 0.01)], &rooted, 0.01, 100.0);
        assert!((held - 0.1 * open).abs() < 1e-15);

        let mut w = valley();
        w.veg_cover.iter_mut().for_each(|v| *v = 0.5);
        let partial = bank_transfer(&mut w, &[(c, 0.01)], &rooted, 0.01, 100.0);
        assert!((partial - 0.55 * open).abs() < 1e-15);
    }
}
