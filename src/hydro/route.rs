//! Explicit inertial shallow-water routing over the active extent.
//!
//! Face fluxes are stored on the cell east/south of the face: `qx[i]` is
//! the discharge per unit width between `(x - 1, y)` and `(x, y)`, positive
//! toward +x, and `qy[i]` the same between `(x, y - 1)` and `(x, y)`.
//! Every pass writes only its own row, so rows run as independent rayon
//! tasks.

use rayon::prelude::*;

use super::config::HydroConfig;
use crate::grid::{is_nodata, World};

/// Courant-limited step (s) for the deepest wet cell. Depths below 0.1 m
/// are treated as 0.1 m.
pub fn courant_limit(config: &HydroConfig, cell_size: f64, max_depth: f64) -> f64 {
    config.courant * cell_size / (config.gravity * max_depth.max(0.1)).sqrt()
}

/// Semi-implicit friction update of one face discharge.
#[inline]
fn momentum_update(q: f64, hflow: f64, slope: f64, n: f64, dt: f64, g: f64) -> f64 {
    (q - g * hflow * dt * slope) / (1.0 + g * hflow * dt * n * n * q.abs() / hflow.powf(10.0 / 3.0))
}

/// Froude ceiling then donor-storage limit. `back` is the depth on the
/// negative side of the face, `front` the positive side.
#[inline]
fn limit_discharge(mut q: f64, hflow: f64, back: f64, front: f64, dt: f64, dx: f64, config: &HydroConfig) -> f64 {
    let celerity = (config.gravity * hflow).sqrt();
    if celerity > 0.0 && q.abs() / hflow / celerity > config.froude_limit {
        q = q.signum() * hflow * celerity * config.froude_limit;
    }
    let donor = if q > 0.0 { back } else { front };
    if q.abs() * dt / dx > donor / 4.0 {
        q = q.signum() * donor * dx / 5.0 / dt;
    }
    q
}

/// Cell-pair data needed to compute one face.
struct FacePair {
    back: usize,
    front: usize,
}

struct FaceOutcome {
    q: f64,
    u: f64,
}

#[allow(clippy::too_many_arguments)]
fn face(
    pair: FacePair,
    q_old: f64,
    edge_slope: Option<f64>,
    n: f64,
    elev: &[f64],
    depth: &[f64],
    dt: f64,
    dx: f64,
    config: &HydroConfig,
) -> FaceOutcome {
    let (b, f) = (pair.back, pair.front);
    let zero = FaceOutcome { q: 0.0, u: 0.0 };
    if is_nodata(elev[b]) || is_nodata(elev[f]) || (depth[b] <= 0.0 && depth[f] <= 0.0) {
        return zero;
    }
    let eta_b = elev[b] + depth[b];
    let eta_f = elev[f] + depth[f];
    let hflow = eta_b.max(eta_f) - elev[b].max(elev[f]);
    if hflow <= config.hflow_threshold {
        return zero;
    }
    let slope = edge_slope.unwrap_or((eta_f - eta_b) / dx);
    let q = momentum_update(q_old, hflow, slope, n, dt, config.gravity);
    let q = limit_discharge(q, hflow, depth[b], depth[f], dt, dx, config);
    FaceOutcome { q, u: q / hflow }
}

/// Updates water discharge and face velocity on every face between two
/// active cells; other faces are zeroed.
pub fn route_water(world: &mut World, config: &HydroConfig, dt: f64) {
    let g = world.geometry;
    let (cols, rows, dx) = (g.cols, g.rows, g.cell_size);
    let depth = &world.depth;
    let elev = &world.elev;
    let active = &world.active;
    let roughness = world.roughness.as_deref();

    world
        .qx
        .par_chunks_mut(cols)
        .zip(world.qy.par_chunks_mut(cols))
        .zip(world.ux.par_chunks_mut(cols))
        .zip(world.uy.par_chunks_mut(cols))
        .enumerate()
        .for_each(|(y, (((qx, qy), ux), uy))| {
            for &x in active.row(y) {
                let i = y * cols + x;
                let n = roughness.map_or(config.manning, |r| r[i]);

                if x > 0 && active.contains(i - 1) {
                    let edge = if x + 1 == cols {
                        Some(-config.edge_slope)
                    } else if x == 1 {
                        Some(config.edge_slope)
                    } else {
                        None
                    };
                    let pair = FacePair { back: i - 1, front: i };
                    let out = face(pair, qx[x], edge, n, elev, depth, dt, dx, config);
                    qx[x] = out.q;
                    ux[x] = out.u;
                } else {
                    qx[x] = 0.0;
                    ux[x] = 0.0;
                }

                if y > 0 && active.contains(i - cols) {
                    let edge = if y + 1 == rows {
                        Some(-config.edge_slope)
                    } else if y == 1 {
                        Some(config.edge_slope)
                    } else {
                        None
                    };
                    let pair = FacePair { back: i - cols, front: i };
                    let out = face(pair, qy[x], edge, n, elev, depth, dt, dx, config);
                    qy[x] = out.q;
                    uy[x] = out.u;
                } else {
                    qy[x] = 0.0;
                    uy[x] = 0.0;
                }
            }
        });
}

/// Advects suspended load with the donor cell's concentration.
pub fn route_suspended(world: &mut World, config: &HydroConfig, dt: f64) {
    let slots = world.grains.suspended_slots();
    if slots == 0 {
        return;
    }
    let g = world.geometry;
    let (cols, dx) = (g.cols, g.cell_size);
    let depth = &world.depth;
    let susp = &world.susp;
    let qx = &world.qx;
    let qy = &world.qy;
    let active = &world.active;
    let threshold = config.depth_threshold;

    let flux = |q: f64, back: usize, front: usize, s: usize| -> f64 {
        if q == 0.0 {
            return 0.0;
        }
        let donor = if q > 0.0 { back } else { front };
        if depth[donor] <= threshold {
            return 0.0;
        }
        let load = susp[donor * slots + s];
        let mut qs = q * load / depth[donor];
        if qs.abs() * dt / dx > load / 4.0 {
            qs = qs.signum() * load * dx / 5.0 / dt;
        }
        qs
    };

    world
        .qxs
        .par_chunks_mut(cols * slots)
        .zip(world.qys.par_chunks_mut(cols * slots))
        .enumerate()
        .for_each(|(y, (qxs, qys))| {
            for &x in active.row(y) {
                let i = y * cols + x;
                for s in 0..slots {
                    qxs[x * slots + s] = if x > 0 { flux(qx[i], i - 1, i, s) } else { 0.0 };
                    qys[x * slots + s] = if y > 0 { flux(qy[i], i - cols, i, s) } else { 0.0 };
                }
            }
        });
}

/// Applies flux divergence to depths and suspended load of active cells.
///
/// # Returns
/// The largest water depth among active cells after the update.
pub fn update_depths(world: &mut World, dt: f64) -> f64 {
    let g = world.geometry;
    let (cols, rows, dx) = (g.cols, g.rows, g.cell_size);
    let qx = &world.qx;
    let qy = &world.qy;
    let elev = &world.elev;
    let active = &world.active;

    let max_depth = world
        .depth
        .par_chunks_mut(cols)
        .enumerate()
        .map(|(y, row)| {
            let mut row_max = 0.0f64;
            for &x in active.row(y) {
                let i = y * cols + x;
                if is_nodata(elev[i]) {
                    row[x] = 0.0;
                    continue;
                }
                let east = if x + 1 < cols { qx[i + 1] } else { 0.0 };
                let south = if y + 1 < rows { qy[i + cols] } else { 0.0 };
                let d = (row[x] + dt * (qx[i] - east + qy[i] - south) / dx).max(0.0);
                row[x] = d;
                row_max = row_max.max(d);
            }
            row_max
        })
        .reduce(|| 0.0, f64::max);

    let slots = world.grains.suspended_slots();
    if slots > 0 {
        let qxs = &world.qxs;
        let qys = &world.qys;
        world
            .susp
            .par_chunks_mut(cols * slots)
            .enumerate()
            .for_each(|(y, row)| {
                for &x in active.row(y) {
                    let i = y * cols + x;
                    for s in 0..slots {
                        let k = i * slots + s;
                        let east = if x + 1 < cols { qxs[k + slots] } else { 0.0 };
                        let south = if y + 1 < rows { qys[k + cols * slots] } else { 0.0 };
                        let v = row[x * slots + s] + dt * (qxs[k] - east + qys[k] - south) / dx;
                        row[x * slots + s] = if is_nodata(elev[i]) { 0.0 } else { v.max(0.0) };
                    }
                }
            });
    }

    max_depth
}

/// Rebuilds the active extent and clears fluxes on faces owned by cells
/// that left it.
pub fn refresh_active_extent(world: &mut World) {
    let g = world.geometry;
    world.active.rebuild(&g, &world.depth);
    let slots = world.grains.suspended_slots();
    for i in 0..g.len() {
        if world.active.contains(i) {
            continue;
        }
        world.qx[i] = 0.0;
        world.qy[i] = 0.0;
        world.ux[i] = 0.0;
        world.uy[i] = 0.0;
        for s in 0..slots {
            world.qxs[i * slots + s] = 0.0;
            world.qys[i * slots + s] = 0.0;
        }
    }
}

/// Removes water above `threshold` from edge cells.
///
/// # Returns
/// The volume (m^3) that left the grid.
pub fn drain_edges(world: &mut World, threshold: f64) -> f64 {
    let g = world.geometry;
    let area = g.cell_area();
    let mut out = 0.0;
    for i in g.edge_cells() {
        if !world.is_valid(i) {
            continue;
        }
        let d = world.depth[i];
        if d > threshold {
            out += (d - threshold) * area;
            world.depth[i] = threshold;
        }
    }
    out
}

/// Lowers standing water by up to `amount` metres per cell.
///
/// # Returns
/// The evaporated volume (m^3).
pub fn evaporate(world: &mut World, amount: f64) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let area = world.geometry.cell_area();
    world
        .depth
        .par_iter_mut()
        .map(|d| {
            let e = amount.min(*d).max(0.0);
            *d -= e;
            e * area
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::sediment::SedimentConfig;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn world(cols: usize, rows: usize, dx: f64) -> World {
        World::from_bootstrap(&Bootstrap::flat(cols, rows, dx, 0.0), &SedimentConfig::default()).unwrap()
    }

    fn step(world: &mut World, config: &HydroConfig, dt: f64) -> f64 {
        route_water(world, config, dt);
        route_suspended(world, config, dt);
        update_depths(world, dt)
    }

    #[test]
    fn test_courant_limit_floor() {
        let config = HydroConfig::default();
        let shallow = courant_limit(&config, 5.0, 0.01);
        let floor = courant_limit(&config, 5.0, 0.1);
        assert_eq!(shallow, floor);
        assert!(courant_limit(&config, 5.0, 2.0) < floor);
    }

    #[test]
    fn test_still_lake_has_no_interior_flux() {
        let mut w = world(9, 9, 1.0);
        for y in 3..6 {
            for x in 3..6 {
                let i = w.geometry.index(x, y);
                w.elev[i] = -1.0;
                w.depth[i] = 1.0;
            }
        }
        refresh_active_extent(&mut w);
        let config = HydroConfig::default();
        step(&mut w, &config, 0.1);
        assert!(w.qx.iter().chain(&w.qy).all(|q| q.abs() < 1e-12));
    }

    #[test]
    fn test_water_flows_downhill() {
        let mut w = world(6, 3, 1.0);
        let config = HydroConfig::default();
        w.depth[w.geometry.index(2, 1)] = 0.5;
        refresh_active_extent(&mut w);
        step(&mut w, &config, 0.2);
        assert!(w.qx[w.geometry.index(3, 1)] > 0.0);
        assert!(w.qx[w.geometry.index(2, 1)] < 0.0);
        assert!(w.depth[w.geometry.index(3, 1)] > 0.0);
    }

    #[test]
    fn test_depth_and_suspended_never_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut w = world(12, 10, 2.0);
        let slots = w.grains.suspended_slots();
        for i in 0..w.geometry.len() {
            w.elev[i] = rng.random::<f64>() * 2.0;
            if rng.random::<f64>() < 0.5 {
                w.depth[i] = rng.random::<f64>() * 0.8;
                w.susp[i * slots] = w.depth[i] * 0.02;
            }
        }
        let config = HydroConfig::default();
        for k in 0..300 {
            if k % 5 == 0 {
                refresh_active_extent(&mut w);
            }
            let max_depth = w.depth.iter().copied().fold(0.0, f64::max);
            let dt = courant_limit(&config, 2.0, max_depth);
            step(&mut w, &config, dt);
            drain_edges(&mut w, config.depth_threshold);
            assert!(w.depth.iter().all(|d| *d >= 0.0));
            assert!(w.susp.iter().all(|s| *s >= 0.0));
        }
    }

    #[test]
    fn test_routing_conserves_volume_with_edge_drain() {
        let mut w = world(10, 10, 1.0);
        let config = HydroConfig::default();
        let centre = w.geometry.index(5, 5);
        let mut injected = 0.0;
        let mut drained = 0.0;
        for k in 0..400 {
            w.depth[centre] += 0.01;
            injected += 0.01;
            if k % 5 == 0 {
                refresh_active_extent(&mut w);
            }
            let max_depth = w.depth.iter().copied().fold(0.0, f64::max);
            let dt = courant_limit(&config, 1.0, max_depth);
            step(&mut w, &config, dt);
            drained += drain_edges(&mut w, config.depth_threshold);
        }
        let stored = w.water_volume();
        assert!(drained > 0.0);
        assert!((stored + drained - injected).abs() < 1e-9 * injected.max(1.0));
    }

    #[test]
    fn test_evaporation_removes_at_most_depth() {
        let mut w = world(2, 1, 1.0);
        w.depth = vec![0.3, 0.01];
        let removed = evaporate(&mut w, 0.05);
        assert!((removed - 0.06).abs() < 1e-12);
        assert!((w.depth[0] - 0.25).abs() < 1e-12);
        assert_eq!(w.depth[1], 0.0);
    }
}
