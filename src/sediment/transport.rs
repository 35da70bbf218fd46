//! Fluvial sediment step: entrainment capacity, distribution to the wet
//! neighbours, flux-difference commit and edge yields.
//!
//! The step runs in two phases. The capacity phase only reads the world
//! and writes a per-cell [`CellFlux`], so it can be re-run with a shorter
//! step when the largest per-cell erosion exceeds the cap. The commit
//! phase then applies every cell's own balance (inflow from neighbour
//! outboxes minus its outflow) one row per rayon task.

use rayon::prelude::*;
use tracing::debug;

use super::bank::bank_transfer;
use super::capacity::{bedrock_incision, shear_stress, CapacityInput};
use super::config::{SedimentConfig, VegetationModel};
use crate::grid::{is_nodata, Cardinal, World};
use crate::hydro::HydroConfig;

/// Capacities below this are treated as zero.
const CAPACITY_FLOOR: f64 = 1e-13;
/// Share of outgoing bedload split by velocity; the rest follows the
/// curvature gradient.
const VELOCITY_SHARE: f64 = 0.75;
const MAX_RETRIES: u32 = 64;

/// Transport outcome of one cell for one sediment step.
#[derive(Debug, Clone, Default)]
pub struct CellFlux {
    pub x: usize,
    pub tau: f64,
    pub vel: f64,
    /// Bedload leaving toward each cardinal, indexed `dir * fractions + n`.
    /// Empty when nothing moves.
    pub out: Vec<f64>,
    /// Entrainment into each suspended slot.
    pub suspend: Vec<f64>,
    pub incision: f64,
    pub veg_loss: f64,
    /// Total erosion before distribution.
    pub total: f64,
}

impl CellFlux {
    fn idle(x: usize) -> Self {
        Self {
            x,
            ..Self::default()
        }
    }

    /// Bedload leaving this cell across all faces.
    pub fn outflow(&self) -> f64 {
        self.out.iter().sum()
    }
}

/// Per-row flux records of the active wet interior cells, sorted by column.
#[derive(Debug, Clone)]
pub struct FluxField {
    pub rows: Vec<Vec<CellFlux>>,
    fractions: usize,
}

impl FluxField {
    pub fn get(&self, x: usize, y: usize) -> Option<&CellFlux> {
        let row = self.rows.get(y)?;
        row.binary_search_by_key(&x, |c| c.x).ok().map(|k| &row[k])
    }

    /// Bedload of fraction `n` leaving `(x, y)` toward `dir`.
    pub fn outbox(&self, x: usize, y: usize, dir: Cardinal, n: usize) -> f64 {
        match self.get(x, y) {
            Some(c) if !c.out.is_empty() => c.out[dir.index() * self.fractions + n],
            _ => 0.0,
        }
    }

    pub fn max_total(&self) -> f64 {
        self.rows
            .par_iter()
            .map(|row| row.iter().map(|c| c.total).fold(0.0, f64::max))
            .reduce(|| 0.0, f64::max)
    }
}

/// Result of one call to [`erode`].
#[derive(Debug, Clone, Default)]
pub struct ErosionOutcome {
    /// Largest per-cell erosion of the accepted attempt (m).
    pub max_erosion: f64,
    /// Sediment leaving across the grid edge per fraction (m^3).
    pub exported: Vec<f64>,
    /// Number of times the step was shortened.
    pub retries: u32,
    /// Sediment moved by bank transfer (m).
    pub bank_moved: f64,
}

/// Number of iterations to wait before the next sediment call: the cap
/// divided by the largest erosion, between 1 and 5.
pub fn erode_multiplier(max_erosion: f64, erode_cap: f64) -> u32 {
    if max_erosion <= 0.0 {
        return 5;
    }
    (erode_cap / max_erosion).floor().clamp(1.0, 5.0) as u32
}

/// Positive outward velocity from cell `(x, y)` across the face toward
/// `dir`.
#[inline]
fn outward_velocity(world: &World, x: usize, y: usize, dir: Cardinal) -> f64 {
    let g = world.geometry;
    let i = g.index(x, y);
    match dir {
        Cardinal::East if x + 1 < g.cols => world.ux[i + 1].max(0.0),
        Cardinal::West => (-world.ux[i]).max(0.0),
        Cardinal::South if y + 1 < g.rows => world.uy[i + g.cols].max(0.0),
        Cardinal::North => (-world.uy[i]).max(0.0),
        _ => 0.0,
    }
}

struct Params<'a> {
    sediment: &'a SedimentConfig,
    hydro: &'a HydroConfig,
    /// `mult * dt` (s).
    duration: f64,
}

fn evaluate_row(world: &World, p: &Params<'_>, y: usize) -> Vec<CellFlux> {
    let g = world.geometry;
    let dx = g.cell_size;
    let grains = &world.grains;
    let fractions = grains.len();
    let slots = grains.suspended_slots();
    let sed = p.sediment;
    let threshold = p.hydro.depth_threshold;
    let mut capacity = vec![0.0; fractions];
    let mut cells = Vec::with_capacity(world.active.row(y).len());

    for &x in world.active.row(y) {
        if g.is_edge(x, y) {
            continue;
        }
        let i = g.index(x, y);
        let depth = world.depth[i];
        if !world.is_valid(i) || depth <= threshold {
            continue;
        }
        let Some(parcel) = world.parcels[i].as_ref() else {
            continue;
        };
        let mut flux = CellFlux::idle(x);

        let mut wet = [None; 4];
        let mut dir_weight = [0.0; 4];
        let mut vel_total = 0.0;
        let mut slope_total = 0.0;
        let mut edge_total = 0.0;
        for dir in Cardinal::ALL {
            let Some(j) = g.neighbor(x, y, dir) else {
                continue;
            };
            if !world.is_valid(j) || world.depth[j] <= threshold {
                continue;
            }
            wet[dir.index()] = Some(j);
            let diff = world.edge[i] - world.edge[j];
            if diff > 0.0 {
                edge_total += diff;
            }
            let v = outward_velocity(world, x, y, dir).min(sed.max_velocity);
            if v > 0.0 {
                dir_weight[dir.index()] = v * v;
                vel_total += v * v;
                slope_total += (world.elev[i] - world.elev[j]) / dx * v;
            }
        }

        let vel = vel_total.sqrt().min(sed.max_velocity);
        let manning = world.manning(i, p.hydro.manning);
        let tau = shear_stress(vel, slope_total, depth, manning, p.hydro.gravity);
        flux.tau = tau;
        flux.vel = vel;
        if tau <= 0.0 {
            cells.push(flux);
            continue;
        }

        if !is_nodata(world.bedrock[i]) {
            flux.incision = bedrock_incision(tau, sed.bedrock.critical_shear, sed.bedrock.erodibility, p.duration);
        }
        if let Some(veg) = &sed.vegetation {
            if world.veg_cover[i] > 0.0 && tau > veg.critical_shear {
                flux.veg_loss = p.duration * (tau - veg.critical_shear).sqrt() * 1e-5;
            }
        }

        let input = CapacityInput {
            tau,
            parcel,
            grains,
            sand_limit: sed.sand_limit,
            gravity: p.hydro.gravity,
            duration: p.duration,
            cell_size: dx,
        };
        sed.law.entrainment(&input, &mut capacity);

        for (n, c) in capacity.iter_mut().enumerate() {
            if *c < CAPACITY_FLOOR {
                *c = 0.0;
            }
            *c = c.min(parcel.active[n].max(0.0));
            if let Some(s) = grains.slot[n] {
                let load = world.susp[i * slots + s];
                if (*c + load) / depth > sed.max_suspended_concentration {
                    *c = depth * sed.max_suspended_concentration - load;
                }
            }
            *c = c.max(0.0);
        }

        if let Some(veg) = &sed.vegetation {
            if veg.model == VegetationModel::Proportional {
                let keep = 1.0 - world.veg_cover[i];
                capacity.iter_mut().for_each(|c| *c *= keep);
            }
        }

        let mut total: f64 = capacity.iter().sum();
        if total > 0.0 && !is_nodata(world.bedrock[i]) && world.elev[i] - total <= world.bedrock[i] {
            let room = (world.elev[i] - world.bedrock[i]).max(0.0);
            let scale = room / total;
            capacity.iter_mut().for_each(|c| *c *= scale);
            total = room;
        }
        if let Some(veg) = &sed.vegetation {
            if let VegetationModel::Threshold { density } = veg.model {
                if total > 0.0 && world.veg_cover[i] > density && world.elev[i] - total <= world.veg_elev[i] {
                    let room = (world.elev[i] - world.veg_elev[i]).max(0.0);
                    let scale = room / total;
                    capacity.iter_mut().for_each(|c| *c *= scale);
                    total = room;
                }
            }
        }
        flux.total = total;
        if total <= 0.0 {
            cells.push(flux);
            continue;
        }

        flux.suspend = vec![0.0; slots];
        let mut factors = [0.0; 4];
        for dir in Cardinal::ALL {
            let d = dir.index();
            let Some(j) = wet[d] else {
                continue;
            };
            if vel_total > 0.0 {
                factors[d] += VELOCITY_SHARE * dir_weight[d] / vel_total;
            }
            let diff = world.edge[i] - world.edge[j];
            if edge_total > 0.0 && diff > 0.0 {
                factors[d] += (1.0 - VELOCITY_SHARE) * diff / edge_total;
            }
        }
        let mut out = vec![0.0; 4 * fractions];
        for (n, &c) in capacity.iter().enumerate() {
            if c <= 0.0 {
                continue;
            }
            match grains.slot[n] {
                Some(s) => flux.suspend[s] = c,
                None => {
                    for d in 0..4 {
                        out[d * fractions + n] = c * factors[d];
                    }
                }
            }
        }
        if out.iter().any(|v| *v > 0.0) {
            flux.out = out;
        }
        cells.push(flux);
    }
    cells
}

fn evaluate(world: &World, p: &Params<'_>) -> FluxField {
    let rows = (0..world.geometry.rows)
        .into_par_iter()
        .map(|y| evaluate_row(world, p, y))
        .collect();
    FluxField {
        rows,
        fractions: world.grains.len(),
    }
}

/// Writes shear stress and velocity of the active extent from `field`.
fn store_hydraulics(world: &mut World, field: &FluxField) {
    let cols = world.geometry.cols;
    let active = &world.active;
    world
        .tau
        .par_chunks_mut(cols)
        .zip(world.vel.par_chunks_mut(cols))
        .enumerate()
        .for_each(|(y, (tau, vel))| {
            for &x in active.row(y) {
                tau[x] = 0.0;
                vel[x] = 0.0;
            }
            for c in &field.rows[y] {
                tau[c.x] = c.tau;
                vel[c.x] = c.vel;
            }
        });
}

/// Moves entrained material into suspension and settles suspended load.
fn commit_suspended(world: &mut World, field: &FluxField, dt: f64, settling_cap: f64) {
    let slots = world.grains.suspended_slots();
    if slots == 0 {
        return;
    }
    let cols = world.geometry.cols;
    let World {
        grains,
        depth,
        input_point,
        parcels,
        susp,
        elev,
        ..
    } = world;
    let (grains, depth, input_point) = (&*grains, &*depth, &*input_point);

    parcels
        .par_chunks_mut(cols)
        .zip(susp.par_chunks_mut(cols * slots))
        .zip(elev.par_chunks_mut(cols))
        .enumerate()
        .for_each(|(y, ((parcels, susp), elev))| {
            for c in &field.rows[y] {
                let x = c.x;
                let i = y * cols + x;
                let Some(parcel) = parcels[x].as_mut() else {
                    continue;
                };
                let mut change = 0.0;
                for (s, &n) in grains.suspended.iter().enumerate() {
                    let k = x * slots + s;
                    if let Some(&entrained) = c.suspend.get(s) {
                        if entrained > 0.0 {
                            susp[k] += entrained;
                            parcel.active[n] -= entrained;
                            change -= entrained;
                        }
                    }
                    if input_point[i] || susp[k] <= 0.0 || depth[i] <= 0.0 {
                        continue;
                    }
                    let settle = ((grains.fall_velocity[n] * dt / depth[i]).min(1.0) * susp[k]).min(settling_cap);
                    susp[k] -= settle;
                    parcel.active[n] += settle;
                    change += settle;
                }
                elev[x] += change;
            }
        });
}

/// Applies the bedload balance, bedrock incision and vegetation loss of
/// every evaluated cell, then re-balances its active layer.
fn commit_bedload(world: &mut World, field: &FluxField) {
    let g = world.geometry;
    let cols = g.cols;
    let fractions = world.grains.len();
    let World {
        grains,
        parcels,
        elev,
        bedrock,
        veg_cover,
        ..
    } = world;
    let grains = &*grains;

    parcels
        .par_chunks_mut(cols)
        .zip(elev.par_chunks_mut(cols))
        .zip(bedrock.par_chunks_mut(cols))
        .zip(veg_cover.par_chunks_mut(cols))
        .enumerate()
        .for_each(|(y, (((parcels, elev), bedrock), cover))| {
            for c in &field.rows[y] {
                let x = c.x;
                let Some(parcel) = parcels[x].as_mut() else {
                    continue;
                };
                let mut change = 0.0;
                for n in 0..fractions {
                    let inflow = field.outbox(x - 1, y, Cardinal::East, n)
                        + field.outbox(x + 1, y, Cardinal::West, n)
                        + field.outbox(x, y - 1, Cardinal::South, n)
                        + field.outbox(x, y + 1, Cardinal::North, n);
                    let outflow = if c.out.is_empty() {
                        0.0
                    } else {
                        Cardinal::ALL.iter().map(|d| c.out[d.index() * fractions + n]).sum()
                    };
                    let net = inflow - outflow;
                    if net != 0.0 {
                        parcel.active[n] += net;
                        change += net;
                    }
                }
                elev[x] += change;

                if c.incision > 0.0 && !is_nodata(bedrock[x]) {
                    bedrock[x] -= c.incision;
                    parcel.deposit(c.incision, &grains.reference);
                }
                if c.veg_loss > 0.0 {
                    cover[x] = (cover[x] - c.veg_loss).max(0.0);
                }

                let untracked = if is_nodata(bedrock[x]) {
                    grains.active_thickness
                } else {
                    (elev[x] - bedrock[x] - parcel.total()).max(0.0)
                };
                parcel.maintain(grains.active_thickness, &grains.reference, grains.max_strata, untracked);
            }
        });
}

/// Collects suspended and bedload sediment leaving across the grid edge.
/// Suspended load in edge cells is removed from the world.
fn tally_edges(world: &mut World, field: &FluxField, threshold: f64) -> Vec<f64> {
    let g = world.geometry;
    let (cols, rows) = (g.cols, g.rows);
    let fractions = world.grains.len();
    let slots = world.grains.suspended_slots();
    let area = g.cell_area();
    let mut exported = vec![0.0; fractions];

    for e in g.edge_cells() {
        if !world.is_valid(e) {
            continue;
        }
        let (x, y) = g.coords(e);
        let load = world.suspended_total(e);
        if world.depth[e] <= threshold && load <= 0.0 {
            continue;
        }
        for (s, &n) in world.grains.suspended.iter().enumerate() {
            let k = e * slots + s;
            exported[n] += world.susp[k] * area;
            world.susp[k] = 0.0;
        }
        let corner = (x == 0 || x + 1 == cols) && (y == 0 || y + 1 == rows);
        if corner {
            continue;
        }
        let (source, toward) = if x == 0 {
            ((1, y), Cardinal::West)
        } else if x + 1 == cols {
            ((x - 1, y), Cardinal::East)
        } else if y == 0 {
            ((x, 1), Cardinal::North)
        } else {
            ((x, y - 1), Cardinal::South)
        };
        for (n, out) in exported.iter_mut().enumerate() {
            *out += field.outbox(source.0, source.1, toward, n) * area;
        }
    }
    exported
}

/// Runs one sediment step over the active extent.
///
/// The step first grows to `min(1.5 * step, max_step)`; whenever the
/// largest per-cell erosion exceeds the cap it is shortened to
/// `step * cap / max * 0.5` and the capacity phase is repeated.
///
/// # Arguments
/// * `step` - The model step (s), adjusted in place.
/// * `mult` - Erosion multiplier applied to the step inside the laws.
pub fn erode(
    world: &mut World,
    sediment: &SedimentConfig,
    hydro: &HydroConfig,
    step: &mut f64,
    mult: f64,
) -> ErosionOutcome {
    *step = (*step * 1.5).min(sediment.max_step);
    world.prepare_parcels(hydro.depth_threshold);

    let mut retries = 0;
    let (field, max_erosion) = loop {
        let params = Params {
            sediment,
            hydro,
            duration: mult * *step,
        };
        let field = evaluate(world, &params);
        let max = field.max_total();
        if max > sediment.erode_cap && retries < MAX_RETRIES {
            *step *= sediment.erode_cap / max * 0.5;
            retries += 1;
            continue;
        }
        break (field, max);
    };
    if retries > 0 {
        debug!(retries, step = *step, max_erosion, "Sediment step shortened");
    }

    store_hydraulics(world, &field);
    commit_suspended(world, &field, *step, sediment.settling_cap);
    commit_bedload(world, &field);

    let bank_moved = if sediment.bank.enabled {
        let sources: Vec<(usize, f64)> = field
            .rows
            .iter()
            .enumerate()
            .flat_map(|(y, row)| row.iter().map(move |c| (y, c)))
            .filter_map(|(y, c)| {
                let out = c.outflow();
                (out > 0.0).then(|| (world.geometry.index(c.x, y), out))
            })
            .collect();
        bank_transfer(world, &sources, sediment, hydro.depth_threshold, mult * *step)
    } else {
        0.0
    };

    let exported = tally_edges(world, &field, hydro.depth_threshold);
    ErosionOutcome {
        max_erosion,
        exported,
        retries,
        bank_moved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::sediment::{GrainFraction, TransportLaw, VegetationConfig};

    fn channel(cols: usize, rows: usize, config: &SedimentConfig) -> World {
        let mut b = Bootstrap::flat(cols, rows, 1.0, 10.0);
        b.bedrock = Some(vec![0.0; cols * rows]);
        let mut w = World::from_bootstrap(&b, config).unwrap();
        w.depth.iter_mut().for_each(|d| *d = 0.5);
        w.ux.iter_mut().for_each(|u| *u = 1.0);
        let (g, depth) = (w.geometry, w.depth.clone());
        w.active.rebuild(&g, &depth);
        w
    }

    fn stored(w: &World) -> f64 {
        w.elev.iter().sum::<f64>() + w.susp.iter().sum::<f64>()
    }

    #[test]
    fn test_erode_multiplier() {
        assert_eq!(erode_multiplier(0.0, 0.05), 5);
        assert_eq!(erode_multiplier(0.05, 0.05), 1);
        assert_eq!(erode_multiplier(0.02, 0.05), 2);
        assert_eq!(erode_multiplier(1e-9, 0.05), 5);
    }

    #[test]
    fn test_still_water_moves_nothing() {
        let config = SedimentConfig::default();
        let mut w = channel(6, 6, &config);
        w.ux.iter_mut().for_each(|u| *u = 0.0);
        let before = w.elev.clone();
        let mut step = 10.0;
        let out = erode(&mut w, &config, &HydroConfig::default(), &mut step, 1.0);
        assert_eq!(out.max_erosion, 0.0);
        assert!(out.exported.iter().all(|v| *v == 0.0));
        assert_eq!(w.elev, before);
        assert!(w.tau.iter().all(|t| *t == 0.0));
    }

    #[test]
    fn test_flow_erodes_and_exports_east() {
        let config = SedimentConfig::default();
        let mut w = channel(8, 5, &config);
        let mut step = 10.0;
        let out = erode(&mut w, &config, &HydroConfig::default(), &mut step, 1.0);
        assert!(out.max_erosion > 0.0);
        assert!(out.exported.iter().sum::<f64>() > 0.0);
        let g = w.geometry;
        assert!(w.tau[g.index(3, 2)] > 0.0);
    }

    #[test]
    fn test_elevation_and_suspension_balance_with_exports() {
        let mut config = SedimentConfig::default();
        config.bank.enabled = false;
        let mut w = channel(8, 6, &config);
        w.prepare_parcels(0.01);
        let before = stored(&w);
        let mut step = 10.0;
        let out = erode(&mut w, &config, &HydroConfig::default(), &mut step, 1.0);
        let exported: f64 = out.exported.iter().sum::<f64>() / w.geometry.cell_area();
        let after = stored(&w);
        assert!(exported > 0.0);
        assert!((before - after - exported).abs() < 1e-9);
    }

    #[test]
    fn test_retry_respects_erosion_cap() {
        let mut config = SedimentConfig::default();
        config.erode_cap = 1e-6;
        let mut w = channel(6, 6, &config);
        let mut step = 100.0;
        let out = erode(&mut w, &config, &HydroConfig::default(), &mut step, 1.0);
        assert!(out.retries > 0);
        assert!(step < 100.0);
        assert!(out.max_erosion <= config.erode_cap);
    }

    #[test]
    fn test_step_grows_to_limit() {
        let config = SedimentConfig::default();
        let mut w = channel(5, 5, &config);
        w.ux.iter_mut().for_each(|u| *u = 0.0);
        let mut step = 3000.0;
        erode(&mut w, &config, &HydroConfig::default(), &mut step, 1.0);
        assert_eq!(step, config.max_step);
    }

    #[test]
    fn test_bedrock_limits_erosion() {
        let config = SedimentConfig::bedload_only();
        let mut w = channel(6, 6, &config);
        w.bedrock.iter_mut().for_each(|b| *b = 9.9999);
        w.parcels.iter_mut().for_each(|p| *p = None);
        let mut step = 10.0;
        erode(&mut w, &config, &HydroConfig::default(), &mut step, 1.0);
        for (e, b) in w.elev.iter().zip(&w.bedrock) {
            assert!(*e >= *b - 1e-12);
        }
    }

    fn single_fraction_mpm() -> SedimentConfig {
        let mut config = SedimentConfig {
            law: TransportLaw::meyer_peter_muller(),
            fractions: vec![GrainFraction {
                diameter: 0.004,
                proportion: 1.0,
                fall_velocity: 0.237,
                suspended: false,
            }],
            ..SedimentConfig::default()
        };
        config.bank.enabled = false;
        config
    }

    #[test]
    fn test_mpm_uniform_channel_threshold() {
        let config = single_fraction_mpm();
        let hydro = HydroConfig::default();

        let mut w = channel(8, 5, &config);
        w.ux.iter_mut().for_each(|u| *u = 0.2);
        let before = w.elev.clone();
        let mut step = 10.0;
        let out = erode(&mut w, &config, &hydro, &mut step, 1.0);
        assert_eq!(out.max_erosion, 0.0);
        assert_eq!(w.elev, before);

        let mut w = channel(8, 5, &config);
        let mut step = 10.0;
        let out = erode(&mut w, &config, &hydro, &mut step, 1.0);
        assert!(out.max_erosion > 0.0);
        let g = w.geometry;
        for y in 1..g.rows - 1 {
            assert!(w.elev[g.index(1, y)] < 10.0);
            for x in 2..g.cols - 1 {
                assert!((w.elev[g.index(x, y)] - 10.0).abs() < 1e-12);
            }
        }
    }

    fn flux_at(w: &World, config: &SedimentConfig, x: usize, y: usize) -> CellFlux {
        let hydro = HydroConfig::default();
        let params = Params {
            sediment: config,
            hydro: &hydro,
            duration: 10.0,
        };
        evaluate_row(w, &params, y).into_iter().find(|c| c.x == x).unwrap()
    }

    fn with_vegetation(model: VegetationModel, critical_shear: f64) -> SedimentConfig {
        SedimentConfig {
            vegetation: Some(VegetationConfig {
                model,
                critical_shear,
                ..VegetationConfig::default()
            }),
            ..single_fraction_mpm()
        }
    }

    #[test]
    fn test_proportional_vegetation_scales_capacity() {
        let bare = single_fraction_mpm();
        let mut w = channel(8, 5, &bare);
        w.prepare_parcels(0.01);
        let base = flux_at(&w, &bare, 3, 2).total;
        assert!(base > 0.0);

        let config = with_vegetation(VegetationModel::Proportional, 1e9);
        let i = w.geometry.index(3, 2);
        w.veg_cover[i] = 0.4;
        let covered = flux_at(&w, &config, 3, 2);
        assert!((covered.total - 0.6 * base).abs() < 1e-12 * base.max(1.0));
        assert_eq!(covered.veg_loss, 0.0);
    }

    #[test]
    fn test_dense_cover_holds_bed_at_vegetation_elevation() {
        let bare = single_fraction_mpm();
        let mut w = channel(8, 5, &bare);
        w.prepare_parcels(0.01);
        let base = flux_at(&w, &bare, 3, 2).total;
        assert!(base > 0.0);

        let config = with_vegetation(VegetationModel::Threshold { density: 0.25 }, 1e9);
        let i = w.geometry.index(3, 2);
        w.veg_cover[i] = 0.8;
        assert_eq!(w.veg_elev[i], w.elev[i]);
        assert_eq!(flux_at(&w, &config, 3, 2).total, 0.0);

        w.veg_elev[i] = w.elev[i] - 0.5 * base;
        let held = flux_at(&w, &config, 3, 2).total;
        assert!((held - 0.5 * base).abs() < 1e-12);

        // Sparse cover does not protect the bed.
        w.veg_elev[i] = w.elev[i];
        w.veg_cover[i] = 0.1;
        assert_eq!(flux_at(&w, &config, 3, 2).total, base);
    }

    #[test]
    fn test_cover_stripped_above_critical_shear() {
        let bare = single_fraction_mpm();
        let mut w = channel(8, 5, &bare);
        w.prepare_parcels(0.01);
        let tau = flux_at(&w, &bare, 3, 2).tau;
        assert!(tau > 0.0);

        let resistant = with_vegetation(VegetationModel::Proportional, tau * 2.0);
        let mut w = channel(8, 5, &resistant);
        w.veg_cover.iter_mut().for_each(|c| *c = 0.5);
        let mut step = 10.0;
        erode(&mut w, &resistant, &HydroConfig::default(), &mut step, 1.0);
        let i = w.geometry.index(3, 2);
        assert_eq!(w.veg_cover[i], 0.5);

        let weak = with_vegetation(VegetationModel::Proportional, tau * 0.5);
        let mut w = channel(8, 5, &weak);
        w.veg_cover.iter_mut().for_each(|c| *c = 0.5);
        let mut step = 10.0;
        erode(&mut w, &weak, &HydroConfig::default(), &mut step, 1.0);
        assert!(w.veg_cover[i] < 0.5);
        assert!(w.veg_cover[i] >= 0.0);
    }
}
