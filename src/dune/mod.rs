//! Aeolian dune sub-model.
//!
//! Each coarse cell is split into `multiplier x multiplier` fine cells
//! holding hard substrate and loose sand. Sand moves in slabs that hop
//! downwind until they settle; over-steep sand then avalanches, and the
//! fine surface is averaged back onto the coarse grid. Cells under standing
//! water neither release nor carry sand.

pub mod config;

pub use config::DuneConfig;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::grid::{is_nodata, Cardinal, GridGeometry, World, NODATA};

const SAND_EPSILON: f64 = 1e-9;

/// Result of one dune update.
#[derive(Debug, Clone, Default)]
pub struct DuneOutcome {
    /// Net elevation change per coarse cell (m).
    pub net_change: Vec<f64>,
    pub pickups: u64,
    /// Sand volume blown off the grid (m^3).
    pub exported: f64,
    pub avalanche_sweeps: u32,
}

/// Fine-resolution sand state kept between updates.
pub struct DuneField {
    config: DuneConfig,
    multiplier: usize,
    coarse: GridGeometry,
    fine: GridGeometry,
    substrate: Vec<f64>,
    sand: Vec<f64>,
    wet: Vec<bool>,
    /// Coarse elevations written by the previous update.
    last_elev: Vec<f64>,
    /// Highest fine surface, bounding the shadow search.
    peak: f64,
    rng: ChaCha8Rng,
    next_update: f64,
}

impl DuneField {
    /// Refines `world` into substrate and sand. Each fine cell starts at its
    /// coarse cell's surface and sand thickness.
    pub fn new(world: &World, config: DuneConfig) -> Self {
        let coarse = world.geometry;
        let multiplier = config.multiplier.max(1);
        let fine = GridGeometry::new(
            coarse.cols * multiplier,
            coarse.rows * multiplier,
            coarse.cell_size / multiplier as f64,
        );
        let n = fine.len();
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let next_update = config.interval_seconds();
        let mut field = Self {
            config,
            multiplier,
            coarse,
            fine,
            substrate: vec![NODATA; n],
            sand: vec![0.0; n],
            wet: vec![false; n],
            last_elev: world.elev.clone(),
            peak: f64::NEG_INFINITY,
            rng,
            next_update,
        };
        for f in 0..n {
            let c = field.coarse_of(f);
            if world.is_valid(c) {
                field.sand[f] = world.sand[c].max(0.0);
                field.substrate[f] = world.elev[c] - field.sand[f];
            }
        }
        field
    }

    pub fn fine_geometry(&self) -> GridGeometry {
        self.fine
    }

    #[inline]
    fn coarse_of(&self, f: usize) -> usize {
        let (x, y) = self.fine.coords(f);
        self.coarse.index(x / self.multiplier, y / self.multiplier)
    }

    #[inline]
    fn surface(&self, f: usize) -> f64 {
        self.substrate[f] + self.sand[f]
    }

    #[inline]
    fn is_open(&self, f: usize) -> bool {
        !is_nodata(self.substrate[f])
    }

    /// Runs an update if `time` has reached the next scheduled one.
    pub fn advance(&mut self, world: &mut World, time: f64, depth_threshold: f64) -> Option<DuneOutcome> {
        if time < self.next_update {
            return None;
        }
        let interval = self.config.interval_seconds();
        if interval > 0.0 {
            while self.next_update <= time {
                self.next_update += interval;
            }
        }
        Some(self.update(world, depth_threshold))
    }

    /// One full dune update against the current coarse state.
    pub fn update(&mut self, world: &mut World, depth_threshold: f64) -> DuneOutcome {
        self.sync_from(world, depth_threshold);
        self.seed_upwind();
        let (pickups, exported) = self.saltate();
        let avalanche_sweeps = self.avalanche();
        let net_change = self.average_into(world);
        debug!(pickups, exported, avalanche_sweeps, "dune update");
        DuneOutcome {
            net_change,
            pickups,
            exported,
            avalanche_sweeps,
        }
    }

    /// Carries coarse elevation changes made by other processes into the
    /// substrate and refreshes the wet mask.
    fn sync_from(&mut self, world: &World, depth_threshold: f64) {
        for f in 0..self.fine.len() {
            let c = self.coarse_of(f);
            if !world.is_valid(c) {
                self.substrate[f] = NODATA;
                self.sand[f] = 0.0;
                self.wet[f] = false;
                continue;
            }
            if !self.is_open(f) || is_nodata(self.last_elev[c]) {
                self.sand[f] = world.sand[c].max(0.0);
                self.substrate[f] = world.elev[c] - self.sand[f];
            } else {
                self.substrate[f] += world.elev[c] - self.last_elev[c];
            }
            self.wet[f] = world.depth[c] > depth_threshold;
        }
    }

    /// Adds the configured supply to every dry, open cell on the upwind
    /// boundary.
    fn seed_upwind(&mut self) {
        let supply = self.config.upstream_supply;
        if supply <= 0.0 {
            return;
        }
        let (ox, oy) = self.config.wind.opposite().offset();
        for f in 0..self.fine.len() {
            let (x, y) = self.fine.coords(f);
            if self.fine.offset(x, y, ox, oy).is_none() && self.is_open(f) && !self.wet[f] {
                self.sand[f] += supply;
            }
        }
    }

    fn refresh_peak(&mut self) {
        self.peak = (0..self.fine.len())
            .filter(|&f| self.is_open(f))
            .map(|f| self.surface(f))
            .fold(f64::NEG_INFINITY, f64::max);
    }

    /// True when some upwind surface rises above the shadow line through
    /// fine cell `f`.
    fn shadowed(&self, f: usize) -> bool {
        let (ox, oy) = self.config.wind.opposite().offset();
        let here = self.surface(f);
        let gradient = self.config.shadow_gradient() * self.fine.cell_size;
        let (x, y) = self.fine.coords(f);
        let mut k = 1;
        loop {
            let line = k as f64 * gradient;
            if here + line >= self.peak {
                return false;
            }
            let Some(up) = self.fine.offset(x, y, ox * k, oy * k) else {
                return false;
            };
            if !self.is_open(up) {
                return false;
            }
            if self.surface(up) - here > line {
                return true;
            }
            k += 1;
        }
    }

    /// Carries a slab downwind from `from`. Returns the landing cell, or
    /// `None` when the slab leaves the grid.
    fn hop(&mut self, from: usize) -> Option<usize> {
        let (ox, oy) = self.config.wind.offset();
        let reach = self.config.hop_length.max(1) as i64;
        let mut at = from;
        for _ in 0..self.config.max_hops {
            let (x, y) = self.fine.coords(at);
            let next = self.fine.offset(x, y, ox * reach, oy * reach)?;
            if !self.is_open(next) {
                return None;
            }
            at = next;
            if self.wet[at] || self.shadowed(at) {
                return Some(at);
            }
            let p = if self.sand[at] > SAND_EPSILON {
                self.config.deposit_on_sand
            } else {
                self.config.deposit_on_bare
            };
            if self.rng.random::<f64>() < p {
                return Some(at);
            }
        }
        Some(at)
    }

    /// Random slab pickups. Returns `(pickups, exported volume)`.
    fn saltate(&mut self) -> (u64, f64) {
        let n = self.fine.len();
        let events = (n as f64 * self.config.events_per_cell).round() as u64;
        if n == 0 || events == 0 {
            return (0, 0.0);
        }
        self.refresh_peak();
        let slab = self.config.slab_thickness;
        let mut pickups = 0;
        let mut exported = 0.0;
        for _ in 0..events {
            let f = self.rng.random_range(0..n);
            if !self.is_open(f) || self.wet[f] || self.sand[f] <= SAND_EPSILON || self.shadowed(f) {
                continue;
            }
            let load = self.sand[f].min(slab);
            self.sand[f] -= load;
            pickups += 1;
            match self.hop(f) {
                Some(to) => {
                    self.sand[to] += load;
                    self.peak = self.peak.max(self.surface(to));
                }
                None => exported += load * self.fine.cell_area(),
            }
        }
        (pickups, exported)
    }

    /// Moves loose sand down cardinal slopes steeper than the angle of
    /// repose until stable or out of sweeps. Substrate never moves.
    fn avalanche(&mut self) -> u32 {
        let limit = self.config.repose_drop(self.fine.cell_size);
        let max_sweeps = self.config.max_avalanche_sweeps;
        for sweep in 1..=max_sweeps {
            let mut moved = false;
            for f in 0..self.fine.len() {
                if !self.is_open(f) || self.sand[f] <= SAND_EPSILON {
                    continue;
                }
                let (x, y) = self.fine.coords(f);
                for dir in Cardinal::ALL {
                    let Some(j) = self.fine.neighbor(x, y, dir) else {
                        continue;
                    };
                    if !self.is_open(j) {
                        continue;
                    }
                    let excess = self.surface(f) - self.surface(j) - limit;
                    if excess <= SAND_EPSILON {
                        continue;
                    }
                    let amount = (excess * 0.5).min(self.sand[f]);
                    if amount <= 0.0 {
                        continue;
                    }
                    self.sand[f] -= amount;
                    self.sand[j] += amount;
                    moved = true;
                }
            }
            if !moved {
                return sweep;
            }
        }
        max_sweeps
    }

    /// Writes block means of the fine surface and sand back to the coarse
    /// grid. Returns the net elevation change per coarse cell.
    fn average_into(&mut self, world: &mut World) -> Vec<f64> {
        let len = self.coarse.len();
        let mut surface = vec![0.0; len];
        let mut loose = vec![0.0; len];
        let mut count = vec![0usize; len];
        for f in 0..self.fine.len() {
            if !self.is_open(f) {
                continue;
            }
            let c = self.coarse_of(f);
            surface[c] += self.surface(f);
            loose[c] += self.sand[f];
            count[c] += 1;
        }

        let mut net = vec![0.0; len];
        for c in 0..len {
            if count[c] == 0 || !world.is_valid(c) {
                continue;
            }
            let k = count[c] as f64;
            let mean = surface[c] / k;
            net[c] = mean - world.elev[c];
            world.elev[c] = mean;
            world.sand[c] = loose[c] / k;
        }
        self.last_elev.copy_from_slice(&world.elev);
        net
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::sediment::SedimentConfig;

    fn sandy(cols: usize, rows: usize, sand: f64) -> World {
        let mut b = Bootstrap::flat(cols, rows, 1.0, 10.0 + sand);
        b.bedrock = Some(vec![0.0; cols * rows]);
        b.sand = Some(vec![sand; cols * rows]);
        World::from_bootstrap(&b, &SedimentConfig::default()).unwrap()
    }

    fn config() -> DuneConfig {
        DuneConfig {
            multiplier: 2,
            seed: 7,
            ..DuneConfig::default()
        }
    }

    #[test]
    fn test_fresh_field_averages_to_coarse_surface() {
        let mut w = sandy(4, 4, 0.3);
        let mut field = DuneField::new(&w, config());
        let net = field.average_into(&mut w);
        assert!(net.iter().all(|d| d.abs() < 1e-12));
        assert!(w.sand.iter().all(|s| (s - 0.3).abs() < 1e-12));
    }

    #[test]
    fn test_sand_volume_is_conserved() {
        let mut w = sandy(6, 6, 0.5);
        let mut field = DuneField::new(&w, config());
        let out = field.update(&mut w, 0.01);
        assert!(out.pickups > 0);
        let net: f64 = out.net_change.iter().sum::<f64>() * w.geometry.cell_area();
        assert!((net + out.exported).abs() < 1e-9);
        assert!(w.sand.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_standing_water_suppresses_transport() {
        let mut w = sandy(5, 5, 0.5);
        w.depth.iter_mut().for_each(|d| *d = 1.0);
        let mut field = DuneField::new(&w, config());
        let out = field.update(&mut w, 0.01);
        assert_eq!(out.pickups, 0);
        assert!(out.net_change.iter().all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn test_bare_grid_stays_put() {
        let mut w = sandy(5, 5, 0.0);
        let mut field = DuneField::new(&w, config());
        let out = field.update(&mut w, 0.01);
        assert_eq!(out.pickups, 0);
        assert_eq!(out.exported, 0.0);
    }

    #[test]
    fn test_upwind_supply_seeds_boundary() {
        let mut w = sandy(4, 3, 0.0);
        let mut field = DuneField::new(
            &w,
            DuneConfig {
                upstream_supply: 0.2,
                events_per_cell: 0.0,
                ..config()
            },
        );
        let out = field.update(&mut w, 0.01);
        let g = w.geometry;
        for y in 0..g.rows {
            let west = g.index(0, y);
            assert!((out.net_change[west] - 0.1).abs() < 1e-12);
            assert!((w.sand[west] - 0.1).abs() < 1e-12);
            assert_eq!(out.net_change[g.index(1, y)], 0.0);
        }
    }

    #[test]
    fn test_shadow_behind_step() {
        let w = sandy(8, 3, 0.0);
        let mut field = DuneField::new(&w, config());
        let fine = field.fine_geometry();
        for y in 0..fine.rows {
            let i = fine.index(2, y);
            field.substrate[i] += 1.0;
        }
        field.refresh_peak();
        assert!(field.shadowed(fine.index(3, 2)));
        assert!(field.shadowed(fine.index(8, 2)));
        assert!(!field.shadowed(fine.index(12, 2)));
        assert!(!field.shadowed(fine.index(1, 2)));
    }

    #[test]
    fn test_avalanche_relaxes_pile_and_conserves_sand() {
        let w = sandy(4, 4, 0.0);
        let mut field = DuneField::new(
            &w,
            DuneConfig {
                max_avalanche_sweeps: 20_000,
                ..config()
            },
        );
        let fine = field.fine_geometry();
        let top = fine.index(3, 3);
        field.sand[top] = 2.0;
        let sweeps = field.avalanche();
        assert!(sweeps > 1);
        let total: f64 = field.sand.iter().sum();
        assert!((total - 2.0).abs() < 1e-9);
        assert!(field.sand[top] < 2.0);

        let limit = field.config.repose_drop(fine.cell_size);
        for f in 0..fine.len() {
            if field.sand[f] <= SAND_EPSILON {
                continue;
            }
            let (x, y) = fine.coords(f);
            for dir in Cardinal::ALL {
                if let Some(j) = fine.neighbor(x, y, dir) {
                    assert!(field.surface(f) - field.surface(j) <= limit + 0.05);
                }
            }
        }
    }

    #[test]
    fn test_advance_waits_for_interval() {
        let mut w = sandy(4, 4, 0.2);
        let mut field = DuneField::new(&w, config());
        assert!(field.advance(&mut w, 1800.0, 0.01).is_none());
        assert!(field.advance(&mut w, 3600.0, 0.01).is_some());
        assert!(field.advance(&mut w, 3700.0, 0.01).is_none());
    }

    #[test]
    fn test_external_lowering_reaches_substrate() {
        let mut w = sandy(4, 4, 0.0);
        let mut field = DuneField::new(
            &w,
            DuneConfig {
                events_per_cell: 0.0,
                ..config()
            },
        );
        w.elev[5] -= 0.5;
        let out = field.update(&mut w, 0.01);
        assert!(out.net_change[5].abs() < 1e-12);
        assert!((w.elev[5] - 9.5).abs() < 1e-12);
    }
}
