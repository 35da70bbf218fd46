//! The `World` aggregate: every per-cell array of a run, owned in one place
//! and passed explicitly to each process.

use rayon::prelude::*;

use super::active::ActiveExtent;
use super::bootstrap::{Bootstrap, BootstrapError};
use super::geometry::{is_nodata, GridGeometry};
use super::parcel::Parcel;
use crate::sediment::SedimentConfig;

/// Grain-size classes and the layer geometry shared by all parcels.
#[derive(Debug, Clone)]
pub struct GrainSet {
    pub diameters: Vec<f64>,
    pub fall_velocity: Vec<f64>,
    /// Reference composition, summing to one.
    pub reference: Vec<f64>,
    /// Fraction index of each suspended slot.
    pub suspended: Vec<usize>,
    /// Suspended slot of each fraction, if it is suspended.
    pub slot: Vec<Option<usize>>,
    pub active_thickness: f64,
    pub max_strata: usize,
}

impl GrainSet {
    pub fn from_config(config: &SedimentConfig) -> Self {
        let suspended: Vec<usize> = config
            .fractions
            .iter()
            .enumerate()
            .filter(|(_, f)| f.suspended)
            .map(|(i, _)| i)
            .collect();
        let mut slot = vec![None; config.fractions.len()];
        for (s, &n) in suspended.iter().enumerate() {
            slot[n] = Some(s);
        }
        Self {
            diameters: config.diameters(),
            fall_velocity: config.fractions.iter().map(|f| f.fall_velocity).collect(),
            reference: config.reference(),
            suspended,
            slot,
            active_thickness: config.active_thickness,
            max_strata: config.max_strata,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.diameters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.diameters.is_empty()
    }

    #[inline]
    pub fn suspended_slots(&self) -> usize {
        self.suspended.len()
    }

    /// Fresh parcel at the reference composition for a column of
    /// `elevation` over `bedrock`.
    pub fn new_parcel(&self, elevation: f64, bedrock: f64) -> Parcel {
        let t = self.active_thickness;
        let layers = if is_nodata(bedrock) || t <= 0.0 {
            self.max_strata
        } else {
            let depth = elevation - bedrock - t;
            if depth <= 0.0 {
                0
            } else {
                ((depth / t).floor() as usize).min(self.max_strata)
            }
        };
        Parcel::with_reference(t, &self.reference, layers)
    }
}

/// Complete model state for one run.
#[derive(Debug, Clone)]
pub struct World {
    pub geometry: GridGeometry,
    pub grains: GrainSet,

    pub elev: Vec<f64>,
    pub bedrock: Vec<f64>,
    pub init_elev: Vec<f64>,

    pub depth: Vec<f64>,
    /// Discharge per unit width across the west face of each cell (+x).
    pub qx: Vec<f64>,
    /// Discharge per unit width across the north face of each cell (+y).
    pub qy: Vec<f64>,
    /// Face velocities matching `qx`/`qy`.
    pub ux: Vec<f64>,
    pub uy: Vec<f64>,
    pub vel: Vec<f64>,
    pub tau: Vec<f64>,

    pub area: Vec<f64>,
    /// Bank curvature length scale from the lateral pass.
    pub edge: Vec<f64>,

    pub veg_cover: Vec<f64>,
    pub veg_elev: Vec<f64>,
    pub roughness: Option<Vec<f64>>,
    pub zone: Vec<u16>,
    pub input_point: Vec<bool>,

    /// Suspended load as equivalent depth, `cell * slots + slot`.
    pub susp: Vec<f64>,
    pub qxs: Vec<f64>,
    pub qys: Vec<f64>,

    pub parcels: Vec<Option<Parcel>>,
    /// Loose dune sand thickness per cell.
    pub sand: Vec<f64>,

    pub active: ActiveExtent,
}

impl World {
    /// Builds the world from validated bootstrap data.
    pub fn from_bootstrap(bootstrap: &Bootstrap, config: &SedimentConfig) -> Result<Self, BootstrapError> {
        let grains = GrainSet::from_config(config);
        bootstrap.validate(grains.len())?;

        let geometry = bootstrap.geometry;
        let n = geometry.len();
        let slots = grains.suspended_slots();
        let bedrock = bootstrap.bedrock_or_default();
        let elev: Vec<f64> = bootstrap
            .elevation
            .iter()
            .zip(&bedrock)
            .map(|(&e, &b)| if is_nodata(e) || is_nodata(b) { e } else { e.max(b) })
            .collect();

        let mut parcels = vec![None; n];
        for record in &bootstrap.grain {
            let i = geometry.index(record.col, record.row);
            if is_nodata(elev[i]) {
                continue;
            }
            parcels[i] = Some(Parcel {
                active: record.active.clone(),
                strata: record.strata.clone(),
            });
        }

        let veg_cover = match &bootstrap.vegetation {
            Some(v) => v.iter().map(|c| c.clamp(0.0, 1.0)).collect(),
            None => {
                let cover = config.vegetation.as_ref().map_or(0.0, |v| v.initial_cover);
                vec![cover; n]
            }
        };

        Ok(Self {
            geometry,
            grains,
            init_elev: elev.clone(),
            veg_elev: elev.clone(),
            elev,
            bedrock,
            depth: vec![0.0; n],
            qx: vec![0.0; n],
            qy: vec![0.0; n],
            ux: vec![0.0; n],
            uy: vec![0.0; n],
            vel: vec![0.0; n],
            tau: vec![0.0; n],
            area: vec![0.0; n],
            edge: vec![0.0; n],
            veg_cover,
            roughness: bootstrap.roughness.clone(),
            zone: bootstrap.zones.clone().unwrap_or_else(|| vec![0; n]),
            input_point: vec![false; n],
            susp: vec![0.0; n * slots],
            qxs: vec![0.0; n * slots],
            qys: vec![0.0; n * slots],
            parcels,
            sand: bootstrap.sand.clone().unwrap_or_else(|| vec![0.0; n]),
            active: ActiveExtent::new(&geometry),
        })
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        !is_nodata(self.elev[i])
    }

    /// Manning's n at cell `i`.
    #[inline]
    pub fn manning(&self, i: usize, default: f64) -> f64 {
        self.roughness.as_ref().map_or(default, |r| r[i])
    }

    /// Sediment thickness between the tracked column and bedrock.
    pub fn untracked_depth(&self, i: usize) -> f64 {
        if is_nodata(self.bedrock[i]) {
            return self.grains.active_thickness;
        }
        let tracked = self.parcels[i].as_ref().map_or(0.0, Parcel::total);
        (self.elev[i] - self.bedrock[i] - tracked).max(0.0)
    }

    /// Parcel of cell `i`, created at the reference composition if absent.
    pub fn parcel_mut(&mut self, i: usize) -> &mut Parcel {
        let (elev, bedrock) = (self.elev[i], self.bedrock[i]);
        let grains = &self.grains;
        self.parcels[i].get_or_insert_with(|| grains.new_parcel(elev, bedrock))
    }

    /// Re-balances the active layer of cell `i` if it has a parcel.
    pub fn maintain_parcel(&mut self, i: usize) {
        let untracked = self.untracked_depth(i);
        let grains = &self.grains;
        if let Some(p) = self.parcels[i].as_mut() {
            p.maintain(grains.active_thickness, &grains.reference, grains.max_strata, untracked);
        }
    }

    /// Creates parcels for every active cell deeper than `threshold`, one
    /// rayon task per row. Each row only creates its own parcels, so the
    /// sediment passes that follow never allocate concurrently.
    pub fn prepare_parcels(&mut self, threshold: f64) {
        let cols = self.geometry.cols;
        let grains = &self.grains;
        let active = &self.active;
        let elev = &self.elev;
        let bedrock = &self.bedrock;
        let depth = &self.depth;
        self.parcels
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(y, row)| {
                for &x in active.row(y) {
                    let i = y * cols + x;
                    if row[x].is_none() && depth[i] > threshold && !is_nodata(elev[i]) {
                        row[x] = Some(grains.new_parcel(elev[i], bedrock[i]));
                    }
                }
            });
    }

    /// Moves `amount` metres of sediment from cell `from` to cell `to`,
    /// keeping per-fraction composition consistent. Material beyond the
    /// tracked column of `from` is supplied at the reference composition.
    /// Elevations are left to the caller.
    pub fn transfer_sediment(&mut self, from: usize, to: usize, amount: f64) {
        if amount <= 0.0 || from == to {
            return;
        }
        let source_tracked = self.parcels[from].is_some();
        let dest_tracked = self.parcels[to].is_some();
        if !source_tracked && !dest_tracked {
            return;
        }

        let moved = if source_tracked {
            self.parcel_mut(to);
            let (src, dst) = pair_mut(&mut self.parcels, from, to);
            match (src, dst) {
                (Some(src), Some(dst)) => src.give_to(dst, amount),
                _ => 0.0,
            }
        } else {
            0.0
        };

        let remainder = amount - moved;
        if remainder > 0.0 {
            let reference = self.grains.reference.clone();
            self.parcel_mut(to).deposit(remainder, &reference);
        }
        self.maintain_parcel(from);
        self.maintain_parcel(to);
    }

    /// Median grain size of cell `i`'s active layer, or the reference
    /// median for untracked cells.
    pub fn d50(&self, i: usize) -> f64 {
        match &self.parcels[i] {
            Some(p) => p.d50(&self.grains.diameters),
            None => {
                Parcel::with_reference(1.0, &self.grains.reference, 0).d50(&self.grains.diameters)
            }
        }
    }

    /// Total standing water volume (m^3).
    pub fn water_volume(&self) -> f64 {
        self.depth.iter().sum::<f64>() * self.geometry.cell_area()
    }

    /// Suspended load in cell `i` summed over slots.
    pub fn suspended_total(&self, i: usize) -> f64 {
        let s = self.grains.suspended_slots();
        self.susp[i * s..(i + 1) * s].iter().sum()
    }

    /// Number of valid cells in each rainfall zone.
    pub fn zone_cell_counts(&self, zones: usize) -> Vec<usize> {
        let mut counts = vec![0; zones];
        for (i, &z) in self.zone.iter().enumerate() {
            if self.is_valid(i) && (z as usize) < zones {
                counts[z as usize] += 1;
            }
        }
        counts
    }
}

/// Two distinct mutable elements of a slice.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = items.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = items.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}
