//! Reach-mode point inflows of water and sediment.

use super::config::ReachConfig;
use super::series::{PointSource, SeriesError, SEDIMENT_CHANNEL, WATER_CHANNEL};
use super::InputTally;
use crate::grid::World;

/// Share of the erosion-rate cap a single point may inject per step.
const POINT_CAP_SHARE: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct ReachInput {
    points: Vec<PointSource>,
    cells: Vec<usize>,
    recirculate: Option<f64>,
    /// Exported sediment (m^3 per fraction) waiting to be fed back in.
    pending: Vec<f64>,
}

impl ReachInput {
    pub fn new(config: ReachConfig, world: &mut World) -> Result<Self, SeriesError> {
        let g = world.geometry;
        let mut cells = Vec::with_capacity(config.points.len());
        for p in &config.points {
            if p.col >= g.cols || p.row >= g.rows {
                return Err(SeriesError::PointOutOfBounds(p.col, p.row));
            }
            p.table.validate("reach point", WATER_CHANNEL + 1)?;
            let i = g.index(p.col, p.row);
            world.input_point[i] = true;
            cells.push(i);
        }
        Ok(Self {
            points: config.points,
            cells,
            recirculate: config.recirculate.map(|r| r.clamp(0.0, 1.0)),
            pending: vec![0.0; world.grains.len()],
        })
    }

    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Queues a share of this step's exported sediment for re-injection.
    pub fn recirculate(&mut self, exported: &[f64]) {
        if let Some(share) = self.recirculate {
            for (p, e) in self.pending.iter_mut().zip(exported) {
                *p += e * share;
            }
        }
    }

    /// Adds interpolated discharge and sediment for a step of `dt` seconds
    /// ending at `time`.
    pub fn inject(&mut self, world: &mut World, time: f64, dt: f64, erode_cap: f64) -> InputTally {
        let fractions = world.grains.len();
        let slots = world.grains.suspended_slots();
        let cell_area = world.geometry.cell_area();
        let mut tally = InputTally::new(fractions);
        if self.points.is_empty() {
            return tally;
        }
        let valid = self.cells.iter().filter(|&&i| world.is_valid(i)).count();
        if valid == 0 {
            return tally;
        }
        let share = 1.0 / valid as f64;
        let mut amounts = vec![0.0; fractions];
        // Recirculated volume actually released, per fraction (m^3).
        let mut released = vec![0.0; fractions];

        for (p, &i) in self.points.iter().zip(&self.cells) {
            if !world.is_valid(i) {
                continue;
            }
            let water = p.water(time) * dt;
            world.depth[i] += water / cell_area;
            tally.water += water;

            let has_sediment = p.table.width() > SEDIMENT_CHANNEL || self.pending.iter().any(|v| *v > 0.0);
            if !has_sediment {
                continue;
            }
            for (n, a) in amounts.iter_mut().enumerate() {
                *a = (p.sediment(time, n) * dt + self.pending[n] * share) / cell_area;
            }
            let total: f64 = amounts.iter().sum();
            let limit = POINT_CAP_SHARE * erode_cap;
            let scale = if total > limit { limit / total } else { 1.0 };
            if scale < 1.0 {
                amounts.iter_mut().for_each(|a| *a *= scale);
            }
            for (r, p) in released.iter_mut().zip(&self.pending) {
                *r += p * share * scale;
            }

            let mut bed = 0.0;
            for (n, &a) in amounts.iter().enumerate() {
                if a <= 0.0 {
                    continue;
                }
                tally.sediment[n] += a * cell_area;
                match world.grains.slot[n] {
                    Some(s) => world.susp[i * slots + s] += a,
                    None => {
                        world.parcel_mut(i).active[n] += a;
                        bed += a;
                    }
                }
            }
            if bed > 0.0 {
                world.elev[i] += bed;
                world.maintain_parcel(i);
            }
        }
        // Whatever the cap held back waits for the next step.
        for (p, r) in self.pending.iter_mut().zip(&released) {
            *p = (*p - r).max(0.0);
        }
        tally
    }
}
