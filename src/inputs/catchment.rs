//! Catchment hydrology: a TOPMODEL-style nonlinear reservoir per rainfall
//! zone feeding diffuse input cells picked by drainage area, or one
//! reservoir per cell feeding that cell directly.

use rayon::prelude::*;
use tracing::{debug, info};

use super::config::{CatchmentConfig, RunoffLayout};
use super::series::SeriesError;
use super::InputTally;
use crate::drainage::accumulate_drainage;
use crate::grid::World;

/// Closed-form reservoir solution over one interval of `dt` seconds.
///
/// Returns `(j_end, j_mean)`: the discharge at the end of the interval and
/// its mean over the interval, both in m/s per unit area.
pub fn reservoir_step(rain: f64, jo: f64, m: f64, dt: f64) -> (f64, f64) {
    if m <= 0.0 || dt <= 0.0 {
        return (jo, jo.max(0.0));
    }
    let jo = jo.max(f64::MIN_POSITIVE);
    let (j, mean) = if rain <= 0.0 {
        let j = jo / (1.0 + jo * dt / m);
        let mean = m / dt * (1.0 + jo * dt / m).ln();
        (j, mean)
    } else {
        let j = rain / (((rain - jo) / jo) * (-rain * dt / m).exp() + 1.0);
        let mean = m / dt * (((rain - jo) + jo * (rain * dt / m).exp()) / rain).ln();
        (j, mean)
    };
    (j, mean.max(0.0))
}

/// Running state of the catchment hydrology.
///
/// Each reservoir unit is a rainfall zone in [`RunoffLayout::Zoned`] mode
/// and a single valid cell in [`RunoffLayout::Distributed`] mode.
#[derive(Debug, Clone)]
pub struct CatchmentHydrology {
    config: CatchmentConfig,
    zones: usize,
    /// Rainfall zone of each unit.
    unit_zone: Vec<usize>,
    /// Cell of each unit; empty when zoned.
    unit_cell: Vec<usize>,
    j: Vec<f64>,
    old_mean: Vec<f64>,
    new_mean: Vec<f64>,
    /// Current interpolated mean discharge per unit (m/s).
    pub j_mean: Vec<f64>,
    /// End of the last solved reservoir interval (s).
    solved_until: f64,
    pub baseflow: f64,
    zone_cells: Vec<usize>,
    input_counts: Vec<usize>,
    inputs: Vec<usize>,
}

impl CatchmentHydrology {
    /// Validates the tables, computes drainage area and the first set of
    /// input cells.
    pub fn new(config: CatchmentConfig, world: &mut World) -> Result<Self, SeriesError> {
        config.rainfall.validate("rainfall", 1)?;
        if let Some(m) = &config.m_values {
            m.validate("m_values", 1)?;
        }
        let zones = world
            .zone
            .iter()
            .map(|&z| z as usize + 1)
            .max()
            .unwrap_or(1)
            .max(config.rainfall.width().max(1));

        let (unit_zone, unit_cell): (Vec<usize>, Vec<usize>) = match config.runoff {
            RunoffLayout::Zoned => ((0..zones).collect(), Vec::new()),
            RunoffLayout::Distributed => (0..world.geometry.len())
                .filter(|&i| world.is_valid(i))
                .map(|i| ((world.zone[i] as usize).min(zones - 1), i))
                .unzip(),
        };
        let units = unit_zone.len();

        let zone_cells = world.zone_cell_counts(zones);
        let mut hydrology = Self {
            zones,
            unit_zone,
            unit_cell,
            j: vec![config.initial_discharge; units],
            old_mean: vec![0.0; units],
            new_mean: vec![0.0; units],
            j_mean: vec![0.0; units],
            solved_until: 0.0,
            baseflow: config.baseflow,
            zone_cells,
            input_counts: vec![0; zones],
            inputs: Vec::new(),
            config,
        };
        accumulate_drainage(world);
        hydrology.find_input_points(world);
        Ok(hydrology)
    }

    pub fn layout(&self) -> RunoffLayout {
        self.config.runoff
    }

    /// Cells currently marked as diffuse catchment inputs.
    pub fn input_points(&self) -> &[usize] {
        &self.inputs
    }

    /// Number of valid cells a unit's mean discharge stands for.
    fn unit_weight(&self, k: usize) -> f64 {
        match self.config.runoff {
            RunoffLayout::Zoned => self.zone_cells[k] as f64,
            RunoffLayout::Distributed => 1.0,
        }
    }

    /// Expected catchment discharge (m^3/s) from the current mean rates.
    pub fn expected_discharge(&self, cell_area: f64) -> f64 {
        self.j_mean
            .iter()
            .enumerate()
            .map(|(k, j)| j * self.unit_weight(k) * cell_area)
            .sum()
    }

    /// Marks cells whose `area * baseflow * 3 * dx^2` falls inside the
    /// configured band.
    pub fn find_input_points(&mut self, world: &mut World) {
        for &i in &self.inputs {
            world.input_point[i] = false;
        }
        self.inputs.clear();
        self.input_counts.iter_mut().for_each(|c| *c = 0);

        let cell_area = world.geometry.cell_area();
        for i in 0..world.geometry.len() {
            if !world.is_valid(i) {
                continue;
            }
            let q = world.area[i] * self.baseflow * 3.0 * cell_area;
            if q > self.config.min_input_discharge && q < self.config.max_input_discharge {
                let z = (world.zone[i] as usize).min(self.zones - 1);
                self.input_counts[z] += 1;
                self.inputs.push(i);
                world.input_point[i] = true;
            }
        }
        info!(points = self.inputs.len(), baseflow = self.baseflow, "catchment input points");
    }

    fn m_value(&self, time: f64, zone: usize) -> f64 {
        match &self.config.m_values {
            Some(table) => table.value_at(time, zone),
            None => self.config.m_value,
        }
    }

    /// Solves every unit's reservoir over the interval starting at `start`.
    fn solve_interval(&mut self, start: f64) {
        let dt = self.config.hydro_step;
        let rain: Vec<f64> = (0..self.zones)
            .map(|z| {
                let mm_per_hour = self.config.rainfall.value_at(start, z).max(0.0);
                self.config.rain_factor * (mm_per_hour / 1000.0) / 3600.0
            })
            .collect();
        let m: Vec<f64> = (0..self.zones).map(|z| self.m_value(start, z)).collect();

        let unit_zone = &self.unit_zone;
        self.j
            .par_iter_mut()
            .zip(self.old_mean.par_iter_mut())
            .zip(self.new_mean.par_iter_mut())
            .enumerate()
            .for_each(|(k, ((j, old), new))| {
                let z = unit_zone[k];
                *old = *new;
                let (next, mean) = reservoir_step(rain[z], *j, m[z], dt);
                *j = next;
                *new = mean;
            });
    }

    /// Injects water for a step of `dt` seconds ending at `time`, then
    /// advances the reservoir and retunes baseflow.
    ///
    /// # Arguments
    /// * `world` - Model state; depths at input cells are raised
    /// * `time` - Simulated time after this step (s)
    /// * `dt` - Routing step (s)
    /// * `cap` - Largest depth added to one cell in one step (m)
    pub fn advance(&mut self, world: &mut World, time: f64, dt: f64, cap: f64) -> InputTally {
        let mut tally = InputTally::default();
        let cell_area = world.geometry.cell_area();

        match self.config.runoff {
            RunoffLayout::Zoned => {
                for &i in &self.inputs {
                    let z = (world.zone[i] as usize).min(self.zones - 1);
                    let count = self.input_counts[z];
                    if count == 0 {
                        continue;
                    }
                    let add = (self.j_mean[z] * self.zone_cells[z] as f64 / count as f64 * dt).min(cap);
                    world.depth[i] += add;
                    tally.water += add * cell_area;
                }
            }
            RunoffLayout::Distributed => {
                for (&i, &j) in self.unit_cell.iter().zip(&self.j_mean) {
                    let add = (j * dt).min(cap);
                    world.depth[i] += add;
                    tally.water += add * cell_area;
                }
            }
        }

        let step = self.config.hydro_step;
        while time >= self.solved_until {
            let start = self.solved_until;
            self.solve_interval(start);
            self.solved_until += step;
        }
        let frac = (1.0 - (self.solved_until - time) / step).clamp(0.0, 1.0);
        for ((mean, old), new) in self.j_mean.iter_mut().zip(&self.old_mean).zip(&self.new_mean) {
            *mean = old + (new - old) * frac;
        }

        if self.config.discharge_table {
            for (mean, &z) in self.j_mean.iter_mut().zip(&self.unit_zone) {
                let cells = self.zone_cells[z];
                if cells > 0 {
                    let q = self.config.rainfall.value_at(time, z);
                    *mean = (q / cell_area / cells as f64).max(0.0);
                }
            }
        }

        self.retune_baseflow(world);
        tally
    }

    fn retune_baseflow(&mut self, world: &mut World) {
        let peak = self.j_mean.iter().copied().fold(0.0, f64::max);
        let mut changed = false;
        if peak >= self.baseflow {
            self.baseflow *= 3.0;
            changed = true;
        }
        if self.baseflow > peak * 3.0 && self.baseflow > 1e-7 {
            self.baseflow = peak * 1.25;
            changed = true;
        }
        if changed {
            debug!(baseflow = self.baseflow, peak, "baseflow retuned");
            accumulate_drainage(world);
            self.find_input_points(world);
        }
    }
}
