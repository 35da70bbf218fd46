//! Stage-driven (tidal) flooding of a rectangular boundary region.

use super::config::TidalConfig;
use super::series::SeriesError;
use super::InputTally;
use crate::grid::World;

#[derive(Debug, Clone)]
pub struct TidalInput {
    config: TidalConfig,
}

impl TidalInput {
    pub fn new(config: TidalConfig, world: &World) -> Result<Self, SeriesError> {
        let g = world.geometry;
        if config.max_col >= g.cols || config.max_row >= g.rows {
            return Err(SeriesError::PointOutOfBounds(config.max_col, config.max_row));
        }
        config.stage.validate("stage", 1)?;
        Ok(Self { config })
    }

    /// Interpolated stage at `time`.
    pub fn stage(&self, time: f64) -> f64 {
        self.config.stage.interpolate(time, 0)
    }

    /// Raises water in the region up to the stage wherever the stage is
    /// above the bed. Cells that were dry get the nominal suspended
    /// concentration.
    pub fn apply(&self, world: &mut World, time: f64, threshold: f64) -> InputTally {
        let stage = self.stage(time);
        let g = world.geometry;
        let slots = world.grains.suspended_slots();
        let cell_area = g.cell_area();
        let mut tally = InputTally::new(world.grains.len());
        let c = &self.config;

        for y in c.min_row..=c.max_row {
            for x in c.min_col..=c.max_col {
                let i = g.index(x, y);
                if !world.is_valid(i) || stage <= world.elev[i] {
                    continue;
                }
                let target = stage - world.elev[i];
                let current = world.depth[i];
                if current >= target {
                    continue;
                }
                if current <= threshold && slots > 0 {
                    let seeded = target * c.initial_concentration;
                    let s = &mut world.susp[i * slots];
                    if *s < seeded {
                        tally.sediment[world.grains.suspended[0]] += (seeded - *s) * cell_area;
                        *s = seeded;
                    }
                }
                tally.water += (target - current) * cell_area;
                world.depth[i] = target;
            }
        }
        tally
    }
}
