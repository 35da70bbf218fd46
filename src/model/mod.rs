//! Main loop: owns the world, the inputs and every sub-model, and advances
//! them in a fixed order each iteration.

pub mod clock;
pub mod config;
pub mod schedule;
pub mod snapshot;
pub mod summary;

pub use clock::Clock;
pub use config::{ConfigError, ModelConfig, RunConfig};
pub use schedule::{Cadence, ProcessId, Schedule};
pub use snapshot::{DiscardSink, Layer, Snapshot, SnapshotSink};
pub use summary::{SummaryAccumulator, SummaryRecord};

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::drainage::accumulate_drainage;
use crate::dune::DuneField;
use crate::grid::{Bootstrap, BootstrapError, World};
use crate::hydro::{drain_edges, evaporate, refresh_active_extent, route_suspended, route_water, update_depths};
use crate::inputs::{CatchmentHydrology, InputTally, ReachInput, SeriesError, TidalInput};
use crate::lateral::update_curvature;
use crate::sediment::{erode, erode_multiplier};
use crate::slope::{creep, develop_soil, siberia, slide_active, slide_whole_grid, soil_erosion};

/// Iterations between active-extent rebuilds.
const ACTIVE_EXTENT_INTERVAL: u64 = 5;
/// Lateral curvature runs every `LATERAL_FACTOR * erode multiplier`
/// iterations.
const LATERAL_FACTOR: u64 = 50;

/// Errors raised while setting up a model. Nothing fails once running.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Counters readable between iterations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Telemetry {
    pub iteration: u64,
    /// Simulated time (s).
    pub time: f64,
    /// Model step of the last iteration (s).
    pub step: f64,
    /// Outflow discharge of the last iteration (m^3/s).
    pub discharge: f64,
    /// Sediment exported during the last iteration (m^3).
    pub sediment_yield: f64,
    pub erode_multiplier: u32,
    /// Cumulative water injected (m^3).
    pub water_in: f64,
    /// Cumulative water drained across the edges (m^3).
    pub water_out: f64,
    pub water_evaporated: f64,
    pub sediment_in: f64,
    pub sediment_out: f64,
    /// Dune sand blown off the grid (m^3).
    pub sand_out: f64,
}

pub struct Model {
    config: ModelConfig,
    world: World,
    clock: Clock,
    schedule: Schedule,
    catchment: Option<CatchmentHydrology>,
    reach: Option<ReachInput>,
    tidal: Option<TidalInput>,
    dune: Option<DuneField>,
    summary: SummaryAccumulator,
    snapshots: Option<Cadence>,
    snapshot_index: u64,
    erode_mult: u32,
    next_erosion: u64,
    next_lateral: u64,
    imbalance: f64,
    telemetry: Telemetry,
}

impl Model {
    /// Validates `config`, builds the world from `bootstrap` and sets up
    /// the enabled inputs and sub-models.
    pub fn new(config: ModelConfig, bootstrap: &Bootstrap) -> Result<Self, ModelError> {
        config.validate()?;
        let mut world = World::from_bootstrap(bootstrap, &config.sediment)?;

        let catchment = match config.inputs.catchment.clone() {
            Some(c) => Some(CatchmentHydrology::new(c, &mut world)?),
            None => {
                accumulate_drainage(&mut world);
                None
            }
        };
        let reach = match config.inputs.reach.clone() {
            Some(r) => Some(ReachInput::new(r, &mut world)?),
            None => None,
        };
        let tidal = match config.inputs.tidal.clone() {
            Some(t) => Some(TidalInput::new(t, &world)?),
            None => None,
        };
        refresh_active_extent(&mut world);

        let dune = config.dune.clone().map(|d| DuneField::new(&world, d));
        let schedule = Schedule::new(&config.slope, config.hydro.evaporation_rate > 0.0);
        let summary = SummaryAccumulator::new(config.run.summary_interval_seconds(), world.grains.len());
        let snapshots = config
            .run
            .snapshot_interval_hours
            .map(|h| Cadence::new(h * 3600.0, h * 3600.0));

        let g = world.geometry;
        info!(
            cols = g.cols,
            rows = g.rows,
            cell_size = g.cell_size,
            fractions = world.grains.len(),
            law = config.sediment.law.name(),
            flow_only = config.run.flow_only,
            "model initialised"
        );

        Ok(Self {
            clock: Clock::new(config.hydro.initial_step),
            config,
            world,
            schedule,
            catchment,
            reach,
            tidal,
            dune,
            summary,
            snapshots,
            snapshot_index: 0,
            erode_mult: 1,
            next_erosion: 0,
            next_lateral: 0,
            imbalance: 0.0,
            telemetry: Telemetry::default(),
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn is_finished(&self) -> bool {
        self.clock.time >= self.config.run.duration_seconds()
    }

    /// Advances the model by one iteration and hands any due output to
    /// `sink`.
    pub fn step<S: SnapshotSink>(&mut self, sink: &mut S) -> Result<(), S::Error> {
        let hydro = &self.config.hydro;
        let sediment = &self.config.sediment;
        let world = &mut self.world;
        let g = world.geometry;
        let fractions = world.grains.len();

        let routing = self.clock.next_step(hydro, g.cell_size, self.imbalance);
        let start = self.clock.time;
        self.clock.advance();
        let time = self.clock.time;
        let iteration = self.clock.iteration;

        if let Some(dune) = &mut self.dune {
            if let Some(out) = dune.advance(world, time, hydro.depth_threshold) {
                self.telemetry.sand_out += out.exported;
            }
        }

        let mut injected = InputTally::new(fractions);
        let mut expected = 0.0;
        if let Some(reach) = &mut self.reach {
            let tally = reach.inject(world, time, routing, sediment.erode_cap);
            expected += tally.water / routing;
            injected.absorb(&tally);
        }
        if let Some(catchment) = &mut self.catchment {
            injected.absorb(&catchment.advance(world, time, routing, sediment.erode_cap));
            expected += catchment.expected_discharge(g.cell_area());
        }
        if let Some(tidal) = &self.tidal {
            injected.absorb(&tidal.apply(world, time, hydro.depth_threshold));
        }

        route_water(world, hydro, routing);
        route_suspended(world, hydro, routing);
        self.clock.max_depth = update_depths(world, routing);
        if iteration % ACTIVE_EXTENT_INTERVAL == 0 {
            refresh_active_extent(world);
        }

        let mut exported = vec![0.0; fractions];
        if !self.config.run.flow_only {
            if iteration >= self.next_erosion {
                let outcome = erode(world, sediment, hydro, &mut self.clock.step, self.erode_mult as f64);
                self.erode_mult = erode_multiplier(outcome.max_erosion, sediment.erode_cap);
                self.next_erosion = iteration + self.erode_mult as u64;
                exported = outcome.exported;
                if let Some(reach) = &mut self.reach {
                    reach.recirculate(&exported);
                }
            }
            if iteration >= self.next_lateral {
                update_curvature(world, &self.config.lateral, hydro.depth_threshold);
                self.next_lateral = iteration + LATERAL_FACTOR * self.erode_mult as u64;
            }
        }

        let drained = drain_edges(world, hydro.depth_threshold);
        let out_rate = drained / routing;
        self.imbalance = (injected.water / routing - out_rate).abs();

        let slope = &self.config.slope;
        if let Some(slide) = &slope.landslide {
            if iteration % slide.active_interval == 0 {
                slide_active(world, slide);
            }
        }
        let mut evaporated = 0.0;
        for id in self.schedule.due(time) {
            let moved = match id {
                ProcessId::Evaporation => {
                    let volume = evaporate(world, hydro.evaporation_rate);
                    evaporated += volume;
                    volume
                }
                ProcessId::Creep => slope.creep.as_ref().map_or(0.0, |c| creep(world, c)),
                ProcessId::SoilErosion => slope.soil_erosion.as_ref().map_or(0.0, |c| soil_erosion(world, c)),
                ProcessId::Siberia => slope.siberia.as_ref().map_or(0.0, |c| siberia(world, c)),
                ProcessId::WholeGridSlide => slope
                    .landslide
                    .as_ref()
                    .map_or(0.0, |c| slide_whole_grid(world, c, sediment.erode_cap).0),
                ProcessId::SoilDevelopment => {
                    if let Some(c) = &slope.soil_development {
                        develop_soil(world, c);
                    }
                    0.0
                }
            };
            debug!(process = id.name(), moved, time, "periodic process");
        }

        let yield_now: f64 = exported.iter().sum();
        let t = &mut self.telemetry;
        t.iteration = iteration;
        t.time = time;
        t.step = self.clock.step;
        t.discharge = out_rate;
        t.sediment_yield = yield_now;
        t.erode_multiplier = self.erode_mult;
        t.water_in += injected.water;
        t.water_out += drained;
        t.water_evaporated += evaporated;
        t.sediment_in += injected.sediment.iter().sum::<f64>();
        t.sediment_out += yield_now;

        for record in self.summary.record(start, time, out_rate, expected, &exported) {
            sink.write_summary(&record)?;
        }
        if let Some(cadence) = &mut self.snapshots {
            if cadence.fire(time) {
                self.snapshot_index += 1;
                let snapshot = Snapshot::capture(&self.world, self.snapshot_index, time, iteration);
                sink.write_snapshot(&snapshot)?;
            }
        }
        Ok(())
    }

    /// Steps until the configured duration is reached or `halt` is set.
    pub fn run<S: SnapshotSink>(&mut self, halt: &AtomicBool, sink: &mut S) -> Result<Telemetry, S::Error> {
        info!(hours = self.config.run.duration_hours, "run started");
        while !self.is_finished() {
            if halt.load(Ordering::Relaxed) {
                info!(iteration = self.clock.iteration, time = self.clock.time, "run halted");
                break;
            }
            self.step(sink)?;
        }
        let t = &self.telemetry;
        info!(
            iterations = t.iteration,
            time = t.time,
            water_out = t.water_out,
            sediment_out = t.sediment_out,
            "run finished"
        );
        Ok(self.telemetry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{PointSource, ReachConfig, StepTable};
    use crate::slope::SlopeConfig;

    fn point(col: usize, row: usize, water: f64) -> PointSource {
        PointSource {
            col,
            row,
            table: StepTable::new(3600.0, vec![vec![0.0, water, 0.0, 0.0, 0.0]]),
        }
    }

    fn flow_only(source: PointSource) -> ModelConfig {
        let mut config = ModelConfig::default();
        config.run.flow_only = true;
        config.slope = SlopeConfig::disabled();
        config.inputs.reach = Some(ReachConfig {
            points: vec![source],
            recirculate: None,
        });
        config
    }

    fn stored_water(w: &World) -> f64 {
        w.water_volume()
    }

    #[derive(Default)]
    struct Collect {
        summaries: Vec<SummaryRecord>,
        snapshots: Vec<Snapshot>,
    }

    impl SnapshotSink for Collect {
        type Error = std::convert::Infallible;

        fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), Self::Error> {
            self.snapshots.push(snapshot.clone());
            Ok(())
        }

        fn write_summary(&mut self, record: &SummaryRecord) -> Result<(), Self::Error> {
            self.summaries.push(record.clone());
            Ok(())
        }
    }

    #[test]
    fn test_flow_only_mass_balance() {
        let bootstrap = Bootstrap::flat(10, 10, 1.0, 0.0);
        let mut model = Model::new(flow_only(point(5, 5, 0.01)), &bootstrap).unwrap();
        let mut sink = DiscardSink;
        for _ in 0..400 {
            model.step(&mut sink).unwrap();
            let t = model.telemetry();
            let stored = stored_water(model.world());
            let error = stored + t.water_out - t.water_in;
            assert!(error.abs() < 1e-9 * t.water_in.max(1.0), "imbalance {error}");
        }
        let t = model.telemetry();
        assert!(t.water_in > 0.0);
        assert!(model.world().depth.iter().all(|d| *d >= 0.0));
        assert_eq!(model.world().elev, model.world().init_elev);
    }

    #[test]
    fn test_flow_only_run_drains_to_edges() {
        let bootstrap = Bootstrap::flat(10, 10, 1.0, 0.0);
        let mut config = flow_only(point(5, 5, 0.05));
        config.run.duration_hours = 0.5;
        let mut model = Model::new(config, &bootstrap).unwrap();
        let halt = AtomicBool::new(false);
        let t = model.run(&halt, &mut DiscardSink).unwrap();
        assert!(model.is_finished());
        assert!(t.water_out > 0.0);
        assert!(t.time >= 1800.0);
    }

    #[test]
    fn test_routing_respects_courant_bound() {
        let bootstrap = Bootstrap::flat(8, 8, 2.0, 0.0);
        let mut model = Model::new(flow_only(point(4, 4, 0.0)), &bootstrap).unwrap();
        model.world_mut().depth.iter_mut().for_each(|d| *d = 1.5);
        model.clock.max_depth = 1.5;
        let hydro = model.config().hydro.clone();
        for _ in 0..20 {
            let mut lookahead = model.clock.clone();
            let routing = lookahead.next_step(&hydro, 2.0, 0.0);
            let limit = hydro.courant * 2.0 / (hydro.gravity * lookahead.max_depth.max(0.1)).sqrt();
            assert!(routing <= limit + 1e-12);
            model.step(&mut DiscardSink).unwrap();
            assert!(model.telemetry().time <= model.clock().time);
        }
    }

    #[test]
    fn test_halt_flag_stops_before_first_step() {
        let bootstrap = Bootstrap::flat(6, 6, 1.0, 0.0);
        let mut model = Model::new(flow_only(point(3, 3, 0.01)), &bootstrap).unwrap();
        let halt = AtomicBool::new(true);
        let t = model.run(&halt, &mut DiscardSink).unwrap();
        assert_eq!(t.iteration, 0);
        assert_eq!(model.clock().time, 0.0);
    }

    #[test]
    fn test_summaries_and_snapshots_reach_sink() {
        let bootstrap = Bootstrap::flat(8, 8, 1.0, 0.0);
        let mut config = flow_only(point(4, 4, 0.02));
        config.run.duration_hours = 0.1;
        config.run.summary_interval_minutes = 1.0;
        config.run.snapshot_interval_hours = Some(0.05);
        let mut model = Model::new(config, &bootstrap).unwrap();
        let mut sink = Collect::default();
        model.run(&AtomicBool::new(false), &mut sink).unwrap();

        assert!(sink.summaries.len() >= 5);
        assert_eq!(sink.summaries[0].index, 1);
        assert!(!sink.snapshots.is_empty());
        let snap = &sink.snapshots[0];
        assert!(snap.layer("depth").is_some());
        assert!(snap.layer("fraction_0").is_some());
    }

    #[test]
    fn test_sediment_run_keeps_state_physical() {
        let mut bootstrap = Bootstrap::flat(14, 7, 1.0, 0.0);
        for (i, e) in bootstrap.elevation.iter_mut().enumerate() {
            *e = 5.0 - 0.02 * (i % 14) as f64;
        }
        bootstrap.bedrock = Some(vec![3.0; 14 * 7]);
        let mut config = ModelConfig::default();
        config.inputs.reach = Some(ReachConfig {
            points: vec![point(1, 3, 0.2)],
            recirculate: None,
        });
        let mut model = Model::new(config, &bootstrap).unwrap();
        for _ in 0..300 {
            model.step(&mut DiscardSink).unwrap();
        }
        let w = model.world();
        assert!(w.depth.iter().all(|d| *d >= 0.0 && d.is_finite()));
        assert!(w.susp.iter().all(|s| *s >= 0.0));
        for (e, b) in w.elev.iter().zip(&w.bedrock) {
            assert!(e.is_finite());
            assert!(*e >= *b - 1e-9);
        }
        assert!(model.telemetry().erode_multiplier >= 1);
    }

    #[test]
    fn test_bad_point_is_a_setup_error() {
        let bootstrap = Bootstrap::flat(6, 6, 1.0, 0.0);
        let err = Model::new(flow_only(point(10, 1, 0.01)), &bootstrap);
        assert!(matches!(err, Err(ModelError::Series(_))));
    }
}
