//! Grid snapshots and the sink that receives model output.

use super::summary::SummaryRecord;
use crate::grid::{GridGeometry, World, NODATA};

/// One named full-grid raster.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub values: Vec<f64>,
}

/// Every output raster at one moment of the run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// 1-based snapshot counter.
    pub index: u64,
    /// Simulated time (s).
    pub time: f64,
    pub iteration: u64,
    pub geometry: GridGeometry,
    pub layers: Vec<Layer>,
}

impl Snapshot {
    /// Copies depth, elevation difference, elevation, d50, velocity and the
    /// active-layer share of each grain fraction out of `world`.
    pub fn capture(world: &World, index: u64, time: f64, iteration: u64) -> Self {
        let g = world.geometry;
        let n = g.len();
        let valid = |i: usize| world.is_valid(i);
        let masked = |f: &dyn Fn(usize) -> f64| -> Vec<f64> {
            (0..n).map(|i| if valid(i) { f(i) } else { NODATA }).collect()
        };

        let mut layers = vec![
            Layer {
                name: "depth".into(),
                values: masked(&|i| world.depth[i]),
            },
            Layer {
                name: "elevation_difference".into(),
                values: masked(&|i| world.elev[i] - world.init_elev[i]),
            },
            Layer {
                name: "elevation".into(),
                values: world.elev.clone(),
            },
            Layer {
                name: "d50".into(),
                values: masked(&|i| world.d50(i)),
            },
            Layer {
                name: "velocity".into(),
                values: masked(&|i| world.vel[i]),
            },
        ];

        let reference = &world.grains.reference;
        for fraction in 0..world.grains.len() {
            let share = |i: usize| match &world.parcels[i] {
                Some(p) => {
                    let total = p.active_total();
                    if total > 0.0 {
                        p.active[fraction].max(0.0) / total
                    } else {
                        0.0
                    }
                }
                None => reference[fraction],
            };
            layers.push(Layer {
                name: format!("fraction_{fraction}"),
                values: masked(&share),
            });
        }

        Self {
            index,
            time,
            iteration,
            geometry: g,
            layers,
        }
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }
}

/// Caller-owned destination for snapshots and summary records.
pub trait SnapshotSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), Self::Error>;

    fn write_summary(&mut self, record: &SummaryRecord) -> Result<(), Self::Error>;
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl SnapshotSink for DiscardSink {
    type Error = std::convert::Infallible;

    fn write_snapshot(&mut self, _snapshot: &Snapshot) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write_summary(&mut self, _record: &SummaryRecord) -> Result<(), Self::Error> {
        Ok(())
    }
}
