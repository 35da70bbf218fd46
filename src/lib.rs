//! Cellular landscape evolution model for catchments and river reaches.
//!
//! A run couples an explicit shallow-water flow router with multi-fraction
//! sediment transport, lateral bank erosion, hillslope processes and an
//! optional aeolian dune field on one raster grid.

pub mod grid;
pub mod drainage;
pub mod hydro;
pub mod inputs;
pub mod sediment;
pub mod lateral;
pub mod slope;
pub mod dune;
pub mod model;
pub mod export;

pub use grid::{Bootstrap, GridGeometry, World};
pub use hydro::HydroConfig;
pub use inputs::{CatchmentConfig, InputConfig, ReachConfig, TidalConfig};
pub use sediment::{SedimentConfig, TransportLaw};
pub use dune::DuneConfig;
pub use model::{Model, ModelConfig, ModelError, SnapshotSink, Telemetry};
pub use export::{DirectorySink, ExportError, RawFormat};
