//! Grid state: geometry, per-cell arrays, sediment parcels and the
//! active-extent cache.

pub mod active;
pub mod bootstrap;
pub mod geometry;
pub mod parcel;
pub mod world;

pub use active::ActiveExtent;
pub use bootstrap::{Bootstrap, BootstrapError, GrainRecord};
pub use geometry::{is_nodata, Cardinal, GridGeometry, NEIGHBORS_8, NODATA};
pub use parcel::Parcel;
pub use world::{GrainSet, World};
