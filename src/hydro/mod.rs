//! Hydrodynamic routing: face discharges, depth update, edge outflow.

pub mod config;
pub mod route;

pub use config::HydroConfig;
pub use route::{
    courant_limit, drain_edges, evaporate, refresh_active_extent, route_suspended, route_water,
    update_depths,
};
