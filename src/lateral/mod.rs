//! Channel curvature for lateral bank erosion.

pub mod config;
pub mod curvature;

pub use config::LateralConfig;
pub use curvature::update_curvature;
