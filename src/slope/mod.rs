//! Hillslope and soil processes: creep, landslides, SIBERIA stream-power
//! erosion, soil erosion and soil development.

pub mod config;
pub mod diffusion;
pub mod landslide;
pub mod siberia;
pub mod soil;

pub use config::{
    BedrockLowering, CreepConfig, LandslideConfig, PhysicalWeathering, SiberiaConfig, SlopeConfig,
    SoilDevelopmentConfig, SoilErosionConfig,
};
pub use diffusion::{apply_transfers, creep, downslope_transfers, soil_erosion, Transfer, DAY_IN_YEARS};
pub use landslide::{slide_active, slide_whole_grid};
pub use siberia::siberia;
pub use soil::{bedrock_lowering, develop_soil};
