//! Multi-fraction fluvial sediment transport.

pub mod bank;
pub mod capacity;
pub mod config;
pub mod transport;

pub use bank::bank_transfer;
pub use capacity::{bedrock_incision, shear_stress};
pub use config::{
    default_fractions, BankConfig, BedrockConfig, GrainFraction, SedimentConfig, TransportLaw,
    VegetationConfig, VegetationModel,
};
pub use transport::{erode, erode_multiplier, CellFlux, ErosionOutcome, FluxField};
