//! Hillslope process configuration.

use serde::{Deserialize, Serialize};

/// Slope-proportional soil creep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreepConfig {
    /// Creep coefficient (m^2/yr).
    pub rate: f64,
    pub interval_days: f64,
}

impl Default for CreepConfig {
    fn default() -> Self {
        Self {
            rate: 0.0025,
            interval_days: 10.0,
        }
    }
}

/// Threshold slope failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandslideConfig {
    /// Failure angle in degrees.
    pub failure_angle: f64,
    /// Iterations between active-extent relaxations.
    pub active_interval: u64,
    /// Also relax the whole grid once per day.
    pub whole_grid: bool,
    /// Upper bound on whole-grid sweeps per call.
    pub max_sweeps: u32,
}

impl Default for LandslideConfig {
    fn default() -> Self {
        Self {
            failure_angle: 45.0,
            active_interval: 10,
            whole_grid: false,
            max_sweeps: 200,
        }
    }
}

impl LandslideConfig {
    /// Critical height difference between cardinal neighbours.
    pub fn critical_drop(&self, cell_size: f64) -> f64 {
        self.failure_angle.to_radians().tan() * cell_size
    }
}

/// Diffusive soil erosion scaled by drainage area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilErosionConfig {
    pub rate: f64,
    pub interval_days: f64,
}

impl Default for SoilErosionConfig {
    fn default() -> Self {
        Self {
            rate: 0.0025,
            interval_days: 1.0,
        }
    }
}

/// SIBERIA stream-power erosion, `beta1 * Q^m1 * S^n1` with
/// `Q = beta3 * A^m3`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiberiaConfig {
    pub beta1: f64,
    pub m1: f64,
    pub n1: f64,
    pub beta3: f64,
    pub m3: f64,
    /// Flux below which a cell is not eroding; sets the threshold slope.
    pub critical_flux: f64,
    pub interval_days: f64,
}

impl Default for SiberiaConfig {
    fn default() -> Self {
        Self {
            beta1: 1067.0,
            m1: 1.70,
            n1: 0.69,
            beta3: 0.000186,
            m3: 0.79,
            critical_flux: 0.0,
            interval_days: 1.0,
        }
    }
}

/// Exponential soil production from bedrock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockLowering {
    /// Production rate at zero soil depth (m/yr).
    pub p1: f64,
    /// Depth decay (1/m).
    pub b1: f64,
}

impl Default for BedrockLowering {
    fn default() -> Self {
        Self { p1: 0.00025, b1: 2.5 }
    }
}

/// Depth- and size-dependent grain breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalWeathering {
    pub k1: f64,
    /// Depth decay per active-layer thickness.
    pub c1: f64,
    pub c2: f64,
}

impl Default for PhysicalWeathering {
    fn default() -> Self {
        Self {
            k1: 1e-4,
            c1: 2.0,
            c2: 1.0,
        }
    }
}

/// Monthly soil development.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilDevelopmentConfig {
    pub bedrock_lowering: Option<BedrockLowering>,
    pub weathering: Option<PhysicalWeathering>,
}

/// Every slope process; `None` disables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeConfig {
    pub creep: Option<CreepConfig>,
    pub landslide: Option<LandslideConfig>,
    pub soil_erosion: Option<SoilErosionConfig>,
    pub siberia: Option<SiberiaConfig>,
    pub soil_development: Option<SoilDevelopmentConfig>,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        Self {
            creep: Some(CreepConfig::default()),
            landslide: Some(LandslideConfig::default()),
            soil_erosion: None,
            siberia: None,
            soil_development: None,
        }
    }
}

impl SlopeConfig {
    /// All slope processes switched off.
    pub fn disabled() -> Self {
        Self {
            creep: None,
            landslide: None,
            soil_erosion: None,
            siberia: None,
            soil_development: None,
        }
    }
}
