//! Sediment transport configuration.

use serde::{Deserialize, Serialize};

/// Bedload/suspended capacity law, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "law", rename_all = "snake_case")]
pub enum TransportLaw {
    /// Surface-based mixed-size law of Wilcock & Crowe (2003).
    WilcockCrowe,
    /// Einstein (1950) bedload function.
    Einstein,
    /// Meyer-Peter & Muller excess Shields stress law with a hard threshold.
    MeyerPeterMuller {
        /// Critical dimensionless Shields stress.
        critical_shields: f64,
        /// Leading coefficient of `q* = k (theta - theta_c)^1.5`.
        coefficient: f64,
    },
}

impl Default for TransportLaw {
    fn default() -> Self {
        Self::WilcockCrowe
    }
}

impl TransportLaw {
    pub fn meyer_peter_muller() -> Self {
        Self::MeyerPeterMuller {
            critical_shields: 0.047,
            coefficient: 8.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportLaw::WilcockCrowe => "wilcock-crowe",
            TransportLaw::Einstein => "einstein",
            TransportLaw::MeyerPeterMuller { .. } => "meyer-peter-muller",
        }
    }
}

/// One grain-size class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrainFraction {
    /// Representative diameter in metres.
    pub diameter: f64,
    /// Share of the reference (initial) composition.
    pub proportion: f64,
    /// Settling velocity in m/s, used when the fraction is suspended.
    pub fall_velocity: f64,
    /// Carried in suspension instead of as bedload.
    pub suspended: bool,
}

/// How vegetation cover limits fluvial erosion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum VegetationModel {
    /// Capacity scaled by `1 - cover`.
    Proportional,
    /// Above `density` cover, erosion may not cut below the vegetation
    /// reference elevation.
    Threshold { density: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetationConfig {
    pub model: VegetationModel,
    /// Shear stress (Pa) above which cover is stripped.
    pub critical_shear: f64,
    /// Residual bank erodibility under full cover (0 = fully protected).
    pub lateral_restriction: f64,
    /// Initial cover used when the bootstrap carries none.
    pub initial_cover: f64,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            model: VegetationModel::Threshold { density: 0.25 },
            critical_shear: 100.0,
            lateral_restriction: 0.1,
            initial_cover: 0.0,
        }
    }
}

/// Bedrock incision by excess shear stress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockConfig {
    /// Critical shear stress in Pa.
    pub critical_shear: f64,
    /// Erodibility; zero disables incision.
    pub erodibility: f64,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            critical_shear: 50.0,
            erodibility: 0.0,
        }
    }
}

/// Bank transfer applied after each sediment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    pub enabled: bool,
    /// Dry-bank rate constant applied to `shear * curvature`.
    pub lateral_constant: f64,
    /// Wet-bank share of the cell's outgoing bedload.
    pub bed_proportion: f64,
    /// Per-transfer cap as a fraction of the erosion-rate cap.
    pub cap_fraction: f64,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lateral_constant: 2e-7,
            bed_proportion: 0.01,
            cap_fraction: 0.1,
        }
    }
}

/// Parameters for multi-fraction sediment transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SedimentConfig {
    pub law: TransportLaw,
    pub fractions: Vec<GrainFraction>,
    /// Active-layer thickness in metres.
    pub active_thickness: f64,
    /// Maximum strata kept per parcel; deeper layers are merged.
    pub max_strata: usize,
    /// Largest elevation change allowed in one cell per call (m).
    pub erode_cap: f64,
    /// Velocity ceiling used in shear stress (m/s).
    pub max_velocity: f64,
    /// Maximum volumetric suspended concentration.
    pub max_suspended_concentration: f64,
    /// Largest suspended deposit per cell per step (m).
    pub settling_cap: f64,
    /// Upper diameter of the sand fraction used by Wilcock-Crowe (m).
    pub sand_limit: f64,
    /// Largest time step the sediment engine may grow to (s).
    pub max_step: f64,
    pub bedrock: BedrockConfig,
    pub vegetation: Option<VegetationConfig>,
    pub bank: BankConfig,
}

const DIAMETERS: [f64; 9] = [0.0005, 0.001, 0.002, 0.004, 0.008, 0.016, 0.032, 0.064, 0.128];
const PROPORTIONS: [f64; 9] = [0.144, 0.022, 0.019, 0.029, 0.068, 0.146, 0.220, 0.231, 0.121];
const FALL_VELOCITIES: [f64; 9] = [0.066, 0.109, 0.164, 0.237, 0.338, 0.479, 0.678, 0.959, 1.357];

/// The nine-class gravel-bed mixture with the finest class in suspension.
pub fn default_fractions() -> Vec<GrainFraction> {
    DIAMETERS
        .iter()
        .zip(PROPORTIONS)
        .zip(FALL_VELOCITIES)
        .enumerate()
        .map(|(i, ((&diameter, proportion), fall_velocity))| GrainFraction {
            diameter,
            proportion,
            fall_velocity,
            suspended: i == 0,
        })
        .collect()
}

impl Default for SedimentConfig {
    fn default() -> Self {
        Self {
            law: TransportLaw::default(),
            fractions: default_fractions(),
            active_thickness: 0.2,
            max_strata: 10,
            erode_cap: 0.05,
            max_velocity: 5.0,
            max_suspended_concentration: 0.05,
            settling_cap: 0.001,
            sand_limit: 0.002,
            max_step: 3600.0,
            bedrock: BedrockConfig::default(),
            vegetation: None,
            bank: BankConfig::default(),
        }
    }
}

impl SedimentConfig {
    /// Configuration with every fraction moving as bedload.
    pub fn bedload_only() -> Self {
        let mut config = Self::default();
        for f in &mut config.fractions {
            f.suspended = false;
        }
        config
    }

    pub fn diameters(&self) -> Vec<f64> {
        self.fractions.iter().map(|f| f.diameter).collect()
    }

    /// Reference composition normalised to sum to one.
    pub fn reference(&self) -> Vec<f64> {
        let total: f64 = self.fractions.iter().map(|f| f.proportion.max(0.0)).sum();
        if total <= 0.0 {
            let n = self.fractions.len().max(1) as f64;
            return vec![1.0 / n; self.fractions.len()];
        }
        self.fractions.iter().map(|f| f.proportion.max(0.0) / total).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_is_normalised() {
        let config = SedimentConfig::default();
        let sum: f64 = config.reference().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(config.fractions.iter().filter(|f| f.suspended).count(), 1);
    }

    #[test]
    fn test_transport_law_json_tagging() {
        let law = TransportLaw::meyer_peter_muller();
        let json = serde_json::to_string(&law).unwrap();
        assert!(json.contains("\"law\":\"meyer_peter_muller\""));
        let back: TransportLaw = serde_json::from_str(&json).unwrap();
        assert_eq!(back, law);
        let wc: TransportLaw = serde_json::from_str(r#"{"law":"wilcock_crowe"}"#).unwrap();
        assert_eq!(wc, TransportLaw::WilcockCrowe);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: SedimentConfig = serde_json::from_str(r#"{"active_thickness":0.1}"#).unwrap();
        assert_eq!(config.active_thickness, 0.1);
        assert_eq!(config.fractions.len(), 9);
    }
}
