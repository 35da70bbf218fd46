//! Top-level run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dune::DuneConfig;
use crate::hydro::HydroConfig;
use crate::inputs::InputConfig;
use crate::lateral::LateralConfig;
use crate::sediment::SedimentConfig;
use crate::slope::SlopeConfig;

/// Errors raised while loading or checking a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for '{0}': {1}")]
    Invalid(&'static str, String),
}

/// Run length and output cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Simulated duration in hours.
    pub duration_hours: f64,
    /// Route water only; skip sediment transport and lateral erosion.
    pub flow_only: bool,
    /// Interval between summary records in minutes.
    pub summary_interval_minutes: f64,
    /// Interval between grid snapshots in hours; `None` writes none.
    pub snapshot_interval_hours: Option<f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_hours: 24.0,
            flow_only: false,
            summary_interval_minutes: 60.0,
            snapshot_interval_hours: None,
        }
    }
}

impl RunConfig {
    #[inline]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_hours * 3600.0
    }

    #[inline]
    pub fn summary_interval_seconds(&self) -> f64 {
        self.summary_interval_minutes * 60.0
    }
}

/// Every parameter of a run. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub run: RunConfig,
    pub hydro: HydroConfig,
    pub inputs: InputConfig,
    pub sediment: SedimentConfig,
    pub lateral: LateralConfig,
    pub slope: SlopeConfig,
    pub dune: Option<DuneConfig>,
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(field, format!("{value} must be positive")))
    }
}

impl ModelConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ModelConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values that would stall or destabilise the loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("run.duration_hours", self.run.duration_hours)?;
        positive("run.summary_interval_minutes", self.run.summary_interval_minutes)?;
        if let Some(hours) = self.run.snapshot_interval_hours {
            positive("run.snapshot_interval_hours", hours)?;
        }

        let h = &self.hydro;
        positive("hydro.gravity", h.gravity)?;
        positive("hydro.manning", h.manning)?;
        positive("hydro.courant", h.courant)?;
        positive("hydro.depth_threshold", h.depth_threshold)?;
        positive("hydro.initial_step", h.initial_step)?;
        positive("hydro.max_step", h.max_step)?;
        if h.evaporation_rate < 0.0 {
            return Err(ConfigError::Invalid(
                "hydro.evaporation_rate",
                format!("{} must not be negative", h.evaporation_rate),
            ));
        }

        let s = &self.sediment;
        if s.fractions.is_empty() {
            return Err(ConfigError::Invalid("sediment.fractions", "no grain fractions".into()));
        }
        for f in &s.fractions {
            positive("sediment.fractions.diameter", f.diameter)?;
        }
        positive("sediment.active_thickness", s.active_thickness)?;
        positive("sediment.erode_cap", s.erode_cap)?;
        positive("sediment.max_step", s.max_step)?;
        if s.max_strata == 0 {
            return Err(ConfigError::Invalid("sediment.max_strata", "must be at least 1".into()));
        }

        if let Some(creep) = &self.slope.creep {
            positive("slope.creep.interval_days", creep.interval_days)?;
        }
        if let Some(soil) = &self.slope.soil_erosion {
            positive("slope.soil_erosion.interval_days", soil.interval_days)?;
        }
        if let Some(siberia) = &self.slope.siberia {
            positive("slope.siberia.interval_days", siberia.interval_days)?;
            positive("slope.siberia.n1", siberia.n1)?;
        }
        if let Some(slide) = &self.slope.landslide {
            if slide.active_interval == 0 {
                return Err(ConfigError::Invalid("slope.landslide.active_interval", "must be at least 1".into()));
            }
        }

        if let Some(dune) = &self.dune {
            if dune.multiplier == 0 {
                return Err(ConfigError::Invalid("dune.multiplier", "must be at least 1".into()));
            }
            positive("dune.interval_hours", dune.interval_hours)?;
            positive("dune.slab_thickness", dune.slab_thickness)?;
        }
        Ok(())
    }
}
