//! Boundary and input configuration.

use serde::{Deserialize, Serialize};

use super::series::{PointSource, StepTable};

/// How catchment runoff is resolved in space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunoffLayout {
    /// One reservoir per rainfall zone, shared among the zone's input cells.
    #[default]
    Zoned,
    /// One reservoir per valid cell; every cell receives its own runoff.
    Distributed,
}

/// Rainfall-driven catchment hydrology.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchmentConfig {
    /// Rainfall (mm/h) per zone, `rows[time_index][zone]`. When
    /// `discharge_table` is set the first column is catchment discharge
    /// (m^3/s) instead.
    pub rainfall: StepTable,
    /// Multiplier applied to rainfall rates.
    pub rain_factor: f64,
    /// TOPMODEL M parameter (m).
    pub m_value: f64,
    /// Optional M value per rainfall time index, overriding `m_value`.
    /// Columns are zones as in `rainfall`; a single column applies to all.
    pub m_values: Option<StepTable>,
    /// Initial baseflow used to pick diffuse input cells (m/s).
    pub baseflow: f64,
    /// Lower bound of `area * baseflow * 3 * dx^2` for an input cell.
    pub min_input_discharge: f64,
    /// Upper bound of the same quantity.
    pub max_input_discharge: f64,
    /// Read discharge directly from the table instead of solving the
    /// reservoir.
    pub discharge_table: bool,
    /// Interval between reservoir solutions (s).
    pub hydro_step: f64,
    /// Initial reservoir discharge (m/s).
    pub initial_discharge: f64,
    pub runoff: RunoffLayout,
}

impl Default for CatchmentConfig {
    fn default() -> Self {
        Self {
            rainfall: StepTable::constant(0.0),
            rain_factor: 1.0,
            m_value: 0.005,
            m_values: None,
            baseflow: 5e-9,
            min_input_discharge: 0.01,
            max_input_discharge: 1000.0,
            discharge_table: false,
            hydro_step: 60.0,
            initial_discharge: 1e-9,
            runoff: RunoffLayout::Zoned,
        }
    }
}

/// Point inflows of water and sediment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachConfig {
    pub points: Vec<PointSource>,
    /// Share of exported sediment fed back to the input points.
    pub recirculate: Option<f64>,
}

/// Stage-driven flooding of a rectangular region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TidalConfig {
    pub min_col: usize,
    pub min_row: usize,
    pub max_col: usize,
    pub max_row: usize,
    /// Water-surface elevation (m) in column 0.
    pub stage: StepTable,
    /// Suspended concentration seeded when a cell first floods.
    pub initial_concentration: f64,
}

/// All boundary inputs; each is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub catchment: Option<CatchmentConfig>,
    pub reach: Option<ReachConfig>,
    pub tidal: Option<TidalConfig>,
}
