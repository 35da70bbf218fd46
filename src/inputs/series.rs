//! Tabulated time series: rainfall, M values, stages and point sources.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating input tables.
#[derive(Error, Debug, PartialEq)]
pub enum SeriesError {
    #[error("Table '{0}' has no rows")]
    Empty(String),
    #[error("Table '{0}' has a non-positive step of {1} s")]
    InvalidStep(String, f64),
    #[error("Table '{name}' row {row} has {actual} columns, expected at least {expected}")]
    Ragged {
        name: String,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Point source at ({0}, {1}) lies outside the grid")]
    PointOutOfBounds(usize, usize),
}

/// Regularly sampled table, `rows[time_index][column]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTable {
    /// Spacing between rows in seconds.
    pub step: f64,
    pub rows: Vec<Vec<f64>>,
}

impl StepTable {
    pub fn new(step: f64, rows: Vec<Vec<f64>>) -> Self {
        Self { step, rows }
    }

    /// Single-column table holding `value` forever.
    pub fn constant(value: f64) -> Self {
        Self::new(3600.0, vec![vec![value]])
    }

    /// Checks that every row has at least `min_columns` entries.
    pub fn validate(&self, name: &str, min_columns: usize) -> Result<(), SeriesError> {
        if self.rows.is_empty() {
            return Err(SeriesError::Empty(name.to_string()));
        }
        if !(self.step > 0.0) {
            return Err(SeriesError::InvalidStep(name.to_string(), self.step));
        }
        for (row, values) in self.rows.iter().enumerate() {
            if values.len() < min_columns {
                return Err(SeriesError::Ragged {
                    name: name.to_string(),
                    row,
                    expected: min_columns,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Number of columns in the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn cell(&self, row: usize, column: usize) -> f64 {
        let Some(values) = self.rows.get(row.min(self.rows.len().saturating_sub(1))) else {
            return 0.0;
        };
        match values.len() {
            0 => 0.0,
            // A single column applies to every zone.
            1 => values[0],
            _ => values.get(column).copied().unwrap_or(0.0),
        }
    }

    /// Value of the row in force at `time` (`floor(time / step)`); the last
    /// row holds beyond the end of the table.
    pub fn value_at(&self, time: f64, column: usize) -> f64 {
        let row = (time.max(0.0) / self.step).floor() as usize;
        self.cell(row, column)
    }

    /// Linear interpolation between the rows bracketing `time`.
    pub fn interpolate(&self, time: f64, column: usize) -> f64 {
        let pos = time.max(0.0) / self.step;
        let row = pos.floor() as usize;
        let frac = pos - row as f64;
        let a = self.cell(row, column);
        if row + 1 >= self.rows.len() {
            return a;
        }
        let b = self.cell(row + 1, column);
        a + (b - a) * frac
    }
}

/// Channel holding water discharge (m^3/s) in a point-source table.
pub const WATER_CHANNEL: usize = 1;
/// First channel holding per-fraction sediment discharge (m^3/s).
pub const SEDIMENT_CHANNEL: usize = 5;

/// Fixed inflow location with its own time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointSource {
    pub col: usize,
    pub row: usize,
    pub table: StepTable,
}

impl PointSource {
    /// Interpolated water discharge (m^3/s) at `time`.
    pub fn water(&self, time: f64) -> f64 {
        self.table.interpolate(time, WATER_CHANNEL).max(0.0)
    }

    /// Interpolated sediment discharge (m^3/s) of `fraction` at `time`.
    pub fn sediment(&self, time: f64, fraction: usize) -> f64 {
        let column = SEDIMENT_CHANNEL + fraction;
        if self.table.width() <= column {
            return 0.0;
        }
        self.table.interpolate(time, column).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_at_uses_floor_index() {
        let t = StepTable::new(10.0, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(t.value_at(0.0, 1), 2.0);
        assert_eq!(t.value_at(9.9, 0), 1.0);
        assert_eq!(t.value_at(10.0, 0), 3.0);
        assert_eq!(t.value_at(1e6, 1), 4.0);
    }

    #[test]
    fn test_single_column_broadcasts() {
        let t = StepTable::constant(7.0);
        assert_eq!(t.value_at(100.0, 3), 7.0);
    }

    #[test]
    fn test_interpolate_between_rows() {
        let t = StepTable::new(60.0, vec![vec![0.0, 0.0], vec![0.0, 6.0]]);
        assert!((t.interpolate(30.0, 1) - 3.0).abs() < 1e-12);
        assert!((t.interpolate(600.0, 1) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        assert_eq!(
            StepTable::new(1.0, vec![]).validate("rain", 1),
            Err(SeriesError::Empty("rain".into()))
        );
        assert!(matches!(
            StepTable::new(0.0, vec![vec![1.0]]).validate("rain", 1),
            Err(SeriesError::InvalidStep(_, _))
        ));
        assert!(matches!(
            StepTable::new(1.0, vec![vec![1.0, 2.0], vec![1.0]]).validate("q", 2),
            Err(SeriesError::Ragged { row: 1, .. })
        ));
    }

    #[test]
    fn test_point_source_channels() {
        let p = PointSource {
            col: 0,
            row: 0,
            table: StepTable::new(1.0, vec![vec![0.0, 2.0, 0.0, 0.0, 0.0, 0.5]]),
        };
        assert_eq!(p.water(3.0), 2.0);
        assert_eq!(p.sediment(3.0, 0), 0.5);
        assert_eq!(p.sediment(3.0, 1), 0.0);
    }
}
