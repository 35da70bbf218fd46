//! Fixed-interval summary records.
//!
//! Each step's volumes are spread evenly over the step. When an interval
//! mark falls inside a step, the part before the mark closes the current
//! record and the rest opens the next one.

use serde::Serialize;

/// Totals for one completed output interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    /// 1-based interval index.
    pub index: u64,
    /// Mean discharge leaving the grid (m^3/s).
    pub discharge: f64,
    /// Mean discharge expected from the inputs (m^3/s).
    pub input_discharge: f64,
    /// Sediment leaving the grid (m^3).
    pub sediment_total: f64,
    /// Sediment leaving the grid per fraction (m^3).
    pub sediment: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SummaryAccumulator {
    interval: f64,
    next_mark: f64,
    index: u64,
    water_out: f64,
    water_in: f64,
    sediment: Vec<f64>,
}

impl SummaryAccumulator {
    pub fn new(interval: f64, fractions: usize) -> Self {
        Self {
            interval,
            next_mark: interval,
            index: 0,
            water_out: 0.0,
            water_in: 0.0,
            sediment: vec![0.0; fractions],
        }
    }

    fn add(&mut self, share: f64, duration: f64, out_rate: f64, in_rate: f64, sediment: &[f64]) {
        self.water_out += out_rate * duration;
        self.water_in += in_rate * duration;
        for (acc, s) in self.sediment.iter_mut().zip(sediment) {
            *acc += s * share;
        }
    }

    fn close(&mut self) -> SummaryRecord {
        self.index += 1;
        let len = self.sediment.len();
        let sediment = std::mem::replace(&mut self.sediment, vec![0.0; len]);
        let record = SummaryRecord {
            index: self.index,
            discharge: self.water_out / self.interval,
            input_discharge: self.water_in / self.interval,
            sediment_total: sediment.iter().sum(),
            sediment,
        };
        self.water_out = 0.0;
        self.water_in = 0.0;
        self.next_mark += self.interval;
        record
    }

    /// Adds one step covering `[start, end]`.
    ///
    /// # Arguments
    /// * `out_rate` - Outflow discharge over the step (m^3/s)
    /// * `in_rate` - Expected input discharge over the step (m^3/s)
    /// * `sediment` - Sediment exported during the step, per fraction (m^3)
    ///
    /// # Returns
    /// Records for every interval the step completed.
    pub fn record(&mut self, start: f64, end: f64, out_rate: f64, in_rate: f64, sediment: &[f64]) -> Vec<SummaryRecord> {
        let mut done = Vec::new();
        let span = end - start;
        if span <= 0.0 || self.interval <= 0.0 {
            return done;
        }
        let mut cursor = start;
        while self.next_mark <= end {
            let part = (self.next_mark - cursor).max(0.0);
            self.add(part / span, part, out_rate, in_rate, sediment);
            cursor = self.next_mark;
            done.push(self.close());
        }
        let rest = end - cursor;
        self.add(rest / span, rest, out_rate, in_rate, sediment);
        done
    }
}
