//! Whitespace-separated summary time series.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::ExportError;
use crate::model::SummaryRecord;

/// Appends one line per completed output interval:
/// `index discharge input_discharge sediment_total s0 s1 ...`.
pub struct SummaryWriter<W: Write> {
    writer: W,
}

impl SummaryWriter<BufWriter<File>> {
    /// Creates (or truncates) `path` and writes the column header.
    pub fn create(path: &Path, fractions: usize) -> Result<Self, ExportError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), fractions)
    }
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(mut writer: W, fractions: usize) -> Result<Self, ExportError> {
        write!(writer, "# index discharge input_discharge sediment_total")?;
        for n in 0..fractions {
            write!(writer, " s{n}")?;
        }
        writeln!(writer)?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, record: &SummaryRecord) -> Result<(), ExportError> {
        write!(
            self.writer,
            "{} {:.6} {:.6} {:.6e}",
            record.index, record.discharge, record.input_discharge, record.sediment_total
        )?;
        for s in &record.sediment {
            write!(self.writer, " {s:.6e}")?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ExportError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines() {
        let mut w = SummaryWriter::new(Vec::new(), 2).unwrap();
        w.write(&SummaryRecord {
            index: 1,
            discharge: 2.5,
            input_discharge: 3.0,
            sediment_total: 0.5,
            sediment: vec![0.25, 0.25],
        })
        .unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "# index discharge input_discharge sediment_total s0 s1");
        let cols: Vec<f64> = lines[1].split_whitespace().map(|v| v.parse().unwrap()).collect();
        assert_eq!(cols, vec![1.0, 2.5, 3.0, 0.5, 0.25, 0.25]);
    }
}
