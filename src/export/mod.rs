//! Export of model output to disk.
//!
//! Snapshots go out as RAW little-endian grids with a JSON header, the
//! summary series as a whitespace-separated text file.

mod raw;
mod summary;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::model::{Snapshot, SnapshotSink, SummaryRecord, Telemetry};

pub use raw::{export_layer_raw, export_snapshot_raw, expected_file_size, read_layer_raw, RawFormat, SnapshotHeader};
pub use summary::SummaryWriter;

/// Errors that can occur while writing output.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sink writing every snapshot and summary record under one directory.
pub struct DirectorySink {
    dir: PathBuf,
    base_name: String,
    format: RawFormat,
    summary: SummaryWriter<BufWriter<File>>,
    snapshots: u64,
}

impl DirectorySink {
    /// Creates `dir` and opens `{base_name}_summary.txt` inside it.
    pub fn create(dir: &Path, base_name: &str, fractions: usize, format: RawFormat) -> Result<Self, ExportError> {
        std::fs::create_dir_all(dir)?;
        let summary = SummaryWriter::create(&dir.join(format!("{base_name}_summary.txt")), fractions)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            base_name: base_name.to_string(),
            format,
            summary,
            snapshots: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshots_written(&self) -> u64 {
        self.snapshots
    }

    /// Flushes the summary file and writes the final telemetry as JSON.
    pub fn finish(mut self, telemetry: &Telemetry) -> Result<PathBuf, ExportError> {
        self.summary.flush()?;
        let path = self.dir.join(format!("{}_telemetry.json", self.base_name));
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, telemetry)?;
        Ok(path)
    }
}

impl SnapshotSink for DirectorySink {
    type Error = ExportError;

    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), ExportError> {
        let header = export_snapshot_raw(snapshot, &self.dir, &self.base_name, self.format)?;
        self.snapshots += 1;
        info!(index = snapshot.index, time = snapshot.time, path = %header.display(), "snapshot written");
        Ok(())
    }

    fn write_summary(&mut self, record: &SummaryRecord) -> Result<(), ExportError> {
        self.summary.write(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bootstrap;
    use crate::inputs::{PointSource, ReachConfig, StepTable};
    use crate::model::{Model, ModelConfig};
    use crate::slope::SlopeConfig;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;

    #[test]
    fn test_directory_sink_full_run() {
        let mut config = ModelConfig::default();
        config.run.flow_only = true;
        config.run.duration_hours = 0.05;
        config.run.summary_interval_minutes = 1.0;
        config.run.snapshot_interval_hours = Some(0.02);
        config.slope = SlopeConfig::disabled();
        config.inputs.reach = Some(ReachConfig {
            points: vec![PointSource {
                col: 3,
                row: 3,
                table: StepTable::new(3600.0, vec![vec![0.0, 0.05]]),
            }],
            recirculate: None,
        });
        let mut model = Model::new(config, &Bootstrap::flat(7, 7, 1.0, 0.0)).unwrap();

        let dir = tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path(), "flat", model.world().grains.len(), RawFormat::R32Float).unwrap();
        let telemetry = model.run(&AtomicBool::new(false), &mut sink).unwrap();
        assert!(sink.snapshots_written() >= 1);
        let telemetry_path = sink.finish(&telemetry).unwrap();

        let summary = std::fs::read_to_string(dir.path().join("flat_summary.txt")).unwrap();
        assert!(summary.lines().count() >= 3);
        assert!(dir.path().join("flat_00001.json").exists());
        assert!(dir.path().join("flat_00001_depth.raw").exists());
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(telemetry_path).unwrap()).unwrap();
        assert!(json["water_in"].as_f64().unwrap() > 0.0);
    }
}
