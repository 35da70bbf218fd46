//! RAW snapshot export: one little-endian grid file per layer plus a JSON
//! header describing them.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ExportError;
use crate::grid::{GridGeometry, NODATA};
use crate::model::{Layer, Snapshot};

/// Sample encoding of a RAW layer file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawFormat {
    /// 32-bit float, little-endian.
    #[default]
    R32Float,
    /// 64-bit float, little-endian (full precision).
    R64Float,
}

impl RawFormat {
    pub fn bytes_per_sample(self) -> u64 {
        match self {
            RawFormat::R32Float => 4,
            RawFormat::R64Float => 8,
        }
    }
}

/// Sidecar written next to the layer files of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub index: u64,
    /// Simulated time (s).
    pub time: f64,
    pub iteration: u64,
    pub geometry: GridGeometry,
    pub format: RawFormat,
    pub nodata: f64,
    /// Layer name and file name, in write order.
    pub layers: Vec<(String, String)>,
}

/// Writes one layer, row-major from the first row.
///
/// # Arguments
/// * `layer` - The raster to write
/// * `path` - Output file path
/// * `format` - Sample encoding
pub fn export_layer_raw(layer: &Layer, path: &Path, format: RawFormat) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        RawFormat::R32Float => {
            for &value in &layer.values {
                writer.write_all(&(value as f32).to_le_bytes())?;
            }
        }
        RawFormat::R64Float => {
            for &value in &layer.values {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Reads a layer written by [`export_layer_raw`] back as `f64`.
pub fn read_layer_raw(path: &Path, format: RawFormat) -> Result<Vec<f64>, ExportError> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    let values = match format {
        RawFormat::R32Float => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        RawFormat::R64Float => bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
    };
    Ok(values)
}

/// Exports every layer of a snapshot and its JSON header.
///
/// Files are named `{base_name}_{index:05}_{layer}.raw`, the header
/// `{base_name}_{index:05}.json`.
///
/// # Returns
/// The header path.
pub fn export_snapshot_raw(
    snapshot: &Snapshot,
    output_dir: &Path,
    base_name: &str,
    format: RawFormat,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(output_dir)?;

    let stem = format!("{}_{:05}", base_name, snapshot.index);
    let mut layers = Vec::with_capacity(snapshot.layers.len());
    for layer in &snapshot.layers {
        let filename = format!("{}_{}.raw", stem, layer.name);
        export_layer_raw(layer, &output_dir.join(&filename), format)?;
        layers.push((layer.name.clone(), filename));
    }

    let header = SnapshotHeader {
        index: snapshot.index,
        time: snapshot.time,
        iteration: snapshot.iteration,
        geometry: snapshot.geometry,
        format,
        nodata: NODATA,
        layers,
    };
    let path = output_dir.join(format!("{stem}.json"));
    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(writer, &header)?;
    Ok(path)
}

/// Returns the expected file size of one layer.
pub fn expected_file_size(geometry: &GridGeometry, format: RawFormat) -> u64 {
    geometry.len() as u64 * format.bytes_per_sample()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Bootstrap, World};
    use crate::sediment::SedimentConfig;
    use tempfile::tempdir;

    fn snapshot() -> Snapshot {
        let mut b = Bootstrap::flat(5, 4, 2.0, 1.0);
        b.elevation[6] = NODATA;
        let mut w = World::from_bootstrap(&b, &SedimentConfig::default()).unwrap();
        w.depth[7] = 0.125;
        Snapshot::capture(&w, 3, 7200.0, 412)
    }

    #[test]
    fn test_export_layer_sizes() {
        let snap = snapshot();
        let dir = tempdir().unwrap();
        for format in [RawFormat::R32Float, RawFormat::R64Float] {
            let path = dir.path().join("depth.raw");
            export_layer_raw(snap.layer("depth").unwrap(), &path, format).unwrap();
            let metadata = std::fs::metadata(&path).unwrap();
            assert_eq!(metadata.len(), expected_file_size(&snap.geometry, format));
        }
    }

    #[test]
    fn test_raw_content_correctness() {
        let snap = snapshot();
        let dir = tempdir().unwrap();
        let path = dir.path().join("depth.raw");
        export_layer_raw(snap.layer("depth").unwrap(), &path, RawFormat::R32Float).unwrap();

        let data = std::fs::read(&path).unwrap();
        let at = |i: usize| f32::from_le_bytes([data[4 * i], data[4 * i + 1], data[4 * i + 2], data[4 * i + 3]]);
        assert_eq!(at(7), 0.125);
        assert_eq!(at(6), NODATA as f32);
        assert_eq!(at(0), 0.0);

        let back = read_layer_raw(&path, RawFormat::R32Float).unwrap();
        assert_eq!(back.len(), 20);
        assert_eq!(back[7], 0.125);
    }

    #[test]
    fn test_export_snapshot_writes_header_and_layers() {
        let snap = snapshot();
        let dir = tempdir().unwrap();
        let header_path = export_snapshot_raw(&snap, dir.path(), "run", RawFormat::R32Float).unwrap();
        assert_eq!(header_path.file_name().unwrap(), "run_00003.json");

        let text = std::fs::read_to_string(&header_path).unwrap();
        let header: SnapshotHeader = serde_json::from_str(&text).unwrap();
        assert_eq!(header.iteration, 412);
        assert_eq!(header.geometry.cols, 5);
        assert_eq!(header.layers.len(), snap.layers.len());
        for (name, file) in &header.layers {
            assert!(dir.path().join(file).exists(), "missing layer {name}");
        }
        assert!(dir.path().join("run_00003_elevation.raw").exists());
    }
}
