//! The durable format: one CSV row per observation. A save/load round
//! trip must reproduce the canonical table exactly.

use crate::model::{CanonicalTable, PriceObservation, StorageError};
use crate::pipeline::RunReport;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

pub fn save_table(path: &Path, table: &CanonicalTable) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for obs in table.observations() {
        writer.serialize(obs)?;
    }
    writer.flush()?;
    info!(rows = table.len(), path = %path.display(), "canonical table saved");
    Ok(())
}

pub fn load_table(path: &Path) -> Result<CanonicalTable, StorageError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut table = CanonicalTable::new();
    for row in reader.deserialize::<PriceObservation>() {
        table.insert(row?);
    }
    info!(rows = table.len(), path = %path.display(), "canonical table loaded");
    Ok(table)
}

/// Writes the run report as pretty JSON for the charting layer.
pub fn save_report(path: &Path, report: &RunReport) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    info!(path = %path.display(), "run report saved");
    Ok(())
}
