//! Headerless two-column CSV exports
//! 
//! Each row is `<frequency in MHz, 3 decimals>,<power in whole dBm>`, the
//! layout frequency-coordination tools import as a scan file.

use super::{RecordFilter, RecordStore, StoreError};
use crate::aggregate::engine::{average_power, SpectrumViews};
use crate::aggregate::units::DbmScale;
use log::info;
use std::path::{Path, PathBuf};

pub const RECENT_FILE: &str = "recent_scan";
pub const AVERAGE_FILE: &str = "average_scan";
pub const MAX_FILE: &str = "max_scan";

/// Suffix appended to export names in dry-run sessions
pub const DRY_RUN_SUFFIX: &str = "_test";

/// Where exports go
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub dir: PathBuf,
    pub suffix: String,
}

impl ExportSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            suffix: String::new(),
        }
    }
    
    /// Same as `new`, but file names carry the dry-run suffix
    pub fn dry_run(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            suffix: DRY_RUN_SUFFIX.to_string(),
        }
    }
    
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}.csv", name, self.suffix))
    }
}

/// Write `freqs` (Hz) and `powers` (dBm) as a headerless CSV
pub fn write_csv(path: impl AsRef<Path>, freqs: &[f64], powers: &[f64]) -> Result<(), StoreError> {
    if freqs.len() != powers.len() {
        return Err(StoreError::LengthMismatch(freqs.len(), powers.len()));
    }
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;
    
    for (&freq, &power) in freqs.iter().zip(powers) {
        writer.write_record([
            format!("{:.3}", freq / 1e6),
            format!("{}", power.round() as i64),
        ])?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_points(path: &Path, points: &[(f64, f64)]) -> Result<(), StoreError> {
    let (freqs, powers): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
    write_csv(path, &freqs, &powers)
}

/// Export recent, average and max-hold views; empty views are skipped
/// 
/// Power is rounded to whole dBm here, so pass unrounded views
/// ([`AggregationEngine::unrounded_views`](crate::aggregate::AggregationEngine::unrounded_views)).
pub fn export_views(settings: &ExportSettings, views: &SpectrumViews) -> Result<Vec<PathBuf>, StoreError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| StoreError::Io {
        path: settings.dir.clone(),
        source,
    })?;
    
    let mut written = Vec::new();
    for (name, points) in [
        (RECENT_FILE, &views.recent),
        (AVERAGE_FILE, &views.average),
        (MAX_FILE, &views.max_hold),
    ] {
        if points.is_empty() {
            continue;
        }
        let path = settings.path_for(name);
        write_points(&path, points)?;
        written.push(path);
    }
    Ok(written)
}

/// Rebuild the recent and average exports from persisted history
/// 
/// The newest matching record becomes the recent export; the newest
/// `average_over` records feed the average.
pub fn export_history(
    store: &dyn RecordStore,
    filter: &RecordFilter,
    settings: &ExportSettings,
    scale: &DbmScale,
    average_over: usize,
) -> Result<Vec<PathBuf>, StoreError> {
    let records = store.read_records(filter)?;
    let Some(recent) = records.last() else {
        info!("No scans found for export");
        return Ok(Vec::new());
    };
    
    let skip = records.len().saturating_sub(average_over.max(1));
    let views = SpectrumViews {
        recent: scale.convert_raw(&recent.points().collect::<Vec<_>>()),
        average: scale.convert_raw(&average_power(&records[skip..])),
        max_hold: Vec::new(),
        sweeps_averaged: records.len() - skip,
    };
    
    let written = export_views(settings, &views)?;
    for path in &written {
        info!("Exported {}", path.display());
    }
    Ok(written)
}
