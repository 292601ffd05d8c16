//! Multi-pass aggregation engine
//! 
//! Keeps three views over the sweeps ingested so far:
//! 
//! * recent: the last record
//! * running average: mean power over a bounded FIFO of records
//! * max-hold: per-frequency maximum, never decreasing until reset
//! 
//! State is updated incrementally on every ingest. Persisted history is the
//! durable source of truth and can be replayed with [`AggregationEngine::restore`].

use super::record::SweepRecord;
use super::units::DbmScale;
use crate::storage::{RecordFilter, RecordStore, StoreError};
use log::{error, info, warn};
use ndarray::{Array2, Axis};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// `(frequency_hz, power)` pairs
pub type SpectrumPoints = Vec<(f64, f64)>;

/// Engine parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineSettings {
    /// Records kept for the running average (None = unbounded)
    pub averaging_window: Option<usize>,
    
    /// Conversion used for display views
    pub scale: DbmScale,
    
    /// Skip persistence, aggregate in memory only
    pub dry_run: bool,
}

/// Recent / window / max-hold state
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    recent: Option<Arc<SweepRecord>>,
    max_hold: SpectrumPoints,
    window: VecDeque<Arc<SweepRecord>>,
}

impl AggregateState {
    pub fn recent(&self) -> Option<&SweepRecord> {
        self.recent.as_deref()
    }
    
    /// Max-hold trace, ascending by frequency
    pub fn max_hold(&self) -> &[(f64, f64)] {
        &self.max_hold
    }
    
    /// Records in the averaging window, oldest first
    pub fn window(&self) -> impl Iterator<Item = &SweepRecord> {
        self.window.iter().map(|r| r.as_ref())
    }
    
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// Display-ready views, in dBm
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpectrumViews {
    pub recent: SpectrumPoints,
    pub average: SpectrumPoints,
    pub max_hold: SpectrumPoints,
    pub sweeps_averaged: usize,
}

/// Outer join of `prior` and `record` on frequency, keeping the larger power
/// 
/// Frequencies found on one side only pass through unchanged. The result is
/// sorted by frequency and has one entry per distinct frequency.
pub fn merge_max_hold(prior: &[(f64, f64)], record: &SweepRecord) -> SpectrumPoints {
    let mut merged: SpectrumPoints = prior.iter().copied().chain(record.points()).collect();
    merged.sort_by(|a, b| a.0.total_cmp(&b.0));
    merged.dedup_by(|later, kept| {
        if later.0 == kept.0 {
            kept.1 = kept.1.max(later.1);
            true
        } else {
            false
        }
    });
    merged
}

/// Index-aligned mean power over `records`
/// 
/// The newest record defines the frequency axis; records of a different
/// length are left out of the mean.
pub fn average_power<'a, I>(records: I) -> SpectrumPoints
where
    I: IntoIterator<Item = &'a SweepRecord>,
{
    let records: Vec<&SweepRecord> = records.into_iter().collect();
    let reference = match records.last() {
        Some(r) if !r.is_empty() => *r,
        _ => return Vec::new(),
    };
    let cols = reference.len();
    
    let mut flat = Vec::with_capacity(records.len() * cols);
    let mut rows = 0;
    for record in &records {
        if record.len() != cols {
            warn!(
                "Excluding sweep {} from average: {} points, expected {}",
                record.key(),
                record.len(),
                cols
            );
            continue;
        }
        flat.extend_from_slice(record.power_levels());
        rows += 1;
    }
    
    let mean = Array2::from_shape_vec((rows, cols), flat)
        .ok()
        .and_then(|matrix| matrix.mean_axis(Axis(0)));
    match mean {
        Some(mean) => reference.frequencies().iter().copied().zip(mean.iter().copied()).collect(),
        None => Vec::new(),
    }
}

/// Single-writer owner of [`AggregateState`]
pub struct AggregationEngine {
    state: AggregateState,
    store: Box<dyn RecordStore + Send>,
    settings: EngineSettings,
}

impl AggregationEngine {
    pub fn new(store: Box<dyn RecordStore + Send>, settings: EngineSettings) -> Self {
        Self {
            state: AggregateState::default(),
            store,
            settings,
        }
    }
    
    pub fn state(&self) -> &AggregateState {
        &self.state
    }
    
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
    
    pub fn is_dry_run(&self) -> bool {
        self.settings.dry_run
    }
    
    /// Add a completed sweep
    /// 
    /// The record is persisted first (unless dry-run), then folded into the
    /// in-memory views. A persistence failure is returned after the views
    /// have been updated, so aggregation never lags behind the sweeps.
    pub fn ingest(&mut self, record: SweepRecord) -> Result<&AggregateState, StoreError> {
        let persisted = if self.settings.dry_run {
            Ok(())
        } else {
            self.store.write_record(&record)
        };
        
        self.apply(Arc::new(record));
        
        if let Err(e) = persisted {
            error!("Failed to persist sweep: {}", e);
            return Err(e);
        }
        Ok(&self.state)
    }
    
    fn apply(&mut self, record: Arc<SweepRecord>) {
        self.state.max_hold = merge_max_hold(&self.state.max_hold, &record);
        self.state.recent = Some(Arc::clone(&record));
        self.state.window.push_back(record);
        if let Some(limit) = self.settings.averaging_window {
            while self.state.window.len() > limit {
                self.state.window.pop_front();
            }
        }
    }
    
    /// Mean linear power across the window, aligned by index
    pub fn running_average(&self) -> SpectrumPoints {
        average_power(self.state.window())
    }
    
    /// Fold `record` into max-hold and return the updated trace
    pub fn update_max_hold(&mut self, record: &SweepRecord) -> &[(f64, f64)] {
        self.state.max_hold = merge_max_hold(&self.state.max_hold, record);
        &self.state.max_hold
    }
    
    /// Start a fresh max-hold trace
    pub fn reset_max_hold(&mut self) {
        self.state.max_hold.clear();
    }
    
    /// Replay persisted history into memory without writing anything
    pub fn restore(&mut self, filter: &RecordFilter) -> Result<usize, StoreError> {
        let records = self.store.read_records(filter)?;
        let count = records.len();
        for record in records {
            self.apply(Arc::new(record));
        }
        info!("Restored {} sweeps from history", count);
        Ok(count)
    }
    
    /// Recent, average and max-hold converted to dBm
    pub fn views(&self) -> SpectrumViews {
        self.build_views(DbmScale::convert)
    }
    
    /// Same as `views`, without display rounding (for CSV export)
    pub fn unrounded_views(&self) -> SpectrumViews {
        self.build_views(DbmScale::convert_raw)
    }
    
    fn build_views(&self, convert: fn(&DbmScale, &[(f64, f64)]) -> SpectrumPoints) -> SpectrumViews {
        let scale = &self.settings.scale;
        let recent: SpectrumPoints = self
            .state
            .recent()
            .map(|r| r.points().collect())
            .unwrap_or_default();
        
        SpectrumViews {
            recent: convert(scale, &recent),
            average: convert(scale, &self.running_average()),
            max_hold: convert(scale, &self.state.max_hold),
            sweeps_averaged: self.state.window_len(),
        }
    }
    
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }
}
