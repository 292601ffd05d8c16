//! Durable scan history
//! 
//! Records are append-only and keyed by timestamp: a store never replaces
//! or edits a record once written.

pub mod csv_export;
pub mod json_store;

pub use csv_export::{export_history, export_views, write_csv, ExportSettings};
pub use json_store::JsonStore;

use crate::aggregate::record::{RecordError, SweepRecord};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    
    #[error("Malformed record {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    
    #[error("Record {0} already exists")]
    AlreadyExists(String),
    
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    
    #[error("Column length mismatch: {0} frequencies, {1} power levels")]
    LengthMismatch(usize, usize),
    
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Which records to read back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Only records taken at or after this instant
    pub since: Option<DateTime<Utc>>,
    
    /// Only records taken on this (UTC) calendar day
    pub day: Option<NaiveDate>,
    
    /// Keep only the newest N matches
    pub last: Option<usize>,
}

impl RecordFilter {
    /// Every record
    pub fn all() -> Self {
        Self::default()
    }
    
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
    
    pub fn on_day(mut self, day: NaiveDate) -> Self {
        self.day = Some(day);
        self
    }
    
    pub fn last(mut self, n: usize) -> Self {
        self.last = Some(n);
        self
    }
    
    pub fn matches(&self, timestamp: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| timestamp >= since)
            && self.day.map_or(true, |day| timestamp.date_naive() == day)
    }
    
    /// Filter, order chronologically and truncate to the newest `last`
    pub fn apply(&self, records: Vec<SweepRecord>) -> Vec<SweepRecord> {
        let mut kept: Vec<_> = records
            .into_iter()
            .filter(|r| self.matches(r.timestamp()))
            .collect();
        kept.sort_by_key(|r| r.timestamp());
        if let Some(n) = self.last {
            let excess = kept.len().saturating_sub(n);
            kept.drain(..excess);
        }
        kept
    }
}

/// Persistence collaborator
pub trait RecordStore {
    /// Persist one record; fails if its key is already taken
    fn write_record(&mut self, record: &SweepRecord) -> Result<(), StoreError>;
    
    /// Records matching `filter`, oldest first
    fn read_records(&self, filter: &RecordFilter) -> Result<Vec<SweepRecord>, StoreError>;
}

/// In-memory store; clones share the same history
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<SweepRecord>>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Store whose writes always fail (fault injection)
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }
    
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn write_record(&mut self, record: &SweepRecord) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Io {
                path: PathBuf::from(record.key()),
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            });
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.iter().any(|r| r.key() == record.key()) {
            return Err(StoreError::AlreadyExists(record.key()));
        }
        records.push(record.clone());
        Ok(())
    }
    
    fn read_records(&self, filter: &RecordFilter) -> Result<Vec<SweepRecord>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Ok(filter.apply(records))
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn write_record(&mut self, record: &SweepRecord) -> Result<(), StoreError> {
        (**self).write_record(record)
    }
    
    fn read_records(&self, filter: &RecordFilter) -> Result<Vec<SweepRecord>, StoreError> {
        (**self).read_records(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    
    fn record_at(day: u32, hour: u32) -> SweepRecord {
        let ts = Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap();
        SweepRecord::new(ts, vec![470e6], vec![hour as f64], None, None).unwrap()
    }
    
    #[test]
    fn test_filter_orders_and_truncates() {
        let records = vec![record_at(21, 9), record_at(20, 23), record_at(21, 7), record_at(21, 8)];
        
        let all = RecordFilter::all().apply(records.clone());
        let hours: Vec<_> = all.iter().map(|r| r.power_levels()[0]).collect();
        assert_eq!(hours, vec![23.0, 7.0, 8.0, 9.0]);
        
        let today = RecordFilter::all()
            .on_day(NaiveDate::from_ymd_opt(2025, 3, 21).unwrap())
            .last(2)
            .apply(records.clone());
        let hours: Vec<_> = today.iter().map(|r| r.power_levels()[0]).collect();
        assert_eq!(hours, vec![8.0, 9.0]);
        
        let since = Utc.with_ymd_and_hms(2025, 3, 21, 8, 0, 0).unwrap();
        assert_eq!(RecordFilter::all().since(since).apply(records).len(), 2);
    }
    
    #[test]
    fn test_memory_store_is_append_only() {
        let mut store = MemoryStore::new();
        let record = record_at(21, 9);
        store.write_record(&record).unwrap();
        
        assert!(matches!(
            store.write_record(&record),
            Err(StoreError::AlreadyExists(_))
        ));
        
        let later = SweepRecord::new(
            record.timestamp() + Duration::milliseconds(1),
            vec![470e6],
            vec![1.0],
            None,
            None,
        )
        .unwrap();
        store.write_record(&later).unwrap();
        assert_eq!(store.read_records(&RecordFilter::all()).unwrap().len(), 2);
    }
    
    #[test]
    fn test_failing_store() {
        let mut store = MemoryStore::failing();
        assert!(matches!(
            store.write_record(&record_at(21, 9)),
            Err(StoreError::Io { .. })
        ));
        assert!(store.is_empty());
    }
}
