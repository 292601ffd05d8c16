//! One pretty-printed JSON file per sweep: `<dir>/scan_<key>.json`

use super::{RecordFilter, RecordStore, StoreError};
use crate::aggregate::record::SweepRecord;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const PREFIX: &str = "scan_";
const EXTENSION: &str = ".json";

/// Directory-backed record store
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open (and create if needed) the record directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }
    
    pub fn dir(&self) -> &Path {
        &self.dir
    }
    
    /// File a record with this key lives in
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", PREFIX, key, EXTENSION))
    }
    
    fn write_new(&self, path: &Path, record: &SweepRecord) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => StoreError::AlreadyExists(record.key()),
                _ => StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                },
            })?;
        
        let mut writer = BufWriter::new(file);
        let written = serde_json::to_writer_pretty(&mut writer, record)
            .map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|_| {
                writer.flush().map_err(|source| StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            });
        
        if written.is_err() {
            // Never leave a truncated record behind
            drop(writer);
            let _ = fs::remove_file(path);
        }
        written
    }
    
    fn read_one(path: &Path) -> Result<SweepRecord, StoreError> {
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl RecordStore for JsonStore {
    fn write_record(&mut self, record: &SweepRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.key());
        self.write_new(&path, record)?;
        debug!("Saved {}", path.display());
        Ok(())
    }
    
    fn read_records(&self, filter: &RecordFilter) -> Result<Vec<SweepRecord>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(PREFIX) || !name.ends_with(EXTENSION) {
                continue;
            }
            match Self::read_one(&entry.path()) {
                Ok(record) if filter.matches(record.timestamp()) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable record: {}", e),
            }
        }
        
        Ok(filter.apply(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::config::Location;
    use chrono::{Duration, TimeZone, Utc};
    
    fn record(offset_ms: i64, power: f64) -> SweepRecord {
        let ts = Utc.with_ymd_and_hms(2025, 3, 21, 14, 0, 0).unwrap() + Duration::milliseconds(offset_ms);
        SweepRecord::new(
            ts,
            vec![470e6, 471e6],
            vec![power, power + 1.0],
            None,
            Some(Location::default()),
        )
        .unwrap()
    }
    
    #[test]
    fn test_write_and_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::new(dir.path().join("logs")).unwrap();
        
        store.write_record(&record(500, 2.0)).unwrap();
        store.write_record(&record(0, 1.0)).unwrap();
        store.write_record(&record(1000, 3.0)).unwrap();
        
        assert!(store.path_for("20250321_140000_500").exists());
        
        let records = store.read_records(&RecordFilter::all()).unwrap();
        let powers: Vec<_> = records.iter().map(|r| r.power_levels()[0]).collect();
        assert_eq!(powers, vec![1.0, 2.0, 3.0]);
        
        let newest = store.read_records(&RecordFilter::all().last(1)).unwrap();
        assert_eq!(newest[0], record(1000, 3.0));
    }
    
    #[test]
    fn test_existing_record_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::new(dir.path()).unwrap();
        
        store.write_record(&record(0, 1.0)).unwrap();
        let err = store.write_record(&record(0, 99.0)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        
        let records = store.read_records(&RecordFilter::all()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].power_levels()[0], 1.0);
    }
    
    #[test]
    fn test_foreign_and_broken_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::new(dir.path()).unwrap();
        store.write_record(&record(0, 1.0)).unwrap();
        
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("scan_broken.json"), "{ nope").unwrap();
        fs::write(
            dir.path().join("scan_20250320_101010.json"),
            r#"{"timestamp":"20250320_101010","frequencies":[470000000.0],"power_levels":[4.0]}"#,
        )
        .unwrap();
        
        let records = store.read_records(&RecordFilter::all()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].power_levels(), &[4.0]);
    }
}
