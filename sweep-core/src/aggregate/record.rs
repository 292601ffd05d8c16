//! Immutable record of one completed sweep

use crate::sweep::config::{Location, SweepConfig};
use crate::sweep::controller::SweepPoint;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp layout used in record keys and file names
pub const RECORD_KEY_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Timestamp layout of logs written before keys carried milliseconds
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("{frequencies} frequencies but {power_levels} power levels")]
    LengthMismatch {
        frequencies: usize,
        power_levels: usize,
    },
    
    #[error("Non-finite value at index {0}")]
    NonFinite(usize),
    
    #[error("Unrecognised timestamp '{0}'")]
    Timestamp(String),
}

/// One sweep's `(frequency, power)` arrays plus the context it was taken in
/// 
/// `frequencies[i]` and `power_levels[i]` always describe the same step.
/// Power levels are linear peak magnitudes; conversion to dBm happens when
/// views are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSweepRecord")]
pub struct SweepRecord {
    timestamp: DateTime<Utc>,
    frequencies: Vec<f64>,
    power_levels: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_snapshot: Option<SweepConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
}

impl SweepRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        frequencies: Vec<f64>,
        power_levels: Vec<f64>,
        config_snapshot: Option<SweepConfig>,
        location: Option<Location>,
    ) -> Result<Self, RecordError> {
        if frequencies.len() != power_levels.len() {
            return Err(RecordError::LengthMismatch {
                frequencies: frequencies.len(),
                power_levels: power_levels.len(),
            });
        }
        let bad = frequencies
            .iter()
            .zip(&power_levels)
            .position(|(f, p)| !f.is_finite() || !p.is_finite());
        if let Some(index) = bad {
            return Err(RecordError::NonFinite(index));
        }
        
        Ok(Self {
            timestamp,
            frequencies,
            power_levels,
            config_snapshot,
            location,
        })
    }
    
    /// Build a record from the points a sweep produced
    pub fn from_points(
        timestamp: DateTime<Utc>,
        points: &[SweepPoint],
        config_snapshot: Option<SweepConfig>,
        location: Option<Location>,
    ) -> Result<Self, RecordError> {
        let (frequencies, power_levels) = points.iter().map(|p| (p.freq_hz, p.peak_power)).unzip();
        Self::new(timestamp, frequencies, power_levels, config_snapshot, location)
    }
    
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    
    /// Storage key derived from the timestamp
    pub fn key(&self) -> String {
        self.timestamp.format(RECORD_KEY_FORMAT).to_string()
    }
    
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }
    
    pub fn power_levels(&self) -> &[f64] {
        &self.power_levels
    }
    
    /// `(frequency, power)` pairs in sweep order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies.iter().copied().zip(self.power_levels.iter().copied())
    }
    
    pub fn config_snapshot(&self) -> Option<&SweepConfig> {
        self.config_snapshot.as_ref()
    }
    
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
    
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// On-disk shape, including logs written by older scanners
#[derive(Deserialize)]
struct RawSweepRecord {
    timestamp: String,
    #[serde(alias = "freqs")]
    frequencies: Vec<f64>,
    #[serde(alias = "spectrum")]
    power_levels: Vec<f64>,
    #[serde(default)]
    config_snapshot: Option<SweepConfig>,
    #[serde(default)]
    location: Option<Location>,
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, RecordError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, LEGACY_TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| RecordError::Timestamp(text.to_string()))
}

impl TryFrom<RawSweepRecord> for SweepRecord {
    type Error = RecordError;
    
    fn try_from(raw: RawSweepRecord) -> Result<Self, Self::Error> {
        Self::new(
            parse_timestamp(&raw.timestamp)?,
            raw.frequencies,
            raw.power_levels,
            raw.config_snapshot,
            raw.location,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    
    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 21, 14, 25, 30).unwrap() + chrono::Duration::milliseconds(42)
    }
    
    #[test]
    fn test_length_invariant() {
        let err = SweepRecord::new(ts(), vec![1.0, 2.0], vec![1.0], None, None).unwrap_err();
        assert_eq!(
            err,
            RecordError::LengthMismatch {
                frequencies: 2,
                power_levels: 1
            }
        );
        assert_eq!(
            SweepRecord::new(ts(), vec![1.0, 2.0], vec![1.0, f64::NAN], None, None).unwrap_err(),
            RecordError::NonFinite(1)
        );
    }
    
    #[test]
    fn test_from_points_and_key() {
        let points = [
            SweepPoint { freq_hz: 470e6, peak_power: 3.0 },
            SweepPoint { freq_hz: 472e6, peak_power: 0.0 },
        ];
        let record = SweepRecord::from_points(ts(), &points, None, Some(Location::default())).unwrap();
        
        assert_eq!(record.frequencies(), &[470e6, 472e6]);
        assert_eq!(record.power_levels(), &[3.0, 0.0]);
        assert_eq!(record.key(), "20250321_142530_042");
        assert_eq!(record.location().unwrap().city, "Unknown");
    }
    
    #[test]
    fn test_json_round_trip_keeps_invariants() {
        let record = SweepRecord::new(ts(), vec![470e6], vec![12.5], None, None).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("config_snapshot"));
        assert_eq!(serde_json::from_str::<SweepRecord>(&json).unwrap(), record);
        
        let broken = r#"{"timestamp":"2025-03-21T14:25:30Z","frequencies":[1.0,2.0],"power_levels":[1.0]}"#;
        assert!(serde_json::from_str::<SweepRecord>(broken).is_err());
    }
    
    #[test]
    fn test_legacy_log_accepted() {
        let legacy = r#"{
            "timestamp": "20250321_142530",
            "frequencies": [470000000.0, 471000000.0],
            "power_levels": [10.5, 11.25]
        }"#;
        let record: SweepRecord = serde_json::from_str(legacy).unwrap();
        assert_eq!(record.timestamp().hour(), 14);
        assert_eq!(record.len(), 2);
        assert!(record.config_snapshot().is_none());
        
        let bad = legacy.replace("20250321_142530", "yesterday");
        assert!(serde_json::from_str::<SweepRecord>(&bad).is_err());
    }
}
