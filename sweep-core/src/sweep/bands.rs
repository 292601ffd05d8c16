//! Band reference table
//! 
//! Read-only lookup of licensed wireless-microphone bands, used to override
//! or annotate the configured sweep range. Accepts either a bare JSON list
//! or an object with a `bands` key.

use super::config::ConfigError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive frequency span in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub start: f64,
    pub end: f64,
}

impl FrequencyRange {
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.start && freq_hz <= self.end
    }
}

/// One entry of the band table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    #[serde(rename = "band")]
    pub name: String,
    
    #[serde(rename = "frequency_range_hz")]
    pub frequency_range: FrequencyRange,
    
    #[serde(default)]
    pub regions_allowed: Vec<String>,
    
    #[serde(rename = "rf_output_power_options", default)]
    pub rf_power_options: Vec<String>,
}

impl Band {
    /// True when `[start, end)` lies inside this band
    pub fn covers(&self, start: f64, end: f64) -> bool {
        start >= self.frequency_range.start && end <= self.frequency_range.end
    }
    
    /// One-line summary for status displays
    pub fn describe(&self) -> String {
        format!(
            "Band: {} | Freq: {:.3}-{:.3} MHz | Regions: {} | RF Power: {}",
            self.name,
            self.frequency_range.start / 1e6,
            self.frequency_range.end / 1e6,
            self.regions_allowed.join(", "),
            self.rf_power_options.join(", ")
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BandFile {
    Wrapped { bands: Vec<Band> },
    List(Vec<Band>),
}

/// Band lookup table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandTable {
    bands: Vec<Band>,
}

impl BandTable {
    pub fn new(bands: Vec<Band>) -> Self {
        Self { bands }
    }
    
    /// Load the table from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Bands(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_json_str(&text)?;
        info!("Loaded {} bands from {}", table.bands.len(), path.display());
        Ok(table)
    }
    
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let file: BandFile =
            serde_json::from_str(text).map_err(|e| ConfigError::Bands(e.to_string()))?;
        let bands = match file {
            BandFile::Wrapped { bands } => bands,
            BandFile::List(bands) => bands,
        };
        Ok(Self { bands })
    }
    
    pub fn find(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }
    
    /// Like [`find`](Self::find), but logs a warning when nothing matches
    pub fn lookup(&self, name: &str) -> Option<&Band> {
        let band = self.find(name);
        if band.is_none() {
            warn!("Selected band '{}' not found in band table", name);
        }
        band
    }
    
    /// Bands fully covering the sweep range
    pub fn covering(&self, start: f64, end: f64) -> impl Iterator<Item = &Band> {
        self.bands.iter().filter(move |b| b.covers(start, end))
    }
    
    pub fn names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }
    
    pub fn len(&self) -> usize {
        self.bands.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    const TABLE: &str = r#"[
        {
            "band": "G50",
            "frequency_range_hz": { "start": 470000000, "end": 534000000 },
            "regions_allowed": ["US", "Canada"],
            "rf_output_power_options": ["10mW", "50mW"]
        },
        {
            "band": "H22",
            "frequency_range_hz": { "start": 518000000, "end": 584000000 },
            "regions_allowed": ["US"],
            "rf_output_power_options": ["10mW", "50mW", "100mW"]
        }
    ]"#;
    
    #[test]
    fn test_load_list_and_wrapped() {
        let table = BandTable::from_json_str(TABLE).unwrap();
        assert_eq!(table.names(), vec!["G50", "H22"]);
        
        let wrapped = format!(r#"{{ "bands": {} }}"#, TABLE);
        assert_eq!(BandTable::from_json_str(&wrapped).unwrap(), table);
    }
    
    #[test]
    fn test_lookup() {
        let table = BandTable::from_json_str(TABLE).unwrap();
        let band = table.lookup("H22").unwrap();
        assert_eq!(band.frequency_range.start, 518e6);
        assert!(table.lookup("X99").is_none());
    }
    
    #[test]
    fn test_covering_and_describe() {
        let table = BandTable::from_json_str(TABLE).unwrap();
        let names: Vec<_> = table.covering(520e6, 530e6).map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["G50", "H22"]);
        
        assert_eq!(
            table.find("H22").unwrap().describe(),
            "Band: H22 | Freq: 518.000-584.000 MHz | Regions: US | RF Power: 10mW, 50mW, 100mW"
        );
    }
    
    #[test]
    fn test_malformed_table() {
        assert!(matches!(
            BandTable::from_json_str("{ not json"),
            Err(ConfigError::Bands(_))
        ));
    }
}
