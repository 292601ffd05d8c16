//! Sweep configuration
//! 
//! [`ScanConfig`] is the file-backed, loosely validated settings struct.
//! [`SweepConfig`] is the validated form handed to every component at
//! construction; its range and sample-count invariants are checked once,
//! in [`SweepConfig::new`].

use super::bands::BandTable;
use crate::aggregate::units::{DbmScale, DEFAULT_CALIBRATION_OFFSET};
use crate::hardware::TunerSettings;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid frequency range: start {start} Hz must be below end {end} Hz")]
    InvalidRange { start: f64, end: f64 },
    
    #[error("Frequency step must be positive (got {0} Hz)")]
    InvalidStep(f64),
    
    #[error("Field '{0}' must be a finite number")]
    NonFinite(&'static str),
    
    #[error("samples_per_step must be at least 1")]
    NoSamples,
    
    #[error("fft_size {fft_size} is smaller than samples_per_step {samples}")]
    FftTooSmall { fft_size: usize, samples: usize },
    
    #[error("Averaging window must hold at least one sweep")]
    EmptyWindow,
    
    #[error("Number of passes must be at least 1")]
    NoPasses,
    
    #[error("Failed to load band table: {0}")]
    Bands(String),
    
    #[error("Failed to load configuration: {0}")]
    Load(#[from] confy::ConfyError),
}

/// Raw sweep parameters, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    /// First tuned frequency in Hz
    pub start_freq: f64,
    
    /// Exclusive upper bound in Hz
    pub end_freq: f64,
    
    /// Distance between tuned frequencies in Hz
    pub step_hz: f64,
    
    /// Samples captured per tuned frequency
    pub samples_per_step: usize,
    
    /// Sample rate in Hz
    pub sample_rate: f64,
    
    /// Tuner gain in dB
    pub gain: f64,
    
    /// Frequency correction in ppm
    pub freq_correction: i32,
    
    /// Sweeps kept for the running average (None = all)
    #[serde(default)]
    pub averaging_window: Option<usize>,
    
    /// FFT size (None = samples_per_step)
    #[serde(default)]
    pub fft_size: Option<usize>,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            start_freq: 470e6,
            end_freq: 608e6,
            step_hz: 1e6,
            samples_per_step: 1024,
            sample_rate: 2.048e6,
            gain: 20.0,
            freq_correction: 0,
            averaging_window: None,
            fft_size: None,
        }
    }
}

/// Validated sweep configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SweepParams", into = "SweepParams")]
pub struct SweepConfig {
    params: SweepParams,
    steps: usize,
}

impl SweepConfig {
    pub fn new(params: SweepParams) -> Result<Self, ConfigError> {
        let finite = [
            ("start_freq", params.start_freq),
            ("end_freq", params.end_freq),
            ("step_hz", params.step_hz),
            ("sample_rate", params.sample_rate),
            ("gain", params.gain),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
        }
        if params.start_freq >= params.end_freq {
            return Err(ConfigError::InvalidRange {
                start: params.start_freq,
                end: params.end_freq,
            });
        }
        if params.step_hz <= 0.0 {
            return Err(ConfigError::InvalidStep(params.step_hz));
        }
        if params.samples_per_step == 0 {
            return Err(ConfigError::NoSamples);
        }
        if let Some(fft_size) = params.fft_size {
            if fft_size < params.samples_per_step {
                return Err(ConfigError::FftTooSmall {
                    fft_size,
                    samples: params.samples_per_step,
                });
            }
        }
        if params.averaging_window == Some(0) {
            return Err(ConfigError::EmptyWindow);
        }
        
        let span = params.end_freq - params.start_freq;
        let mut steps = (span / params.step_hz).ceil() as usize;
        // Guard against rounding pushing the last step onto end_freq
        while steps > 1 && params.start_freq + (steps - 1) as f64 * params.step_hz >= params.end_freq {
            steps -= 1;
        }
        
        Ok(Self { params, steps })
    }
    
    pub fn params(&self) -> &SweepParams {
        &self.params
    }
    
    pub fn start_freq(&self) -> f64 {
        self.params.start_freq
    }
    
    pub fn end_freq(&self) -> f64 {
        self.params.end_freq
    }
    
    pub fn step_hz(&self) -> f64 {
        self.params.step_hz
    }
    
    pub fn samples_per_step(&self) -> usize {
        self.params.samples_per_step
    }
    
    pub fn averaging_window(&self) -> Option<usize> {
        self.params.averaging_window
    }
    
    pub fn fft_size(&self) -> usize {
        self.params.fft_size.unwrap_or(self.params.samples_per_step)
    }
    
    /// Number of tuned frequencies per sweep: ceil((end - start) / step)
    pub fn steps(&self) -> usize {
        self.steps
    }
    
    /// Tuned frequency of the given step
    pub fn frequency_at(&self, step: usize) -> f64 {
        self.params.start_freq + step as f64 * self.params.step_hz
    }
    
    /// All tuned frequencies of one sweep, ascending
    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.steps).map(|i| self.frequency_at(i)).collect()
    }
    
    pub fn tuner_settings(&self) -> TunerSettings {
        TunerSettings {
            sample_rate: self.params.sample_rate,
            gain: self.params.gain,
            freq_correction: self.params.freq_correction,
        }
    }
}

impl TryFrom<SweepParams> for SweepConfig {
    type Error = ConfigError;
    
    fn try_from(params: SweepParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

impl From<SweepConfig> for SweepParams {
    fn from(config: SweepConfig) -> Self {
        config.params
    }
}

/// Where a scan was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default = "unknown")]
    pub city: String,
    
    #[serde(default = "unknown")]
    pub venue: String,
    
    #[serde(default = "unknown")]
    pub zip_code: String,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            city: unknown(),
            venue: unknown(),
            zip_code: unknown(),
        }
    }
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// Scanner settings stored in TOML format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Sweep start in Hz (replaced by the selected band's range if found)
    #[serde(default = "default_start")]
    pub start_frequency: f64,
    
    /// Sweep end in Hz, exclusive
    #[serde(default = "default_end")]
    pub end_frequency: f64,
    
    #[serde(default = "default_step")]
    pub frequency_step: f64,
    
    #[serde(default = "default_samples")]
    pub samples_per_scan: usize,
    
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    
    #[serde(default = "default_gain")]
    pub gain: f64,
    
    #[serde(default)]
    pub freq_correction: i32,
    
    #[serde(default)]
    pub fft_size: Option<usize>,
    
    /// Sweep passes per session
    #[serde(default = "default_passes")]
    pub num_passes: usize,
    
    #[serde(default)]
    pub averaging_window: Option<usize>,
    
    /// dBm = 10*log10(magnitude) + calibration_offset
    #[serde(default = "default_calibration_offset")]
    pub calibration_offset: f64,
    
    /// dBm reported for zero magnitude (defaults to calibration_offset)
    #[serde(default)]
    pub dbm_floor: Option<f64>,
    
    /// Aggregate in memory only, never write scan records
    #[serde(default, alias = "test_mode")]
    pub dry_run: bool,
    
    /// Start every session with an empty max-hold trace
    #[serde(default)]
    pub reset_max_hold_on_start: bool,
    
    #[serde(default)]
    pub selected_band: Option<String>,
    
    #[serde(default)]
    pub bands_file: Option<PathBuf>,
    
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    
    #[serde(default)]
    pub location: Location,
}

fn default_start() -> f64 {
    SweepParams::default().start_freq
}

fn default_end() -> f64 {
    SweepParams::default().end_freq
}

fn default_step() -> f64 {
    SweepParams::default().step_hz
}

fn default_samples() -> usize {
    SweepParams::default().samples_per_step
}

fn default_sample_rate() -> f64 {
    SweepParams::default().sample_rate
}

fn default_gain() -> f64 {
    SweepParams::default().gain
}

fn default_passes() -> usize {
    1
}

fn default_calibration_offset() -> f64 {
    DEFAULT_CALIBRATION_OFFSET
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("data")
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_frequency: default_start(),
            end_frequency: default_end(),
            frequency_step: default_step(),
            samples_per_scan: default_samples(),
            sample_rate: default_sample_rate(),
            gain: default_gain(),
            freq_correction: 0,
            fft_size: None,
            num_passes: default_passes(),
            averaging_window: None,
            calibration_offset: default_calibration_offset(),
            dbm_floor: None,
            dry_run: false,
            reset_max_hold_on_start: false,
            selected_band: None,
            bands_file: None,
            log_directory: default_log_directory(),
            data_directory: default_data_directory(),
            location: Location::default(),
        }
    }
}

impl ScanConfig {
    /// Load from a TOML file, creating it with defaults if missing
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = confy::load_path(path.as_ref())?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }
    
    /// Load the band table named by `bands_file`, or an empty table
    pub fn load_bands(&self) -> Result<BandTable, ConfigError> {
        match &self.bands_file {
            Some(path) => BandTable::load(path),
            None => Ok(BandTable::default()),
        }
    }
    
    /// Validated sweep configuration, with the band override applied
    pub fn resolve(&self, bands: &BandTable) -> Result<SweepConfig, ConfigError> {
        let (mut start, mut end) = (self.start_frequency, self.end_frequency);
        
        if let Some(name) = &self.selected_band {
            if let Some(band) = bands.lookup(name) {
                start = band.frequency_range.start;
                end = band.frequency_range.end;
                info!("Using band {}: {:.3}-{:.3} MHz", band.name, start / 1e6, end / 1e6);
            } else {
                warn!(
                    "Keeping configured range {:.3}-{:.3} MHz",
                    start / 1e6,
                    end / 1e6
                );
            }
        }
        
        let config = SweepConfig::new(SweepParams {
            start_freq: start,
            end_freq: end,
            step_hz: self.frequency_step,
            samples_per_step: self.samples_per_scan,
            sample_rate: self.sample_rate,
            gain: self.gain,
            freq_correction: self.freq_correction,
            averaging_window: self.averaging_window,
            fft_size: self.fft_size,
        })?;
        
        if !bands.is_empty() && bands.covering(start, end).next().is_none() {
            warn!(
                "Sweep range {:.3}-{:.3} MHz is not inside any known band",
                start / 1e6,
                end / 1e6
            );
        }
        
        Ok(config)
    }
    
    pub fn passes(&self) -> Result<usize, ConfigError> {
        if self.num_passes == 0 {
            return Err(ConfigError::NoPasses);
        }
        Ok(self.num_passes)
    }
    
    pub fn dbm_scale(&self) -> DbmScale {
        let scale = DbmScale::new(self.calibration_offset);
        match self.dbm_floor {
            Some(floor) => scale.with_floor(floor),
            None => scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn params(start: f64, end: f64, step: f64) -> SweepParams {
        SweepParams {
            start_freq: start,
            end_freq: end,
            step_hz: step,
            ..SweepParams::default()
        }
    }
    
    #[test]
    fn test_step_count_and_frequencies() {
        let config = SweepConfig::new(params(470e6, 476e6, 2e6)).unwrap();
        assert_eq!(config.steps(), 3);
        assert_eq!(config.frequencies(), vec![470e6, 472e6, 474e6]);
        
        // Partial last step still counts
        let config = SweepConfig::new(params(470e6, 475e6, 2e6)).unwrap();
        assert_eq!(config.steps(), 3);
        assert_eq!(config.frequencies(), vec![470e6, 472e6, 474e6]);
        
        let config = SweepConfig::new(params(100.0, 101.0, 0.1)).unwrap();
        assert_eq!(config.steps(), 10);
        assert!(config.frequencies().iter().all(|&f| f < 101.0));
    }
    
    #[test]
    fn test_invalid_configs_rejected() {
        assert!(matches!(
            SweepConfig::new(params(476e6, 470e6, 1e6)),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            SweepConfig::new(params(470e6, 470e6, 1e6)),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            SweepConfig::new(params(470e6, 476e6, 0.0)),
            Err(ConfigError::InvalidStep(_))
        ));
        assert!(matches!(
            SweepConfig::new(params(f64::NAN, 476e6, 1e6)),
            Err(ConfigError::NonFinite("start_freq"))
        ));
        assert!(matches!(
            SweepConfig::new(SweepParams {
                fft_size: Some(512),
                ..SweepParams::default()
            }),
            Err(ConfigError::FftTooSmall { .. })
        ));
        assert!(matches!(
            SweepConfig::new(SweepParams {
                averaging_window: Some(0),
                ..SweepParams::default()
            }),
            Err(ConfigError::EmptyWindow)
        ));
    }
    
    #[test]
    fn test_serde_revalidates() {
        let config = SweepConfig::new(params(470e6, 476e6, 2e6)).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"start_freq\""));
        let back: SweepConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        
        let broken = json.replace("\"step_hz\":2000000.0", "\"step_hz\":-1.0");
        assert!(serde_json::from_str::<SweepConfig>(&broken).is_err());
    }
    
    #[test]
    fn test_band_override() {
        let bands = BandTable::from_json_str(
            r#"[{ "band": "H22", "frequency_range_hz": { "start": 518000000, "end": 584000000 } }]"#,
        )
        .unwrap();
        
        let scan = ScanConfig {
            selected_band: Some("H22".to_string()),
            ..ScanConfig::default()
        };
        let config = scan.resolve(&bands).unwrap();
        assert_eq!(config.start_freq(), 518e6);
        assert_eq!(config.end_freq(), 584e6);
        
        let missing = ScanConfig {
            selected_band: Some("Nope".to_string()),
            ..ScanConfig::default()
        };
        let config = missing.resolve(&bands).unwrap();
        assert_eq!(config.start_freq(), missing.start_frequency);
    }
    
    #[test]
    fn test_load_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.toml");
        
        let config = ScanConfig::load(&path).unwrap();
        assert_eq!(config, ScanConfig::default());
        assert!(path.exists());
    }
    
    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.toml");
        std::fs::write(
            &path,
            "start_frequency = 470000000.0\nend_frequency = 476000000.0\nfrequency_step = 2000000.0\ntest_mode = true\n\n[location]\ncity = \"Austin\"\n",
        )
        .unwrap();
        
        let config = ScanConfig::load(&path).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.location.city, "Austin");
        assert_eq!(config.location.venue, "Unknown");
        assert_eq!(config.resolve(&BandTable::default()).unwrap().steps(), 3);
        assert_eq!(config.passes().unwrap(), 1);
    }
}
