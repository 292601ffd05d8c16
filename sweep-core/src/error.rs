//! Session-level error taxonomy

use crate::hardware::HardwareError;
use crate::spectrum::EstimateError;
use crate::storage::StoreError;
use crate::sweep::{ConfigError, StepError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// How a fault affects the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Fatal at session start; absorbed by retries mid-sweep
    Hardware,
    /// One step skipped, pass continues
    Processing,
    /// One record not persisted, aggregation continues
    Persistence,
    /// Session never starts
    Config,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A sweep session is already running")]
    AlreadyRunning,
    
    #[error("Receiver initialization failed: {0}")]
    Hardware(#[from] HardwareError),
    
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    
    #[error("Spectrum processing failed: {0}")]
    Processing(#[from] EstimateError),
    
    #[error("Failed to persist sweep: {0}")]
    Persistence(#[from] StoreError),
    
    #[error("Sweep worker panicked")]
    WorkerPanicked,
}

impl SessionError {
    pub fn kind(&self) -> FaultKind {
        match self {
            SessionError::Hardware(_) => FaultKind::Hardware,
            SessionError::Processing(_) | SessionError::WorkerPanicked => FaultKind::Processing,
            SessionError::Persistence(_) => FaultKind::Persistence,
            SessionError::AlreadyRunning | SessionError::Config(_) => FaultKind::Config,
        }
    }
}

/// A fault with enough context to find the sweep it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultReport {
    pub kind: FaultKind,
    
    /// 1-based pass index
    pub pass: usize,
    
    /// Tuned frequency, when the fault belongs to one step
    pub freq_hz: Option<f64>,
    
    pub timestamp: DateTime<Utc>,
    
    pub message: String,
}

impl FaultReport {
    pub fn new(kind: FaultKind, pass: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            pass,
            freq_hz: None,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
    
    pub fn at_freq(mut self, freq_hz: f64) -> Self {
        self.freq_hz = Some(freq_hz);
        self
    }
    
    /// Report for a skipped sweep step
    pub fn step(pass: usize, freq_hz: f64, error: &StepError) -> Self {
        let kind = match error {
            StepError::Tune(_) => FaultKind::Hardware,
            StepError::Estimate(_) => FaultKind::Processing,
        };
        Self::new(kind, pass, error.to_string()).at_freq(freq_hz)
    }
    
    pub fn from_error(pass: usize, error: &SessionError) -> Self {
        Self::new(error.kind(), pass, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_kind_mapping() {
        assert_eq!(SessionError::from(HardwareError::NoDevice).kind(), FaultKind::Hardware);
        assert_eq!(SessionError::from(EstimateError::NonFinite).kind(), FaultKind::Processing);
        assert_eq!(
            SessionError::from(StoreError::AlreadyExists("x".into())).kind(),
            FaultKind::Persistence
        );
        assert_eq!(SessionError::from(ConfigError::NoPasses).kind(), FaultKind::Config);
    }
    
    #[test]
    fn test_step_report_carries_frequency() {
        let error = StepError::Tune(HardwareError::Tune {
            freq_hz: 472e6,
            reason: "PLL not locked".into(),
        });
        let report = FaultReport::step(2, 472e6, &error);
        
        assert_eq!(report.kind, FaultKind::Hardware);
        assert_eq!(report.pass, 2);
        assert_eq!(report.freq_hz, Some(472e6));
        assert!(report.message.contains("PLL not locked"));
    }
    
    #[test]
    fn test_report_serializes() {
        let report = FaultReport::new(FaultKind::Persistence, 1, "disk full");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "persistence");
        assert_eq!(json["freq_hz"], serde_json::Value::Null);
    }
}
