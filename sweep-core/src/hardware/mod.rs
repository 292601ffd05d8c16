//! Receiver collaborator interfaces
//! 
//! The sweep core only ever talks to a [`Receiver`]: tune, read a batch,
//! close. Drivers implement the lower-level [`SampleDevice`] and get wrapped
//! in a [`RetryingReceiver`], which owns the retry policy and hides it from
//! the core.

pub mod retry;
pub mod simulated;

pub use retry::{RetryPolicy, RetryingReceiver};
pub use simulated::SimulatedDevice;

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One complex baseband sample (in-phase, quadrature)
pub type Sample = Complex<f32>;

/// Fixed-length capture for one tuned frequency
pub type SampleBatch = Vec<Sample>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    #[error("No receiver device found")]
    NoDevice,
    
    #[error("Failed to configure receiver: {0}")]
    Configure(String),
    
    #[error("Failed to tune to {freq_hz} Hz: {reason}")]
    Tune { freq_hz: f64, reason: String },
    
    #[error("Failed to read samples: {0}")]
    Read(String),
    
    #[error("Failed to close receiver: {0}")]
    Close(String),
}

/// Tuner parameters applied once before the first pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunerSettings {
    /// Sample rate in Hz
    pub sample_rate: f64,
    
    /// Tuner gain in dB
    pub gain: f64,
    
    /// Frequency correction in ppm
    pub freq_correction: i32,
}

/// Receiver as seen by the sweep controller
/// 
/// `read_samples` is infallible by contract: implementations retry
/// internally and hand back an all-zero batch once they give up.
pub trait Receiver {
    /// Apply tuner settings; failure is fatal to a session
    fn configure(&mut self, settings: &TunerSettings) -> Result<(), HardwareError>;
    
    /// Retune the center frequency
    fn tune(&mut self, freq_hz: f64) -> Result<(), HardwareError>;
    
    /// Read exactly `n` samples at the current center frequency
    fn read_samples(&mut self, n: usize) -> SampleBatch;
    
    /// Release the device
    fn close(&mut self) -> Result<(), HardwareError>;
}

/// Raw driver interface with fallible reads
pub trait SampleDevice {
    fn configure(&mut self, settings: &TunerSettings) -> Result<(), HardwareError>;
    
    fn set_center_freq(&mut self, freq_hz: f64) -> Result<(), HardwareError>;
    
    fn try_read(&mut self, n: usize) -> Result<SampleBatch, HardwareError>;
    
    fn close(&mut self) -> Result<(), HardwareError>;
}

impl<R: Receiver + ?Sized> Receiver for Box<R> {
    fn configure(&mut self, settings: &TunerSettings) -> Result<(), HardwareError> {
        (**self).configure(settings)
    }
    
    fn tune(&mut self, freq_hz: f64) -> Result<(), HardwareError> {
        (**self).tune(freq_hz)
    }
    
    fn read_samples(&mut self, n: usize) -> SampleBatch {
        (**self).read_samples(n)
    }
    
    fn close(&mut self) -> Result<(), HardwareError> {
        (**self).close()
    }
}
