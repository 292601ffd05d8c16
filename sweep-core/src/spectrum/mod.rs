//! Spectral estimation with FFT

pub mod fft;
pub mod estimator;

pub use fft::FftEngine;
pub use estimator::{estimate, suppress_dc, EstimateError, SpectrumEstimator, DC_NOTCH_BINS};
