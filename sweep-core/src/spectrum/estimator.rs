//! Spectrum estimator for a single tuned capture
//! 
//! `estimate` turns one sample batch into a center-shifted magnitude spectrum.
//! 
//! Two behaviours worth knowing about:
//! 
//! * Zero padding: a batch shorter than `fft_size` is padded with zeros. This
//!   interpolates the displayed spectrum (finer bin spacing) but adds no
//!   information beyond what the captured samples carry.
//! * DC notch: the `DC_NOTCH_BINS` bins around the center are forced to zero.
//!   The receiver's LO leakage shows up there regardless of the antenna
//!   signal, so every capture window has a blind spot at its tuned frequency.

use super::fft::FftEngine;
use crate::hardware::Sample;
use thiserror::Error;

/// Width of the zeroed region around the center bin
pub const DC_NOTCH_BINS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    
    #[error("Spectrum reduction produced a non-finite value")]
    NonFinite,
}

/// Estimate the magnitude spectrum of one capture
/// 
/// Plans a fresh FFT on every call; use [`SpectrumEstimator`] when
/// processing many batches of the same size.
pub fn estimate(samples: &[Sample], fft_size: usize) -> Result<Vec<f64>, EstimateError> {
    SpectrumEstimator::new(fft_size)?.estimate(samples)
}

/// Zero the `DC_NOTCH_BINS` bins centered on `len / 2`
pub fn suppress_dc(spectrum: &mut [f64]) {
    if spectrum.is_empty() {
        return;
    }
    let center = spectrum.len() / 2;
    let lo = center.saturating_sub(DC_NOTCH_BINS / 2);
    let hi = (center + DC_NOTCH_BINS / 2).min(spectrum.len() - 1);
    spectrum[lo..=hi].fill(0.0);
}

/// Reusable estimator holding a planned FFT
pub struct SpectrumEstimator {
    engine: FftEngine,
}

impl SpectrumEstimator {
    /// Create an estimator for a fixed FFT size
    pub fn new(fft_size: usize) -> Result<Self, EstimateError> {
        if fft_size < 1 {
            return Err(EstimateError::InvalidInput(
                "fft_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            engine: FftEngine::new(fft_size),
        })
    }
    
    /// Magnitude spectrum with the DC notch applied
    /// 
    /// An all-zero batch yields an all-zero spectrum.
    pub fn estimate(&mut self, samples: &[Sample]) -> Result<Vec<f64>, EstimateError> {
        if samples.is_empty() {
            return Err(EstimateError::InvalidInput("empty sample batch".to_string()));
        }
        if samples.len() > self.engine.fft_size() {
            return Err(EstimateError::InvalidInput(format!(
                "batch of {} samples exceeds fft_size {}",
                samples.len(),
                self.engine.fft_size()
            )));
        }
        
        let mut spectrum = self.engine.compute_shifted_magnitude(samples);
        suppress_dc(&mut spectrum);
        Ok(spectrum)
    }
    
    /// Reduce one capture to its peak magnitude
    pub fn peak_power(&mut self, samples: &[Sample]) -> Result<f64, EstimateError> {
        let peak = self.estimate(samples)?.into_iter().fold(0.0, f64::max);
        if peak.is_finite() {
            Ok(peak)
        } else {
            Err(EstimateError::NonFinite)
        }
    }
    
    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.engine.fft_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;
    use std::f64::consts::PI;
    
    fn noisy_batch(len: usize) -> Vec<Sample> {
        // Cheap deterministic pseudo-noise
        let mut state = 0x2545_f491u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let re = (state & 0xffff) as f32 / 65535.0 - 0.5;
                let im = (state >> 16) as f32 / 65535.0 - 0.5;
                Complex::new(re, im)
            })
            .collect()
    }
    
    #[test]
    fn test_center_bins_always_zero() {
        for &size in &[1usize, 2, 3, 4, 5, 64, 1023, 1024] {
            let batch = noisy_batch(size);
            let spectrum = estimate(&batch, size).unwrap();
            let center = size / 2;
            
            assert_eq!(spectrum.len(), size);
            assert_eq!(spectrum[center], 0.0);
            if center >= 1 {
                assert_eq!(spectrum[center - 1], 0.0);
            }
            if center + 1 < size {
                assert_eq!(spectrum[center + 1], 0.0);
            }
        }
    }
    
    #[test]
    fn test_dc_spike_removed() {
        let batch = vec![Complex::new(1.0f32, 0.0); 256];
        let spectrum = estimate(&batch, 256).unwrap();
        assert!(spectrum.iter().all(|&v| v < 1e-9));
    }
    
    #[test]
    fn test_deterministic() {
        let batch = noisy_batch(512);
        let a = estimate(&batch, 1024).unwrap();
        let b = estimate(&batch, 1024).unwrap();
        assert_eq!(a, b);
        
        let mut estimator = SpectrumEstimator::new(1024).unwrap();
        assert_eq!(estimator.estimate(&batch).unwrap(), a);
        assert_eq!(estimator.estimate(&batch).unwrap(), a);
    }
    
    #[test]
    fn test_zero_batch_gives_zero_spectrum() {
        let batch = vec![Complex::new(0.0f32, 0.0); 128];
        let spectrum = estimate(&batch, 256).unwrap();
        assert_eq!(spectrum.len(), 256);
        assert!(spectrum.iter().all(|&v| v == 0.0));
        
        let mut estimator = SpectrumEstimator::new(128).unwrap();
        assert_eq!(estimator.peak_power(&batch).unwrap(), 0.0);
    }
    
    #[test]
    fn test_invalid_input() {
        assert!(matches!(estimate(&[], 16), Err(EstimateError::InvalidInput(_))));
        assert!(matches!(
            estimate(&noisy_batch(4), 0),
            Err(EstimateError::InvalidInput(_))
        ));
        assert!(matches!(
            estimate(&noisy_batch(32), 16),
            Err(EstimateError::InvalidInput(_))
        ));
    }
    
    #[test]
    fn test_peak_tracks_off_center_tone() {
        let n = 1024;
        let batch: Vec<Sample> = (0..n)
            .map(|k| {
                let phase = 2.0 * PI * 100.0 * k as f64 / n as f64;
                Complex::new(0.5 * phase.cos() as f32, 0.5 * phase.sin() as f32)
            })
            .collect();
        
        let mut estimator = SpectrumEstimator::new(n).unwrap();
        let peak = estimator.peak_power(&batch).unwrap();
        assert!((peak - 512.0).abs() < 1e-2);
    }
}
