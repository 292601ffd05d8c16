//! FFT engine for complex baseband captures
//! 
//! Produces center-shifted magnitude spectra: zero frequency (the tuned
//! center) sits at index `fft_size / 2`, negative offsets to the left.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// FFT engine for complex I/Q captures
pub struct FftEngine {
    /// FFT size (number of bins)
    fft_size: usize,
    
    /// Planned forward FFT
    fft: Arc<dyn Fft<f64>>,
    
    /// Reusable in-place buffer
    buffer: Vec<Complex<f64>>,
    
    /// Reusable scratch space for the planned FFT
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    /// 
    /// # Arguments
    /// * `fft_size` - FFT size (number of bins, must be at least 1)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        
        let buffer = vec![Complex::new(0.0, 0.0); fft_size];
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        
        Self {
            fft_size,
            fft,
            buffer,
            scratch,
        }
    }
    
    /// Compute FFT and return the center-shifted magnitude spectrum
    /// 
    /// # Arguments
    /// * `signal` - I/Q samples (zero-padded if shorter than fft_size,
    ///   truncated if longer). Non-finite samples are treated as zero.
    /// 
    /// # Returns
    /// |X[k]| reordered so that bin `fft_size / 2` is zero frequency
    pub fn compute_shifted_magnitude(&mut self, signal: &[Complex<f32>]) -> Vec<f64> {
        let copy_len = signal.len().min(self.fft_size);
        for (slot, sample) in self.buffer.iter_mut().zip(&signal[..copy_len]) {
            *slot = if sample.re.is_finite() && sample.im.is_finite() {
                Complex::new(f64::from(sample.re), f64::from(sample.im))
            } else {
                Complex::new(0.0, 0.0)
            };
        }
        self.buffer[copy_len..].fill(Complex::new(0.0, 0.0));
        
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        
        let n = self.fft_size;
        let half = self.center_bin();
        (0..n)
            .map(|i| self.buffer[(i + n - half) % n].norm())
            .collect()
    }
    
    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
    
    /// Index of the zero-frequency bin after the center shift
    pub fn center_bin(&self) -> usize {
        self.fft_size / 2
    }
    
    /// Frequency offset of each shifted bin relative to the tuned center, in Hz
    pub fn bin_offsets_hz(&self, sample_rate: f64) -> Vec<f64> {
        let half = self.center_bin() as f64;
        let n = self.fft_size as f64;
        (0..self.fft_size)
            .map(|bin| (bin as f64 - half) * sample_rate / n)
            .collect()
    }
}
