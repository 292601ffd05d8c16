//! Deterministic simulated receiver
//! 
//! Synthesises complex tones for a set of carriers so sweeps, dry runs and
//! tests can run without a radio attached.

use super::{HardwareError, Sample, SampleBatch, SampleDevice, TunerSettings};
use std::collections::HashMap;
use std::f64::consts::PI;

/// A simulated transmitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Carrier {
    /// Carrier frequency in Hz
    pub freq_hz: f64,
    
    /// Peak amplitude (full scale = 1.0)
    pub amplitude: f64,
}

/// Simulated I/Q source implementing [`SampleDevice`]
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    sample_rate: f64,
    center_freq: f64,
    carriers: Vec<Carrier>,
    noise_level: f32,
    fail_configure: bool,
    pending_failures: HashMap<u64, u32>,
    read_attempts: u64,
    closed: bool,
}

impl SimulatedDevice {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            center_freq: 0.0,
            carriers: Vec::new(),
            noise_level: 0.0,
            fail_configure: false,
            pending_failures: HashMap::new(),
            read_attempts: 0,
            closed: false,
        }
    }
    
    /// Add a carrier at `freq_hz`
    pub fn with_carrier(mut self, freq_hz: f64, amplitude: f64) -> Self {
        self.carriers.push(Carrier { freq_hz, amplitude });
        self
    }
    
    /// Add a pseudo-random noise floor of the given peak amplitude
    pub fn with_noise(mut self, level: f32) -> Self {
        self.noise_level = level;
        self
    }
    
    /// Make the next `count` reads fail while tuned to `freq_hz`
    pub fn fail_reads_at(mut self, freq_hz: f64, count: u32) -> Self {
        self.pending_failures.insert(freq_key(freq_hz), count);
        self
    }
    
    /// Make `configure` fail, as if the device could not be opened
    pub fn fail_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }
    
    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }
    
    /// Total reads attempted, successful or not
    pub fn read_attempts(&self) -> u64 {
        self.read_attempts
    }
    
    pub fn is_closed(&self) -> bool {
        self.closed
    }
    
    fn synthesize(&self, n: usize) -> SampleBatch {
        let mut batch = vec![Sample::new(0.0, 0.0); n];
        let nyquist = self.sample_rate / 2.0;
        
        for carrier in &self.carriers {
            let offset = carrier.freq_hz - self.center_freq;
            if offset.abs() >= nyquist {
                continue;
            }
            let step = 2.0 * PI * offset / self.sample_rate;
            for (k, sample) in batch.iter_mut().enumerate() {
                let phase = step * k as f64;
                sample.re += (carrier.amplitude * phase.cos()) as f32;
                sample.im += (carrier.amplitude * phase.sin()) as f32;
            }
        }
        
        if self.noise_level > 0.0 {
            let mut state = (freq_key(self.center_freq) ^ self.read_attempts) as u32 | 1;
            for sample in batch.iter_mut() {
                state = xorshift(state);
                sample.re += self.noise_level * (state as f32 / u32::MAX as f32 - 0.5);
                state = xorshift(state);
                sample.im += self.noise_level * (state as f32 / u32::MAX as f32 - 0.5);
            }
        }
        
        batch
    }
}

fn freq_key(freq_hz: f64) -> u64 {
    freq_hz.round() as u64
}

fn xorshift(mut x: u32) -> u32 {
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

impl SampleDevice for SimulatedDevice {
    fn configure(&mut self, settings: &TunerSettings) -> Result<(), HardwareError> {
        if self.fail_configure {
            return Err(HardwareError::NoDevice);
        }
        if settings.sample_rate <= 0.0 {
            return Err(HardwareError::Configure(format!(
                "unsupported sample rate {}",
                settings.sample_rate
            )));
        }
        self.sample_rate = settings.sample_rate;
        Ok(())
    }
    
    fn set_center_freq(&mut self, freq_hz: f64) -> Result<(), HardwareError> {
        if self.closed {
            return Err(HardwareError::Tune {
                freq_hz,
                reason: "device closed".to_string(),
            });
        }
        self.center_freq = freq_hz;
        Ok(())
    }
    
    fn try_read(&mut self, n: usize) -> Result<SampleBatch, HardwareError> {
        self.read_attempts += 1;
        if self.closed {
            return Err(HardwareError::Read("device closed".to_string()));
        }
        if let Some(remaining) = self.pending_failures.get_mut(&freq_key(self.center_freq)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HardwareError::Read("simulated USB transfer error".to_string()));
            }
        }
        Ok(self.synthesize(n))
    }
    
    fn close(&mut self) -> Result<(), HardwareError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_carrier_only_visible_within_bandwidth() {
        let mut device = SimulatedDevice::new(2_000_000.0).with_carrier(471e6, 0.5);
        
        device.set_center_freq(470.5e6).unwrap();
        let near = device.try_read(256).unwrap();
        assert!(near.iter().any(|s| s.norm() > 0.4));
        
        device.set_center_freq(474e6).unwrap();
        let far = device.try_read(256).unwrap();
        assert!(far.iter().all(|s| s.norm() == 0.0));
    }
    
    #[test]
    fn test_same_tuning_gives_same_samples() {
        let mut device = SimulatedDevice::new(2_000_000.0).with_carrier(470.2e6, 0.3);
        device.set_center_freq(470e6).unwrap();
        let a = device.try_read(128).unwrap();
        let b = device.try_read(128).unwrap();
        assert_eq!(a, b);
    }
    
    #[test]
    fn test_configure_failure() {
        let mut device = SimulatedDevice::new(2_000_000.0).fail_configure();
        let settings = TunerSettings {
            sample_rate: 2_000_000.0,
            gain: 20.0,
            freq_correction: 0,
        };
        assert_eq!(device.configure(&settings), Err(HardwareError::NoDevice));
    }
}
