//! Bounded retry around a raw sample device

use super::{HardwareError, Receiver, Sample, SampleBatch, SampleDevice, TunerSettings};
use log::{debug, warn};
use std::time::Duration;

/// Retry schedule for transient read failures (e.g. USB hiccups)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total read attempts, including the first
    pub max_attempts: u32,
    
    /// Sleep before the second attempt
    pub initial_backoff: Duration,
    
    /// Backoff growth factor per attempt
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps (tests, simulation)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }
    
    /// Backoff to wait after the given failed attempt (1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor)
    }
}

/// [`Receiver`] that retries reads and degrades to zeroed batches
pub struct RetryingReceiver<D: SampleDevice> {
    device: D,
    policy: RetryPolicy,
    center_freq: f64,
    exhausted: u64,
}

impl<D: SampleDevice> RetryingReceiver<D> {
    pub fn new(device: D, policy: RetryPolicy) -> Self {
        Self {
            device,
            policy,
            center_freq: 0.0,
            exhausted: 0,
        }
    }
    
    /// Number of reads that ran out of attempts
    pub fn exhausted_reads(&self) -> u64 {
        self.exhausted
    }
    
    pub fn device(&self) -> &D {
        &self.device
    }
    
    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D: SampleDevice> Receiver for RetryingReceiver<D> {
    fn configure(&mut self, settings: &TunerSettings) -> Result<(), HardwareError> {
        self.device.configure(settings)
    }
    
    fn tune(&mut self, freq_hz: f64) -> Result<(), HardwareError> {
        self.device.set_center_freq(freq_hz)?;
        self.center_freq = freq_hz;
        Ok(())
    }
    
    fn read_samples(&mut self, n: usize) -> SampleBatch {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.device.try_read(n) {
                Ok(mut batch) => {
                    // Short reads are padded so the batch length is always n
                    batch.resize(n, Sample::new(0.0, 0.0));
                    return batch;
                }
                Err(e) => {
                    debug!(
                        "Read attempt {}/{} at {:.3} MHz failed: {}",
                        attempt,
                        attempts,
                        self.center_freq / 1e6,
                        e
                    );
                    if attempt < attempts {
                        std::thread::sleep(self.policy.backoff_after(attempt));
                    }
                }
            }
        }
        
        self.exhausted += 1;
        warn!(
            "Giving up on {:.3} MHz after {} attempts, substituting a zeroed batch",
            self.center_freq / 1e6,
            attempts
        );
        vec![Sample::new(0.0, 0.0); n]
    }
    
    fn close(&mut self) -> Result<(), HardwareError> {
        self.device.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedDevice;
    
    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_millis(50));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(200));
    }
    
    #[test]
    fn test_exhausted_retries_yield_zeroed_batch() {
        let device = SimulatedDevice::new(2_048_000.0).fail_reads_at(470e6, u32::MAX);
        let mut rx = RetryingReceiver::new(device, RetryPolicy::immediate(3));
        
        rx.tune(470e6).unwrap();
        let batch = rx.read_samples(64);
        
        assert_eq!(batch.len(), 64);
        assert!(batch.iter().all(|s| s.re == 0.0 && s.im == 0.0));
        assert_eq!(rx.exhausted_reads(), 1);
        assert_eq!(rx.device().read_attempts(), 3);
    }
    
    #[test]
    fn test_transient_failure_recovers() {
        let device = SimulatedDevice::new(2_048_000.0)
            .with_carrier(470.1e6, 0.8)
            .fail_reads_at(470e6, 2);
        let mut rx = RetryingReceiver::new(device, RetryPolicy::immediate(3));
        
        rx.tune(470e6).unwrap();
        let batch = rx.read_samples(64);
        
        assert_eq!(rx.exhausted_reads(), 0);
        assert!(batch.iter().any(|s| s.norm() > 0.0));
    }
}
