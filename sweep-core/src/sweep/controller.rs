//! Frequency sweep controller
//! 
//! Walks the configured range one tuned frequency at a time, captures a
//! batch, reduces its spectrum to a peak and yields `(frequency, peak)`.
//! The sweep is lazy and finite; creating a new controller re-tunes from
//! `start_freq`.

use super::config::SweepConfig;
use crate::hardware::{HardwareError, Receiver};
use crate::spectrum::{EstimateError, SpectrumEstimator};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// One measured step of a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub freq_hz: f64,
    pub peak_power: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error(transparent)]
    Tune(#[from] HardwareError),
    
    #[error(transparent)]
    Estimate(#[from] EstimateError),
}

/// A step that was skipped, kept for fault reporting
#[derive(Debug, Clone, PartialEq)]
pub struct StepFault {
    pub freq_hz: f64,
    pub error: StepError,
}

/// Receives `(current_freq, percent_complete)` after every step
pub trait ProgressSink {
    fn progress(&mut self, freq_hz: f64, percent: f64);
}

impl<F: FnMut(f64, f64)> ProgressSink for F {
    fn progress(&mut self, freq_hz: f64, percent: f64) {
        self(freq_hz, percent)
    }
}

/// Position of `freq_hz` within the sweep range, clamped to [0, 100]
pub fn percent_complete(freq_hz: f64, start: f64, end: f64) -> f64 {
    ((freq_hz - start) / (end - start) * 100.0).clamp(0.0, 100.0)
}

/// Lazy iterator over the steps of one sweep
pub struct SweepController<'a, R: Receiver + ?Sized> {
    config: &'a SweepConfig,
    receiver: &'a mut R,
    estimator: SpectrumEstimator,
    progress: Option<&'a mut dyn ProgressSink>,
    cancel: Option<&'a AtomicBool>,
    next_step: usize,
    faults: Vec<StepFault>,
    cancelled: bool,
}

/// Start a sweep over `config` using `receiver`
pub fn sweep<'a, R: Receiver + ?Sized>(
    config: &'a SweepConfig,
    receiver: &'a mut R,
) -> Result<SweepController<'a, R>, EstimateError> {
    SweepController::new(config, receiver)
}

impl<'a, R: Receiver + ?Sized> SweepController<'a, R> {
    pub fn new(config: &'a SweepConfig, receiver: &'a mut R) -> Result<Self, EstimateError> {
        Ok(Self {
            config,
            receiver,
            estimator: SpectrumEstimator::new(config.fft_size())?,
            progress: None,
            cancel: None,
            next_step: 0,
            faults: Vec::new(),
            cancelled: false,
        })
    }
    
    /// Report progress to `sink` after each step
    pub fn with_progress(mut self, sink: &'a mut dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }
    
    /// Stop before the next capture once `flag` is set
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }
    
    /// Steps skipped so far
    pub fn faults(&self) -> &[StepFault] {
        &self.faults
    }
    
    pub fn take_faults(&mut self) -> Vec<StepFault> {
        std::mem::take(&mut self.faults)
    }
    
    /// True if the sweep ended early on cancellation
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
    
    /// True once every step has been visited
    pub fn is_complete(&self) -> bool {
        self.next_step >= self.config.steps()
    }
    
    fn measure(&mut self, freq_hz: f64) -> Result<f64, StepError> {
        self.receiver.tune(freq_hz)?;
        let batch = self.receiver.read_samples(self.config.samples_per_step());
        Ok(self.estimator.peak_power(&batch)?)
    }
    
    fn report(&mut self, freq_hz: f64) {
        if let Some(sink) = self.progress.as_mut() {
            let percent = percent_complete(freq_hz, self.config.start_freq(), self.config.end_freq());
            sink.progress(freq_hz, percent);
        }
    }
}

impl<'a, R: Receiver + ?Sized> Iterator for SweepController<'a, R> {
    type Item = SweepPoint;
    
    fn next(&mut self) -> Option<SweepPoint> {
        while !self.is_complete() {
            if self.cancel.map_or(false, |flag| flag.load(Ordering::SeqCst)) {
                self.cancelled = true;
                return None;
            }
            
            let freq_hz = self.config.frequency_at(self.next_step);
            self.next_step += 1;
            
            let outcome = self.measure(freq_hz);
            self.report(freq_hz);
            
            match outcome {
                Ok(peak_power) => {
                    debug!("{:.3} MHz: peak {:.3}", freq_hz / 1e6, peak_power);
                    return Some(SweepPoint { freq_hz, peak_power });
                }
                Err(error) => {
                    warn!("Skipping {:.3} MHz: {}", freq_hz / 1e6, error);
                    self.faults.push(StepFault { freq_hz, error });
                }
            }
        }
        None
    }
}
