//! Sweep configuration and the frequency sweep controller

pub mod bands;
pub mod config;
pub mod controller;

pub use bands::{Band, BandTable, FrequencyRange};
pub use config::{ConfigError, Location, ScanConfig, SweepConfig, SweepParams};
pub use controller::{
    percent_complete, sweep, ProgressSink, StepError, StepFault, SweepController, SweepPoint,
};
