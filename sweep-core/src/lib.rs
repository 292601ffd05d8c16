//! RF Sweep - Spectrum Scanning Core
//! 
//! Steps a tunable receiver across a frequency range, reduces each capture to
//! a peak magnitude and aggregates the sweeps into recent, running-average and
//! max-hold views.

pub mod aggregate;
pub mod error;
pub mod hardware;
pub mod session;
pub mod spectrum;
pub mod storage;
pub mod sweep;

pub use aggregate::{AggregationEngine, DbmScale, SpectrumViews, SweepRecord};
pub use error::{FaultKind, FaultReport, SessionError};
pub use hardware::{Receiver, RetryPolicy, RetryingReceiver, SimulatedDevice};
pub use session::{SessionState, SweepSession};
pub use spectrum::{estimate, SpectrumEstimator};
pub use storage::{JsonStore, RecordFilter, RecordStore};
pub use sweep::{ScanConfig, SweepConfig, SweepController};
