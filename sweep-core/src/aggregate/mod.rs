//! Multi-pass aggregation of completed sweeps

pub mod engine;
pub mod record;
pub mod units;

pub use engine::{
    average_power, merge_max_hold, AggregateState, AggregationEngine, EngineSettings,
    SpectrumPoints, SpectrumViews,
};
pub use record::{RecordError, SweepRecord};
pub use units::{DbmScale, DBM_DECIMALS, DEFAULT_CALIBRATION_OFFSET, DEFAULT_DBM_FLOOR};
