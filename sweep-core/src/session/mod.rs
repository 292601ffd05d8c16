//! Session state machine and presentation events

pub mod events;
pub mod orchestrator;

pub use events::{
    EventChannel, EventConsumer, EventProducer, NullPresentation, Presentation, ProgressUpdate,
    SessionEvent,
};
pub use orchestrator::{
    run_passes, SessionSettings, SessionState, SessionStatus, SessionSummary, SweepSession,
};
