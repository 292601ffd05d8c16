//! Presentation events
//! 
//! The sweep thread never waits on the presentation side: events go into a
//! fixed-capacity ring buffer and are dropped when it is full.

use super::orchestrator::SessionState;
use crate::aggregate::SpectrumViews;
use crate::error::FaultReport;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use serde::Serialize;

/// Default number of buffered events
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// 1-based pass index
    pub pass: usize,
    pub passes: usize,
    pub freq_hz: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Progress(ProgressUpdate),
    
    /// A pass finished and its record was aggregated
    PassComplete {
        pass: usize,
        passes: usize,
        views: SpectrumViews,
    },
    
    Fault(FaultReport),
    
    /// Final state once the worker exits
    Finished { state: SessionState },
}

/// Consumer of session events; never mutates core state
pub trait Presentation: Send {
    fn on_event(&mut self, event: SessionEvent);
}

impl<F: FnMut(SessionEvent) + Send> Presentation for F {
    fn on_event(&mut self, event: SessionEvent) {
        self(event)
    }
}

/// Discards every event
pub struct NullPresentation;

impl Presentation for NullPresentation {
    fn on_event(&mut self, _event: SessionEvent) {}
}

/// Bounded event queue between the sweep thread and a presentation layer
pub struct EventChannel {
    producer: HeapProducer<SessionEvent>,
    consumer: HeapConsumer<SessionEvent>,
    capacity: usize,
}

impl EventChannel {
    /// Create new channel with given capacity
    /// 
    /// # Arguments
    /// * `capacity` - Maximum number of undelivered events
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<SessionEvent>::new(capacity.max(1));
        let (producer, consumer) = rb.split();
        
        Self {
            producer,
            consumer,
            capacity: capacity.max(1),
        }
    }
    
    /// Split into producer and consumer ends
    pub fn split(self) -> (EventProducer, EventConsumer) {
        (
            EventProducer {
                producer: self.producer,
                dropped: 0,
            },
            EventConsumer {
                consumer: self.consumer,
                capacity: self.capacity,
            },
        )
    }
    
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Sweep-side end of an [`EventChannel`]
pub struct EventProducer {
    producer: HeapProducer<SessionEvent>,
    dropped: u64,
}

impl EventProducer {
    /// Queue `event`; returns false if the buffer was full and it was dropped
    pub fn push(&mut self, event: SessionEvent) -> bool {
        if self.producer.push(event).is_err() {
            self.dropped += 1;
            return false;
        }
        true
    }
    
    /// Events lost to a full buffer
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Presentation for EventProducer {
    fn on_event(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

/// Presentation-side end of an [`EventChannel`]
pub struct EventConsumer {
    consumer: HeapConsumer<SessionEvent>,
    capacity: usize,
}

impl EventConsumer {
    pub fn pop(&mut self) -> Option<SessionEvent> {
        self.consumer.pop()
    }
    
    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        self.consumer.pop_iter().collect()
    }
    
    pub fn len(&self) -> usize {
        self.consumer.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
    
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
