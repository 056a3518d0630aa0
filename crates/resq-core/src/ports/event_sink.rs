//! EventSink port - lifecycle observers.
//!
//! Sinks are called inline on the worker's task, so they should be quick.
//! They cannot veto or fail a job.

use crate::domain::JobEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &JobEvent<'_>);
}

/// Fan an event out to several sinks, in registration order.
#[derive(Default)]
pub struct EventSinks {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl EventSinks {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Register another observer.
    pub fn listen(&mut self, sink: std::sync::Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for EventSinks {
    fn emit(&self, event: &JobEvent<'_>) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
