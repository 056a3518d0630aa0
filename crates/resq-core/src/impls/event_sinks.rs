//! Event sinks: log lines, nothing, or a recording for tests.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::domain::JobEvent;
use crate::ports::EventSink;

/// Writes every lifecycle event as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &JobEvent<'_>) {
        match event {
            JobEvent::BeforePerform { job, token, queue } => {
                info!(event = event.name(), job, %token, queue, "job started")
            }
            JobEvent::AfterPerform { job, token, queue } => {
                info!(event = event.name(), job, %token, queue, "job finished")
            }
            JobEvent::JobFailed {
                job,
                token,
                queue,
                error,
            } => warn!(event = event.name(), job, %token, queue, %error, "job failed"),
            JobEvent::FailedJobNotification {
                job,
                token,
                queue,
                worker,
            } => warn!(
                event = event.name(),
                job,
                %token,
                queue,
                worker,
                "job gave up after exhausting its attempts"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &JobEvent<'_>) {}
}

/// Keeps `(event name, token)` pairs in arrival order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    seen: Mutex<Vec<(String, String)>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    /// Just the event names.
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|(name, _)| name).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &JobEvent<'_>) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((event.name().to_string(), event.token().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobToken;
    use crate::ports::EventSinks;
    use std::sync::Arc;

    #[test]
    fn fan_out_reaches_every_sink_in_order() {
        let first = Arc::new(RecordingEventSink::new());
        let second = Arc::new(RecordingEventSink::new());
        let mut sinks = EventSinks::new();
        sinks.listen(first.clone());
        sinks.listen(Arc::new(NoopEventSink));
        sinks.listen(second.clone());
        assert_eq!(sinks.len(), 3);

        let token = JobToken::new("t-1");
        sinks.emit(&JobEvent::BeforePerform {
            job: "SendEmail",
            token: &token,
            queue: "emails",
        });
        sinks.emit(&JobEvent::AfterPerform {
            job: "SendEmail",
            token: &token,
            queue: "emails",
        });

        assert_eq!(first.names(), ["beforePerform", "afterPerform"]);
        assert_eq!(second.events(), first.events());
        assert_eq!(first.events()[0].1, "t-1");
    }
}
