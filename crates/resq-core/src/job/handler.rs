use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::JobRecord;
use crate::error::{JobError, ResqError};

/// The code behind one job name.
///
/// The handler gets the record mutably so it can read its arguments, or
/// `delete` / `release` itself before returning.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn perform(&self, job: &mut JobRecord) -> Result<(), JobError>;
}

/// Registry of handlers (job name -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Shared read-only by the worker afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job name. Names are unique.
    pub fn register(
        &mut self,
        job: impl Into<String>,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), ResqError> {
        let job = job.into();
        if self.handlers.contains_key(&job) {
            return Err(ResqError::DuplicateHandler(job));
        }
        self.handlers.insert(job, handler);
        Ok(())
    }

    pub fn get(&self, job: &str) -> Option<&Arc<dyn JobHandler>> {
        self.handlers.get(job)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OkHandler;

    #[async_trait]
    impl JobHandler for OkHandler {
        async fn perform(&self, _job: &mut JobRecord) -> Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = HandlerRegistry::new();
        reg.register("SendEmail", Arc::new(OkHandler)).unwrap();

        let err = reg.register("SendEmail", Arc::new(OkHandler)).unwrap_err();
        assert!(matches!(err, ResqError::DuplicateHandler(name) if name == "SendEmail"));
        assert_eq!(reg.len(), 1);
        assert!(reg.get("SendEmail").is_some());
        assert!(reg.get("Missing").is_none());
    }
}
