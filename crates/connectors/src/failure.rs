use dashmap::DashMap;
use reengage_core::{ReengageError, ReengageResult};

/// One-shot failures keyed by operation name.
#[derive(Default)]
pub struct FailureInjector {
    pending: DashMap<&'static str, String>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` fail with `message`.
    pub fn inject(&self, operation: &'static str, message: impl Into<String>) {
        self.pending.insert(operation, message.into());
    }

    /// Consume a pending failure for `operation`, if any.
    pub fn check(&self, service: &'static str, operation: &'static str) -> ReengageResult<()> {
        match self.pending.remove(operation) {
            Some((_, message)) => Err(ReengageError::service(service, operation, message)),
            None => Ok(()),
        }
    }
}
