//! Cooperative cancellation.
//!
//! Cancellation signals arrive on the gateway side while the canceled job
//! may be queued, running, finished, or entirely unknown. The registry
//! records the marked ids; a per-job token consumes the mark the first
//! time the job observes it and stays latched from then on. An entry for
//! an id with no queued or active job is simply never consumed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Set of request ids flagged for cancellation.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    canceled: Mutex<HashSet<String>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag a request id for cancellation.
    pub fn mark(&self, request_id: &str) {
        let mut canceled = self.canceled.lock().expect("cancellation set poisoned");
        canceled.insert(request_id.to_string());
    }

    /// Consume the mark for `request_id`, returning whether it was set.
    pub fn take(&self, request_id: &str) -> bool {
        let mut canceled = self.canceled.lock().expect("cancellation set poisoned");
        canceled.remove(request_id)
    }

    /// Whether `request_id` is currently marked. Does not consume.
    pub fn is_marked(&self, request_id: &str) -> bool {
        let canceled = self.canceled.lock().expect("cancellation set poisoned");
        canceled.contains(request_id)
    }
}

/// Per-job cancellation token handed to the handler.
///
/// The token is owned by the currently-executing job, so cancellation
/// state can never leak across jobs. Handlers poll it at their own safe
/// points; the engine never preempts a running computation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    request_id: String,
    registry: Arc<CancellationRegistry>,
    requested: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new(request_id: impl Into<String>, registry: Arc<CancellationRegistry>) -> Self {
        Self {
            request_id: request_id.into(),
            registry,
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Whether cancellation has been requested for this job.
    ///
    /// Latches on first observation: a cancellation signal arriving at any
    /// point during execution is visible to every later poll.
    pub fn is_cancellation_requested(&self) -> bool {
        if self.requested.load(Ordering::Acquire) {
            return true;
        }
        if self.registry.take(&self.request_id) {
            self.requested.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Checkpoint helper: fail with [`Error::Canceled`] when canceled.
    pub fn bail_if_canceled(&self) -> Result<()> {
        if self.is_cancellation_requested() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_consumed_once() {
        let registry = CancellationRegistry::new();
        registry.mark("r1");

        assert!(registry.is_marked("r1"));
        assert!(registry.take("r1"));
        assert!(!registry.take("r1"));
        assert!(!registry.is_marked("r1"));
    }

    #[test]
    fn test_unknown_id_is_never_consumed() {
        let registry = CancellationRegistry::new();
        registry.mark("never-submitted");

        // Nothing observes the entry, it just stays in the set.
        assert!(registry.is_marked("never-submitted"));
        assert!(!registry.take("other"));
    }

    #[test]
    fn test_token_latches() {
        let registry = Arc::new(CancellationRegistry::new());
        let token = CancellationToken::new("r1", registry.clone());

        assert!(!token.is_cancellation_requested());

        // Cancellation arrives mid-flight.
        registry.mark("r1");
        assert!(token.is_cancellation_requested());

        // The registry entry was consumed, but the token stays latched.
        assert!(!registry.is_marked("r1"));
        assert!(token.is_cancellation_requested());
        assert!(token.bail_if_canceled().is_err());
    }

    #[test]
    fn test_tokens_do_not_cross_jobs() {
        let registry = Arc::new(CancellationRegistry::new());
        registry.mark("r1");

        let token_a = CancellationToken::new("r1", registry.clone());
        let token_b = CancellationToken::new("r2", registry);

        assert!(token_a.is_cancellation_requested());
        assert!(!token_b.is_cancellation_requested());
    }
}
