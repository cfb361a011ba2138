//! Per-request resource quotas and cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resource bounds for one request. Fixed at request start.
#[derive(Debug, Clone)]
pub struct RequestQuota {
    /// Maximum field nesting depth of the output tree.
    pub max_depth: usize,
    /// Maximum number of output objects created.
    pub max_output_objects: usize,
    /// Maximum wall-clock time for the request.
    pub max_request_time: Duration,
}

impl Default for RequestQuota {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_output_objects: 100_000,
            max_request_time: Duration::from_secs(30),
        }
    }
}

impl RequestQuota {
    /// Sets the maximum depth.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum output object count.
    #[must_use]
    pub fn with_max_output_objects(mut self, count: usize) -> Self {
        self.max_output_objects = count;
        self
    }

    /// Sets the maximum request time.
    #[must_use]
    pub fn with_max_request_time(mut self, time: Duration) -> Self {
        self.max_request_time = time;
        self
    }
}

/// A handle the transport layer uses to cancel a request externally.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// The per-request cancellation source: a deadline derived from
/// `RequestQuota::max_request_time` composed with an optional external
/// handle. Polled at traversal-level boundaries.
#[derive(Debug, Clone)]
pub struct CancelSource {
    deadline: Instant,
    own: CancelHandle,
    external: Option<CancelHandle>,
}

impl CancelSource {
    /// Derives a cancellation source from the request quota.
    #[must_use]
    pub fn new(quota: &RequestQuota) -> Self {
        Self {
            deadline: Instant::now() + quota.max_request_time,
            own: CancelHandle::new(),
            external: None,
        }
    }

    /// Composes an externally supplied cancellation handle.
    #[must_use]
    pub fn with_external(mut self, handle: CancelHandle) -> Self {
        self.external = Some(handle);
        self
    }

    /// Requests cancellation from inside the engine.
    pub fn cancel(&self) {
        self.own.cancel();
    }

    /// Returns true if the request is cancelled or past its deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.own.is_cancelled()
            || self.external.as_ref().is_some_and(CancelHandle::is_cancelled)
            || Instant::now() >= self.deadline
    }
}

/// Per-request counters, updated with atomic increments from concurrent
/// operation-field tasks.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    output_objects: AtomicUsize,
    resolver_calls: AtomicUsize,
}

impl RequestMetrics {
    /// Increments the output-object counter and returns the new total.
    pub fn add_output_object(&self) -> usize {
        self.output_objects.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Increments the resolver-call counter.
    pub fn add_resolver_call(&self) {
        self.resolver_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of output objects created.
    #[must_use]
    pub fn output_objects(&self) -> usize {
        self.output_objects.load(Ordering::Relaxed)
    }

    /// Returns the number of resolver invocations.
    #[must_use]
    pub fn resolver_calls(&self) -> usize {
        self.resolver_calls.load(Ordering::Relaxed)
    }
}

/// The abort sentinel raised on quota violation, cancellation or an
/// explicit resolver abort. It unwinds only the owning operation field's
/// traversal loop; the error itself is recorded on the request context
/// before the sentinel is raised, so the sentinel carries only the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExecAbort {
    #[error("quota exceeded")]
    Quota,
    #[error("request cancelled")]
    Cancelled,
    #[error("resolver aborted execution")]
    Resolver,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle_composition() {
        let external = CancelHandle::new();
        let source = CancelSource::new(&RequestQuota::default()).with_external(external.clone());
        assert!(!source.is_cancelled());
        external.cancel();
        assert!(source.is_cancelled());
    }

    #[test]
    fn test_deadline_cancellation() {
        let quota = RequestQuota::default().with_max_request_time(Duration::ZERO);
        let source = CancelSource::new(&quota);
        assert!(source.is_cancelled());
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = RequestMetrics::default();
        assert_eq!(metrics.add_output_object(), 1);
        assert_eq!(metrics.add_output_object(), 2);
        metrics.add_resolver_call();
        assert_eq!(metrics.output_objects(), 2);
        assert_eq!(metrics.resolver_calls(), 1);
    }
}
