//! Per-request ambient state.

use crate::quota::{CancelSource, RequestMetrics, RequestQuota};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use weft_core::{GraphQLError, LineIndex, Location, Span};

/// Ambient state for one request, shared across operation-field tasks.
///
/// The error list is touched from concurrent tasks and sits behind a mutex;
/// it is cold compared to the atomic metrics counters. Everything else is
/// read-only after construction.
#[derive(Debug)]
pub struct RequestContext {
    /// Coerced variable values.
    pub variables: HashMap<String, Value>,
    /// The request quota.
    pub quota: RequestQuota,
    /// The cancellation source.
    pub cancel: CancelSource,
    /// Request counters.
    pub metrics: RequestMetrics,
    /// Caller-supplied principal, opaque to the engine.
    pub principal: Option<Value>,
    line_index: LineIndex,
    errors: Mutex<Vec<GraphQLError>>,
    failed: AtomicBool,
}

impl RequestContext {
    /// Creates a request context.
    #[must_use]
    pub fn new(
        variables: HashMap<String, Value>,
        quota: RequestQuota,
        cancel: CancelSource,
        line_index: LineIndex,
    ) -> Self {
        Self {
            variables,
            quota,
            cancel,
            metrics: RequestMetrics::default(),
            principal: None,
            line_index,
            errors: Mutex::new(Vec::new()),
            failed: AtomicBool::new(false),
        }
    }

    /// Sets the caller-supplied principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Records an error and raises the failure flag.
    pub fn push_error(&self, error: GraphQLError) {
        self.failed.store(true, Ordering::Release);
        let mut errors = self.errors.lock().expect("error list poisoned");
        errors.push(error);
    }

    /// Returns true if any error was recorded.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Takes the accumulated errors.
    pub fn take_errors(&self) -> Vec<GraphQLError> {
        let mut errors = self.errors.lock().expect("error list poisoned");
        std::mem::take(&mut *errors)
    }

    /// Resolves a span to a line/column location.
    #[must_use]
    pub fn location_of(&self, span: Span) -> Location {
        self.line_index.location_of(span)
    }

    /// Gets a variable value by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}
