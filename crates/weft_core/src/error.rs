//! Response-facing errors.

use crate::path::ResponsePath;
use crate::span::{LineIndex, Location, Span};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Machine-readable error category, carried in `extensions.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Structural or mapping failure in the request.
    BadRequest,
    /// Argument/variable coercion or not-null violation.
    InputError,
    /// A resolver returned an error.
    ResolverError,
    /// Unexpected internal fault.
    ServerError,
    /// Depth, object-count or time quota exceeded.
    Quota,
    /// The request was cancelled.
    Cancelled,
}

impl ErrorCode {
    /// Returns the wire string for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::InputError => "INPUT_ERROR",
            Self::ResolverError => "RESOLVER_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::Quota => "QUOTA",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error entry in the response `errors` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable message.
    pub message: String,
    /// Path to the output node the error is anchored at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ResponsePath>,
    /// Source locations in the request text.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locations: Vec<Location>,
    /// Extensions; always carries `code`.
    pub extensions: HashMap<String, serde_json::Value>,
}

impl GraphQLError {
    /// Creates a new error with a code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut extensions = HashMap::new();
        extensions.insert(
            "code".to_string(),
            serde_json::Value::String(code.as_str().to_string()),
        );
        Self {
            message: message.into(),
            path: None,
            locations: Vec::new(),
            extensions,
        }
    }

    /// Anchors the error at a response path.
    #[must_use]
    pub fn with_path(mut self, path: ResponsePath) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds a source location resolved from a span.
    #[must_use]
    pub fn at_span(mut self, span: Span, index: &LineIndex) -> Self {
        self.locations.push(index.location_of(span));
        self
    }

    /// Adds a source location directly.
    #[must_use]
    pub fn at_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Adds an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Returns the error code, if well-formed.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(|v| v.as_str())
    }
}

impl std::fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(path) = &self.path {
            write!(f, " (at {path})")?;
        }
        Ok(())
    }
}
