//! The response object returned to the transport layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_core::GraphQLError;

/// An execution response: data, errors, or both for partial results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Errors collected during mapping and execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
}

impl Response {
    /// Creates a data-only response.
    #[must_use]
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// Creates an error-only response.
    #[must_use]
    pub fn error(error: GraphQLError) -> Self {
        Self::errors(vec![error])
    }

    /// Creates an error-only response from a list.
    #[must_use]
    pub fn errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    /// Creates a partial response carrying both data and errors.
    #[must_use]
    pub fn partial(data: Value, errors: Vec<GraphQLError>) -> Self {
        Self {
            data: Some(data),
            errors: if errors.is_empty() { None } else { Some(errors) },
        }
    }

    /// Returns true if the response carries errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Returns true if the response carries data.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}
