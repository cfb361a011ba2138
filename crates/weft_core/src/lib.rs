//! Core types for the weft GraphQL engine.
//!
//! This crate provides the types shared by every other crate:
//! - `span`: byte-offset spans and line/column locations for diagnostics
//! - `path`: response paths (field keys and list indices from the root)
//! - `error`: the response-facing error object and error code taxonomy

pub mod error;
pub mod path;
pub mod span;

pub use error::{ErrorCode, GraphQLError};
pub use path::{PathSegment, ResponsePath};
pub use span::{LineIndex, Location, Span};
