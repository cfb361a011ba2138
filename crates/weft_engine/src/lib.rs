//! Mapping and execution pipeline for the weft GraphQL engine.
//!
//! This crate maps a parsed request onto the schema model and executes it:
//! - `request`: the parsed-request model consumed from the parser
//! - `mapper`: selection-to-schema mapping with polymorphic fan-out
//! - `scope`: the path-addressed output tree
//! - `resolver`: the resolver contract and dispatch registry
//! - `field`: per-field ephemeral state exposed to resolvers
//! - `coerce`: the scalar/enum/input value-coercion contract
//! - `quota`: per-request resource quotas and cancellation
//! - `context`: per-request ambient state
//! - `executor`: level-order field resolution with batching
//! - `directives`: skip/include directive evaluation
//! - `response`: the response object

pub mod coerce;
pub mod context;
pub mod directives;
pub mod executor;
pub mod field;
pub mod mapper;
pub mod quota;
pub mod request;
pub mod resolver;
pub mod response;
pub mod scope;

pub use context::RequestContext;
pub use directives::{DirectiveHandler, DirectiveSet};
pub use executor::{Engine, ExecuteRequest};
pub use field::{BatchedResults, FieldContext};
pub use mapper::{MappedField, MappedRequest, MappedSelectionSet, Mapper, SetId};
pub use quota::{CancelHandle, CancelSource, RequestMetrics, RequestQuota};
pub use request::{
    Argument, DirectiveNode, Document, FieldNode, Fragment, InlineNode, Operation, OperationKind,
    Selection, SpreadNode, ValueNode, VariableDef,
};
pub use resolver::{
    AsyncFnResolver, FnResolver, PropertyResolver, RequestHooks, Resolver, ResolverError,
    ResolverFuture, ResolverRegistry, ResolverResult,
};
pub use response::Response;
pub use scope::{OutputScope, OutputValue, ScopeArena, ScopeId};
