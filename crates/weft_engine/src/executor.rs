//! Level-order request execution.
//!
//! Each top-level field of an operation runs as its own executer: queries
//! concurrently on spawned tasks, mutations sequentially. Results merge
//! into the response in declaration order regardless of completion order.
//!
//! Inside an executer, fields resolve level by level rather than
//! depth-first: every scope created while resolving one level queues for
//! the next, and sibling scopes sharing a selection set and concrete type
//! form one group. A batched field's resolver runs once per group with all
//! parent entities, which is where dataloader-style batching comes from.
//!
//! Quota violations, cancellation and explicit resolver aborts raise an
//! `ExecAbort` sentinel that unwinds only the owning executer's drive
//! loop; everything written up to that point renders as a well-formed
//! partial result.

use crate::coerce::{coerce_variables, convert_leaf_output};
use crate::context::RequestContext;
use crate::directives::DirectiveSet;
use crate::field::FieldContext;
use crate::mapper::{MappedField, MappedRequest, Mapper, SetId};
use crate::quota::{CancelHandle, CancelSource, ExecAbort, RequestQuota};
use crate::request::{Document, OperationKind};
use crate::resolver::{ResolverError, ResolverRegistry};
use crate::response::Response;
use crate::scope::{OutputValue, ScopeArena, ScopeId};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};
use weft_core::{ErrorCode, GraphQLError, LineIndex, ResponsePath, Span};
use weft_schema::{Schema, TypeRef};

/// One execution request.
#[derive(Debug)]
pub struct ExecuteRequest {
    /// The raw request text, used to resolve spans to line/column.
    pub query: String,
    /// The parsed document.
    pub document: Document,
    /// Selects the operation when the document holds more than one.
    pub operation_name: Option<String>,
    /// Externally supplied variable values.
    pub variables: HashMap<String, Value>,
    /// Resource bounds for this request.
    pub quota: RequestQuota,
    /// Optional external cancellation handle.
    pub cancel: Option<CancelHandle>,
    /// The root entity handed to top-level resolvers.
    pub root_value: Value,
    /// Caller-supplied principal, opaque to the engine.
    pub principal: Option<Value>,
}

impl ExecuteRequest {
    /// Creates a request for a parsed document.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            query: String::new(),
            document,
            operation_name: None,
            variables: HashMap::new(),
            quota: RequestQuota::default(),
            cancel: None,
            root_value: Value::Null,
            principal: None,
        }
    }

    /// Attaches the raw request text for diagnostics.
    #[must_use]
    pub fn with_query_text(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Selects an operation by name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Sets the variable values.
    #[must_use]
    pub fn with_variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Sets one variable value.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Sets the request quota.
    #[must_use]
    pub fn with_quota(mut self, quota: RequestQuota) -> Self {
        self.quota = quota;
        self
    }

    /// Attaches an external cancellation handle.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Sets the root entity.
    #[must_use]
    pub fn with_root_value(mut self, value: Value) -> Self {
        self.root_value = value;
        self
    }

    /// Sets the caller-supplied principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }
}

/// The execution engine: a schema model, a resolver registry and a
/// directive set, shared across requests.
#[derive(Debug, Clone)]
pub struct Engine {
    schema: Arc<Schema>,
    resolvers: Arc<ResolverRegistry>,
    directives: Arc<DirectiveSet>,
}

impl Engine {
    /// Creates an engine.
    #[must_use]
    pub fn new(schema: Schema, resolvers: ResolverRegistry) -> Self {
        Self {
            schema: Arc::new(schema),
            resolvers: Arc::new(resolvers),
            directives: Arc::new(DirectiveSet::new()),
        }
    }

    /// Replaces the directive set.
    #[must_use]
    pub fn with_directives(mut self, directives: DirectiveSet) -> Self {
        self.directives = Arc::new(directives);
        self
    }

    /// The schema this engine serves.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Executes one request to completion.
    pub async fn execute(&self, request: ExecuteRequest) -> Response {
        let line_index = LineIndex::new(&request.query);

        let op_index = match self.select_operation(&request) {
            Ok(i) => i,
            Err(response) => return response,
        };
        let operation = &request.document.operations[op_index];

        let variables = match coerce_variables(operation, &request.variables, &self.schema) {
            Ok(v) => v,
            Err(errors) => return Response::errors(errors),
        };

        let mut cancel = CancelSource::new(&request.quota);
        if let Some(handle) = request.cancel {
            cancel = cancel.with_external(handle);
        }
        let mut ctx = RequestContext::new(variables, request.quota, cancel, line_index.clone());
        if let Some(principal) = request.principal {
            ctx = ctx.with_principal(principal);
        }
        let ctx = Arc::new(ctx);

        let mapped = Mapper::new(
            &self.schema,
            &request.document,
            &ctx.variables,
            &self.directives,
            &line_index,
        )
        .map();
        let mapped = match mapped {
            Ok(m) => Arc::new(m),
            Err(errors) => return Response::errors(errors),
        };

        self.resolvers.request_started(&ctx);
        debug!(operation = ?operation.name, kind = ?operation.kind, "executing operation");

        let mapped_op = &mapped.operations[op_index];
        let fields: Vec<MappedField> = mapped
            .set(mapped_op.root)
            .fields_for(&mapped_op.root_type)
            .map(<[_]>::to_vec)
            .unwrap_or_default();

        let mut data = serde_json::Map::new();
        match mapped_op.kind {
            OperationKind::Query => {
                let mut handles = Vec::with_capacity(fields.len());
                for field in fields {
                    let executer = OperationFieldExecuter::new(
                        Arc::clone(&self.schema),
                        Arc::clone(&self.resolvers),
                        Arc::clone(&mapped),
                        Arc::clone(&ctx),
                    );
                    let root_value = request.root_value.clone();
                    let key = field.response_key.clone();
                    handles.push((
                        key,
                        tokio::spawn(async move { executer.run(field, root_value).await }),
                    ));
                }
                // Merge in declaration order regardless of completion order.
                for (key, handle) in handles {
                    let value = match handle.await {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(field = %key, error = %e, "operation field task failed");
                            ctx.push_error(
                                GraphQLError::new(
                                    ErrorCode::ServerError,
                                    format!("operation field '{key}' failed"),
                                )
                                .with_path(ResponsePath::root().child_key(key.clone())),
                            );
                            Value::Null
                        }
                    };
                    data.insert(key, value);
                }
            }
            // Mutation fields run sequentially: each completes before the
            // next starts.
            OperationKind::Mutation => {
                for field in fields {
                    let executer = OperationFieldExecuter::new(
                        Arc::clone(&self.schema),
                        Arc::clone(&self.resolvers),
                        Arc::clone(&mapped),
                        Arc::clone(&ctx),
                    );
                    let key = field.response_key.clone();
                    let value = executer.run(field, request.root_value.clone()).await;
                    data.insert(key, value);
                }
            }
            // A subscription event executes its single root field through
            // the same pipeline; the subscription layer substitutes the
            // payload through the root value or a registered resolver.
            OperationKind::Subscription => {
                if fields.len() != 1 {
                    self.resolvers.request_ended(&ctx);
                    return Response::error(GraphQLError::new(
                        ErrorCode::BadRequest,
                        "subscription operations must select exactly one root field",
                    ));
                }
                for field in fields {
                    let executer = OperationFieldExecuter::new(
                        Arc::clone(&self.schema),
                        Arc::clone(&self.resolvers),
                        Arc::clone(&mapped),
                        Arc::clone(&ctx),
                    );
                    let key = field.response_key.clone();
                    let value = executer.run(field, request.root_value.clone()).await;
                    data.insert(key, value);
                }
            }
        }

        self.resolvers.request_ended(&ctx);
        Response::partial(Value::Object(data), ctx.take_errors())
    }

    fn select_operation(&self, request: &ExecuteRequest) -> Result<usize, Response> {
        let bad_request = |message: String| {
            Response::error(GraphQLError::new(ErrorCode::BadRequest, message))
        };
        let operations = &request.document.operations;
        let index = match &request.operation_name {
            Some(name) => operations
                .iter()
                .position(|op| op.name.as_deref() == Some(name))
                .ok_or_else(|| bad_request(format!("unknown operation '{name}'")))?,
            None => match operations.len() {
                0 => return Err(bad_request("document contains no operations".to_string())),
                1 => 0,
                n => {
                    return Err(bad_request(format!(
                        "document contains {n} operations; an operation name is required"
                    )))
                }
            },
        };
        Ok(index)
    }
}

/// Executes one top-level field: owns the scope arena and the pending
/// queue for its subtree.
struct OperationFieldExecuter {
    schema: Arc<Schema>,
    resolvers: Arc<ResolverRegistry>,
    mapped: Arc<MappedRequest>,
    request: Arc<RequestContext>,
    arena: ScopeArena,
    pending: VecDeque<ScopeId>,
}

impl OperationFieldExecuter {
    fn new(
        schema: Arc<Schema>,
        resolvers: Arc<ResolverRegistry>,
        mapped: Arc<MappedRequest>,
        request: Arc<RequestContext>,
    ) -> Self {
        Self {
            schema,
            resolvers,
            mapped,
            request,
            arena: ScopeArena::new(),
            pending: VecDeque::new(),
        }
    }

    /// Resolves the top-level field and drives its subtree level by level.
    /// Always renders: an abort leaves the output written so far intact.
    async fn run(mut self, field: MappedField, root_entity: Value) -> Value {
        if field.def.name == "__typename" {
            return Value::String(field.parent_type);
        }

        let path = ResponsePath::root().child_key(field.response_key.clone());
        let root_output = match self.resolve_root(&field, root_entity, &path).await {
            Ok(output) => output,
            Err(abort) => {
                debug!(field = %field.response_key, cause = %abort, "operation field aborted");
                return Value::Null;
            }
        };

        if let Err(abort) = self.drive().await {
            debug!(field = %field.response_key, cause = %abort, "operation field aborted");
        }
        self.arena.render(&root_output)
    }

    async fn resolve_root(
        &mut self,
        field: &MappedField,
        root_entity: Value,
        path: &ResponsePath,
    ) -> Result<OutputValue, ExecAbort> {
        let ctx = match FieldContext::bind(
            Arc::clone(&self.request),
            &self.schema,
            field,
            path.clone(),
            vec![root_entity.clone()],
        ) {
            Ok(ctx) => ctx,
            Err(e) => {
                self.request.push_error(e);
                return Ok(OutputValue::Null);
            }
        };
        let resolver = self
            .resolvers
            .lookup(&field.parent_type, &field.parent_type, &field.def.name);
        self.request.metrics.add_resolver_call();
        let value = match resolver.resolve(&ctx).await {
            Ok(value) => value,
            Err(e) => {
                self.resolver_failure(e, path, field.span)?;
                return Ok(OutputValue::Null);
            }
        };
        let value = match ctx.take_batched() {
            Some(results) => results.result_for(&root_entity),
            None => value,
        };
        self.convert_output(value, &field.def.ty, field.subset, path.clone(), field.span)
    }

    /// The level loop: drains all pending scopes as one level, which
    /// queues the next. Cancellation is polled at level boundaries.
    async fn drive(&mut self) -> Result<(), ExecAbort> {
        while !self.pending.is_empty() {
            if self.request.cancel.is_cancelled() {
                self.request.push_error(GraphQLError::new(
                    ErrorCode::Cancelled,
                    "request cancelled",
                ));
                return Err(ExecAbort::Cancelled);
            }
            let level: Vec<ScopeId> = self.pending.drain(..).collect();
            debug!(scopes = level.len(), "resolving level");
            self.process_level(level).await?;
        }
        Ok(())
    }

    async fn process_level(&mut self, level: Vec<ScopeId>) -> Result<(), ExecAbort> {
        // Sibling scopes sharing a selection set and concrete type form
        // one group; a batched field resolves once per group.
        let mut groups: IndexMap<(SetId, String), Vec<ScopeId>> = IndexMap::new();
        for id in level {
            let scope = self.arena.get(id);
            groups
                .entry((scope.set, scope.type_name.clone()))
                .or_default()
                .push(id);
        }

        for ((set, type_name), scopes) in groups {
            let static_type = self.mapped.set(set).static_type.clone();
            let Some(fields) = self
                .mapped
                .set(set)
                .fields_for(&type_name)
                .map(<[_]>::to_vec)
            else {
                continue;
            };
            for field in &fields {
                self.resolve_field(field, &static_type, &type_name, &scopes)
                    .await?;
            }
        }
        Ok(())
    }

    async fn resolve_field(
        &mut self,
        field: &MappedField,
        static_type: &str,
        type_name: &str,
        scopes: &[ScopeId],
    ) -> Result<(), ExecAbort> {
        if field.def.name == "__typename" {
            for &id in scopes {
                self.arena.get_mut(id).set_value(
                    field.response_key.clone(),
                    OutputValue::Leaf(Value::String(type_name.to_string())),
                );
            }
            return Ok(());
        }

        let parents: Vec<Value> = scopes
            .iter()
            .map(|&id| self.arena.get(id).entity.clone())
            .collect();
        let paths: Vec<ResponsePath> = scopes
            .iter()
            .map(|&id| self.arena.get(id).path.child_key(field.response_key.clone()))
            .collect();

        let ctx = match FieldContext::bind(
            Arc::clone(&self.request),
            &self.schema,
            field,
            paths[0].clone(),
            parents.clone(),
        ) {
            Ok(ctx) => ctx,
            Err(e) => {
                // Arguments are uniform across the group, so one record.
                self.request.push_error(e);
                for &id in scopes {
                    self.arena
                        .get_mut(id)
                        .set_value(field.response_key.clone(), OutputValue::Null);
                }
                return Ok(());
            }
        };
        let resolver = self
            .resolvers
            .lookup(type_name, static_type, &field.def.name);

        if field.def.flags.is_batched {
            self.request.metrics.add_resolver_call();
            let direct = match resolver.resolve(&ctx).await {
                Ok(value) => value,
                Err(e) => {
                    let abort = self.resolver_failure(e, &paths[0], field.span);
                    for &id in scopes {
                        self.arena
                            .get_mut(id)
                            .set_value(field.response_key.clone(), OutputValue::Null);
                    }
                    return abort;
                }
            };
            let batched = ctx.take_batched();
            for (i, &id) in scopes.iter().enumerate() {
                let value = match &batched {
                    Some(results) => results.result_for(&parents[i]),
                    None => direct.clone(),
                };
                let output = self.convert_output(
                    value,
                    &field.def.ty,
                    field.subset,
                    paths[i].clone(),
                    field.span,
                )?;
                self.arena
                    .get_mut(id)
                    .set_value(field.response_key.clone(), output);
            }
        } else {
            for (i, &id) in scopes.iter().enumerate() {
                let parent_ctx = ctx.for_parent(i);
                self.request.metrics.add_resolver_call();
                let value = match resolver.resolve(&parent_ctx).await {
                    Ok(value) => value,
                    Err(e) => {
                        // A failed sibling never stops the rest of the
                        // group.
                        self.resolver_failure(e, &paths[i], field.span)?;
                        self.arena
                            .get_mut(id)
                            .set_value(field.response_key.clone(), OutputValue::Null);
                        continue;
                    }
                };
                let value = match parent_ctx.take_batched() {
                    Some(results) => results.result_for(&parents[i]),
                    None => value,
                };
                let output = self.convert_output(
                    value,
                    &field.def.ty,
                    field.subset,
                    paths[i].clone(),
                    field.span,
                )?;
                self.arena
                    .get_mut(id)
                    .set_value(field.response_key.clone(), output);
            }
        }
        Ok(())
    }

    /// Records a resolver failure. Only an explicit abort unwinds the
    /// traversal.
    fn resolver_failure(
        &self,
        error: ResolverError,
        path: &ResponsePath,
        span: Span,
    ) -> Result<(), ExecAbort> {
        warn!(path = %path, error = %error, "resolver failed");
        let code = match &error {
            ResolverError::Internal(_) => ErrorCode::ServerError,
            _ => ErrorCode::ResolverError,
        };
        self.request.push_error(
            GraphQLError::new(code, error.to_string())
                .with_path(path.clone())
                .at_location(self.request.location_of(span)),
        );
        if matches!(error, ResolverError::Abort) {
            Err(ExecAbort::Resolver)
        } else {
            Ok(())
        }
    }

    /// Shapes a resolved value for its declared type: leaves coerce in
    /// place, complex values become scopes queued for the next level.
    fn convert_output(
        &mut self,
        value: Value,
        ty: &TypeRef,
        subset: Option<SetId>,
        path: ResponsePath,
        span: Span,
    ) -> Result<OutputValue, ExecAbort> {
        match ty {
            TypeRef::NonNull(inner) => {
                let output = self.convert_output(value, inner, subset, path.clone(), span)?;
                if matches!(output, OutputValue::Null) {
                    self.request.push_error(
                        GraphQLError::new(
                            ErrorCode::ResolverError,
                            format!("null resolved for non-null type {}", ty.render()),
                        )
                        .with_path(path)
                        .at_location(self.request.location_of(span)),
                    );
                }
                Ok(output)
            }
            _ if value.is_null() => Ok(OutputValue::Null),
            TypeRef::List(inner) => {
                let Value::Array(items) = value else {
                    self.request.push_error(
                        GraphQLError::new(
                            ErrorCode::ServerError,
                            format!("expected a list for type {}", ty.render()),
                        )
                        .with_path(path),
                    );
                    return Ok(OutputValue::Null);
                };
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.convert_output(
                        item,
                        inner,
                        subset,
                        path.child_index(i),
                        span,
                    )?);
                }
                Ok(OutputValue::List(out))
            }
            TypeRef::Named(name) => match subset {
                Some(set) => self.create_scope(value, name, set, path, span),
                None => match convert_leaf_output(value, name, &self.schema, &path) {
                    Ok(v) => Ok(OutputValue::Leaf(v)),
                    Err(e) => {
                        self.request
                            .push_error(e.at_location(self.request.location_of(span)));
                        Ok(OutputValue::Null)
                    }
                },
            },
        }
    }

    /// Creates an output scope for a complex value and queues it. The
    /// depth and object-count quotas are charged here, at object-creation
    /// time.
    fn create_scope(
        &mut self,
        entity: Value,
        declared: &str,
        set: SetId,
        path: ResponsePath,
        span: Span,
    ) -> Result<OutputValue, ExecAbort> {
        let concrete = if self.schema.is_polymorphic(declared) {
            match entity.get("__typename").and_then(Value::as_str) {
                Some(name) => name.to_string(),
                None => {
                    self.request.push_error(
                        GraphQLError::new(
                            ErrorCode::ServerError,
                            format!("entity for {declared} carries no __typename discriminator"),
                        )
                        .with_path(path),
                    );
                    return Ok(OutputValue::Null);
                }
            }
        } else {
            declared.to_string()
        };

        if self.mapped.set(set).fields_for(&concrete).is_none() {
            self.request.push_error(
                GraphQLError::new(
                    ErrorCode::ServerError,
                    format!("{concrete} is not a possible type of {declared}"),
                )
                .with_path(path),
            );
            return Ok(OutputValue::Null);
        }

        let quota = &self.request.quota;
        if path.field_depth() > quota.max_depth {
            self.request.push_error(
                GraphQLError::new(
                    ErrorCode::Quota,
                    format!("maximum response depth {} exceeded", quota.max_depth),
                )
                .with_path(path)
                .at_location(self.request.location_of(span)),
            );
            return Err(ExecAbort::Quota);
        }
        if self.request.metrics.add_output_object() > quota.max_output_objects {
            self.request.push_error(
                GraphQLError::new(
                    ErrorCode::Quota,
                    format!(
                        "maximum output object count {} exceeded",
                        quota.max_output_objects
                    ),
                )
                .with_path(path)
                .at_location(self.request.location_of(span)),
            );
            return Err(ExecAbort::Quota);
        }

        let id = self.arena.alloc(path, entity, concrete, set);
        self.pending.push_back(id);
        Ok(OutputValue::Object(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{FieldNode, Operation};
    use serde_json::json;
    use weft_schema::{FieldDef, ObjectDef, SchemaBuilder, TypeDef};

    fn engine() -> Engine {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .add_type(TypeDef::Object(
                ObjectDef::new("Query")
                    .with_field(FieldDef::new("hello", weft_schema::TypeRef::named("String"))),
            ))
            .build();
        let mut resolvers = ResolverRegistry::new();
        resolvers.register_fn("Query", "hello", |_ctx| Ok(json!("world")));
        Engine::new(schema, resolvers)
    }

    #[tokio::test]
    async fn test_executes_single_operation() {
        let doc = Document::new()
            .with_operation(Operation::query(vec![FieldNode::new("hello").into()]));
        let response = engine().execute(ExecuteRequest::new(doc)).await;
        assert!(!response.has_errors());
        assert_eq!(response.data, Some(json!({"hello": "world"})));
    }

    #[tokio::test]
    async fn test_empty_document_is_bad_request() {
        let response = engine().execute(ExecuteRequest::new(Document::new())).await;
        assert!(!response.has_data());
        let errors = response.errors.unwrap();
        assert_eq!(errors[0].code(), Some("BAD_REQUEST"));
    }

    #[tokio::test]
    async fn test_multiple_operations_require_a_name() {
        let doc = Document::new()
            .with_operation(Operation::query(vec![FieldNode::new("hello").into()]).named("a"))
            .with_operation(Operation::query(vec![FieldNode::new("hello").into()]).named("b"));

        let response = engine().execute(ExecuteRequest::new(doc.clone())).await;
        assert!(response.has_errors());

        let response = engine()
            .execute(ExecuteRequest::new(doc.clone()).with_operation_name("b"))
            .await;
        assert_eq!(response.data, Some(json!({"hello": "world"})));

        let response = engine()
            .execute(ExecuteRequest::new(doc).with_operation_name("c"))
            .await;
        let errors = response.errors.unwrap();
        assert!(errors[0].message.contains("unknown operation"));
    }

    #[tokio::test]
    async fn test_top_level_typename() {
        let doc = Document::new().with_operation(Operation::query(vec![
            FieldNode::new("__typename").into(),
            FieldNode::new("hello").into(),
        ]));
        let response = engine().execute(ExecuteRequest::new(doc)).await;
        assert_eq!(
            response.data,
            Some(json!({"__typename": "Query", "hello": "world"}))
        );
    }
}
