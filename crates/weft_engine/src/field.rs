//! Per-field ephemeral state exposed to resolvers.
//!
//! A `FieldContext` is built once per field invocation: arguments are
//! evaluated and coerced in declaration order at construction, so a
//! resolver only ever sees validated native values. For a batched field
//! one context carries the whole level group of parent entities; a
//! non-batched field gets one derived context per parent.

use crate::coerce::{eval_value, validate_convert};
use crate::context::RequestContext;
use crate::mapper::MappedField;
use crate::resolver::ResolverError;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use weft_core::{GraphQLError, ResponsePath, Span};
use weft_schema::{FieldFlags, Schema, TypeRef};

static NULL: Value = Value::Null;

/// Results produced by one batched resolver invocation: parent-entity to
/// result pairs, plus the default for parents the resolver did not cover.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedResults {
    pub pairs: Vec<(Value, Value)>,
    pub default_for_missing: Value,
}

impl BatchedResults {
    /// Finds the result for a parent entity, matching by value equality.
    #[must_use]
    pub fn result_for(&self, entity: &Value) -> Value {
        self.pairs
            .iter()
            .find(|(parent, _)| parent == entity)
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| self.default_for_missing.clone())
    }
}

struct FieldShared {
    request: Arc<RequestContext>,
    field_name: String,
    response_key: String,
    parent_type: String,
    ty: TypeRef,
    flags: FieldFlags,
    span: Span,
    path: ResponsePath,
    args: IndexMap<String, Value>,
    batch: Mutex<Option<BatchedResults>>,
}

/// The state of one field invocation, handed to its resolver.
#[derive(Clone)]
pub struct FieldContext {
    shared: Arc<FieldShared>,
    parents: Arc<Vec<Value>>,
}

impl FieldContext {
    /// Binds a mapped field to its parent entities: arguments are evaluated
    /// against the request variables and coerced in declaration order.
    /// `path` anchors the field in the response; argument errors anchor at
    /// `path.argName`.
    pub fn bind(
        request: Arc<RequestContext>,
        schema: &Schema,
        field: &MappedField,
        path: ResponsePath,
        parents: Vec<Value>,
    ) -> Result<Self, GraphQLError> {
        let mut args = IndexMap::with_capacity(field.def.arguments.len());
        for (name, def) in &field.def.arguments {
            let anchor = path.child_key(name.clone());
            let supplied = field
                .arguments
                .iter()
                .find(|a| &a.name == name)
                .map(|a| eval_value(&a.value, &request.variables));
            let value = match supplied {
                Some(v) => v,
                None => match &def.default_value {
                    Some(default) => default.clone(),
                    None => Value::Null,
                },
            };
            let value = validate_convert(value, &def.ty, schema, &anchor)
                .map_err(|e| e.at_location(request.location_of(field.span)))?;
            args.insert(name.clone(), value);
        }

        Ok(Self {
            shared: Arc::new(FieldShared {
                request,
                field_name: field.def.name.clone(),
                response_key: field.response_key.clone(),
                parent_type: field.parent_type.clone(),
                ty: field.def.ty.clone(),
                flags: field.def.flags,
                span: field.span,
                path,
                args,
                batch: Mutex::new(None),
            }),
            parents: Arc::new(parents),
        })
    }

    /// Derives a context covering a single parent entity. Shares argument
    /// values and the batch slot with the original.
    #[must_use]
    pub fn for_parent(&self, index: usize) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            parents: Arc::new(vec![self.parents[index].clone()]),
        }
    }

    /// The schema field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.shared.field_name
    }

    /// The response key this field writes under.
    #[must_use]
    pub fn response_key(&self) -> &str {
        &self.shared.response_key
    }

    /// The concrete parent type this invocation serves.
    #[must_use]
    pub fn parent_type(&self) -> &str {
        &self.shared.parent_type
    }

    /// The field's declared result type.
    #[must_use]
    pub fn field_type(&self) -> &TypeRef {
        &self.shared.ty
    }

    /// The field's declaration flags.
    #[must_use]
    pub fn flags(&self) -> FieldFlags {
        self.shared.flags
    }

    /// The field's source span.
    #[must_use]
    pub fn span(&self) -> Span {
        self.shared.span
    }

    /// The field's response path.
    #[must_use]
    pub fn path(&self) -> &ResponsePath {
        &self.shared.path
    }

    /// The ambient request context.
    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.shared.request
    }

    /// The coerced request variables.
    #[must_use]
    pub fn variables(&self) -> &std::collections::HashMap<String, Value> {
        &self.shared.request.variables
    }

    /// The coerced arguments in declaration order.
    #[must_use]
    pub fn args(&self) -> &IndexMap<String, Value> {
        &self.shared.args
    }

    /// Gets a coerced argument value.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.shared.args.get(name).filter(|v| !v.is_null())
    }

    /// Deserializes an argument into a native type; absent or null yields
    /// `None`.
    pub fn arg_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ResolverError> {
        match self.arg(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ResolverError::ArgumentParse(name.to_string(), e.to_string())),
        }
    }

    /// Deserializes a required argument, failing if absent or null.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        self.arg_as(name)?
            .ok_or_else(|| ResolverError::MissingArgument(name.to_string()))
    }

    /// The parent entity. For a batched invocation this is the first of
    /// the group.
    #[must_use]
    pub fn parent_entity(&self) -> &Value {
        self.parents.first().unwrap_or(&NULL)
    }

    /// All parent entities this invocation covers.
    #[must_use]
    pub fn parent_entities(&self) -> &[Value] {
        &self.parents
    }

    /// True if this field's resolver runs once per level group.
    #[must_use]
    pub fn is_batched(&self) -> bool {
        self.shared.flags.is_batched
    }

    /// Stores results from a batched resolver. A second call extends the
    /// stored pairs and keeps the first default.
    pub fn set_batched_results(&self, pairs: Vec<(Value, Value)>, default_for_missing: Value) {
        let mut slot = self.shared.batch.lock().expect("batch slot poisoned");
        match slot.as_mut() {
            Some(existing) => existing.pairs.extend(pairs),
            None => {
                *slot = Some(BatchedResults {
                    pairs,
                    default_for_missing,
                });
            }
        }
    }

    /// Takes the stored batched results, if any.
    pub fn take_batched(&self) -> Option<BatchedResults> {
        self.shared.batch.lock().expect("batch slot poisoned").take()
    }
}

impl std::fmt::Debug for FieldContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldContext")
            .field("field", &self.shared.field_name)
            .field("parent_type", &self.shared.parent_type)
            .field("path", &self.shared.path)
            .field("parent_count", &self.parents.len())
            .finish()
    }
}
