//! The resolver contract and dispatch registry.
//!
//! Resolvers are registered against `"Type.field"` keys in a dispatch table
//! built once at schema-construction time. Polymorphic dispatch is an
//! explicit registry lookup: a field declared on an interface may carry a
//! binding per concrete type, tried before the declaring type's binding.

use crate::context::RequestContext;
use crate::field::FieldContext;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ResolverError>;

/// Future type for async resolvers.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = ResolverResult> + Send + 'a>>;

/// Error from resolver code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolverError {
    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Argument parse error.
    #[error("failed to parse argument '{0}': {1}")]
    ArgumentParse(String, String),

    /// Custom error surfaced to the client.
    #[error("{0}")]
    Custom(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Explicit abort: unwinds the owning operation field's traversal.
    #[error("execution aborted by resolver")]
    Abort,
}

/// Trait for field resolvers.
pub trait Resolver: Send + Sync {
    /// Resolves a field value. A resolver for a batched field calls
    /// `ctx.set_batched_results` instead; its return value is ignored.
    fn resolve<'a>(&'a self, ctx: &'a FieldContext) -> ResolverFuture<'a>;
}

/// A sync resolver function.
pub type SyncResolverFn = Arc<dyn Fn(&FieldContext) -> ResolverResult + Send + Sync>;

/// A wrapper for sync resolver functions.
pub struct FnResolver {
    func: SyncResolverFn,
}

impl FnResolver {
    /// Creates a new function resolver.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&FieldContext) -> ResolverResult + Send + Sync + 'static,
    {
        Self { func: Arc::new(f) }
    }
}

impl Resolver for FnResolver {
    fn resolve<'a>(&'a self, ctx: &'a FieldContext) -> ResolverFuture<'a> {
        let result = (self.func)(ctx);
        Box::pin(async move { result })
    }
}

/// An async resolver function type.
pub type AsyncResolverFn =
    Arc<dyn Fn(FieldContext) -> ResolverFuture<'static> + Send + Sync>;

/// A wrapper for async resolver functions.
pub struct AsyncFnResolver {
    func: AsyncResolverFn,
}

impl AsyncFnResolver {
    /// Creates a new async function resolver.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(FieldContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |ctx| Box::pin(f(ctx))),
        }
    }
}

impl Resolver for AsyncFnResolver {
    fn resolve<'a>(&'a self, ctx: &'a FieldContext) -> ResolverFuture<'a> {
        let ctx = ctx.clone();
        let func = Arc::clone(&self.func);
        Box::pin(async move { func(ctx).await })
    }
}

/// Default resolver: reads the field off the parent entity object, falling
/// back to the snake_case rendering of the field name.
pub struct PropertyResolver;

impl Resolver for PropertyResolver {
    fn resolve<'a>(&'a self, ctx: &'a FieldContext) -> ResolverFuture<'a> {
        let field_name = ctx.field_name();
        let result = match ctx.parent_entity() {
            Value::Object(map) => {
                if let Some(value) = map.get(field_name) {
                    Ok(value.clone())
                } else {
                    let snake_case = to_snake_case(field_name);
                    Ok(map.get(&snake_case).cloned().unwrap_or(Value::Null))
                }
            }
            Value::Null => Ok(Value::Null),
            _ => Ok(Value::Null),
        };
        Box::pin(async move { result })
    }
}

/// Converts camelCase to snake_case.
fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Per-request resolver lifecycle hooks, invoked once per request around
/// execution.
pub trait RequestHooks: Send + Sync {
    /// Called before any resolver runs.
    fn on_request_start(&self, _ctx: &RequestContext) {}
    /// Called after the response is assembled.
    fn on_request_end(&self, _ctx: &RequestContext) {}
}

/// The resolver dispatch table, built once at schema-construction time.
pub struct ResolverRegistry {
    /// Resolvers indexed by "TypeName.fieldName". Concrete-type overrides
    /// for interface-declared fields are plain entries under the concrete
    /// type's name.
    resolvers: FxHashMap<String, Arc<dyn Resolver>>,
    default_resolver: Arc<dyn Resolver>,
    hooks: Vec<Arc<dyn RequestHooks>>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverRegistry {
    /// Creates a registry with the property resolver as the fallback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: FxHashMap::default(),
            default_resolver: Arc::new(PropertyResolver),
            hooks: Vec::new(),
        }
    }

    /// Registers a resolver for a type and field.
    pub fn register<R: Resolver + 'static>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: R,
    ) {
        let key = format!("{}.{}", type_name.into(), field_name.into());
        self.resolvers.insert(key, Arc::new(resolver));
    }

    /// Registers a sync function as a resolver.
    pub fn register_fn<F>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(&FieldContext) -> ResolverResult + Send + Sync + 'static,
    {
        self.register(type_name, field_name, FnResolver::new(f));
    }

    /// Registers an async function as a resolver.
    pub fn register_async<F, Fut>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(FieldContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        self.register(type_name, field_name, AsyncFnResolver::new(f));
    }

    /// Replaces the fallback resolver.
    pub fn set_default<R: Resolver + 'static>(&mut self, resolver: R) {
        self.default_resolver = Arc::new(resolver);
    }

    /// Registers request lifecycle hooks.
    pub fn add_hooks<H: RequestHooks + 'static>(&mut self, hooks: H) {
        self.hooks.push(Arc::new(hooks));
    }

    /// Looks up the binding for a field: the concrete type's entry first,
    /// then the declaring type's, then the fallback.
    #[must_use]
    pub fn lookup(
        &self,
        concrete_type: &str,
        declared_type: &str,
        field_name: &str,
    ) -> Arc<dyn Resolver> {
        let key = format!("{concrete_type}.{field_name}");
        if let Some(resolver) = self.resolvers.get(&key) {
            return Arc::clone(resolver);
        }
        if concrete_type != declared_type {
            let key = format!("{declared_type}.{field_name}");
            if let Some(resolver) = self.resolvers.get(&key) {
                return Arc::clone(resolver);
            }
        }
        Arc::clone(&self.default_resolver)
    }

    /// Runs `on_request_start` on all registered hooks.
    pub fn request_started(&self, ctx: &RequestContext) {
        for hooks in &self.hooks {
            hooks.on_request_start(ctx);
        }
    }

    /// Runs `on_request_end` on all registered hooks.
    pub fn request_ended(&self, ctx: &RequestContext) {
        for hooks in &self.hooks {
            hooks.on_request_end(ctx);
        }
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolver_count", &self.resolvers.len())
            .field("hook_count", &self.hooks.len())
            .finish()
    }
}
