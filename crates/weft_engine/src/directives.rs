//! Directive evaluation for selection inclusion.
//!
//! A directive handler is consulted before a selection item is included in
//! the mapped tree. The built-in set covers `@skip` and `@include`; custom
//! handlers can be registered alongside them.

use crate::coerce::eval_value;
use crate::request::DirectiveNode;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::HashMap;

/// Decides whether a selection item carrying this directive is included.
pub trait DirectiveHandler: Send + Sync {
    /// Returns false to drop the selection item.
    fn include(&self, args: &HashMap<String, Value>) -> bool;
}

struct SkipDirective;

impl DirectiveHandler for SkipDirective {
    fn include(&self, args: &HashMap<String, Value>) -> bool {
        !args.get("if").and_then(Value::as_bool).unwrap_or(false)
    }
}

struct IncludeDirective;

impl DirectiveHandler for IncludeDirective {
    fn include(&self, args: &HashMap<String, Value>) -> bool {
        args.get("if").and_then(Value::as_bool).unwrap_or(true)
    }
}

/// The registered directive handlers for an engine.
pub struct DirectiveSet {
    handlers: FxHashMap<String, Box<dyn DirectiveHandler>>,
}

impl Default for DirectiveSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectiveSet {
    /// Creates a set with the built-in `@skip` and `@include` handlers.
    #[must_use]
    pub fn new() -> Self {
        let mut handlers: FxHashMap<String, Box<dyn DirectiveHandler>> = FxHashMap::default();
        handlers.insert("skip".to_string(), Box::new(SkipDirective));
        handlers.insert("include".to_string(), Box::new(IncludeDirective));
        Self { handlers }
    }

    /// Registers a custom handler.
    pub fn register<H: DirectiveHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Evaluates all directives on a selection item; returns false if any
    /// handler excludes it. Unregistered directives are ignored.
    #[must_use]
    pub fn include(
        &self,
        directives: &[DirectiveNode],
        variables: &HashMap<String, Value>,
    ) -> bool {
        for directive in directives {
            let Some(handler) = self.handlers.get(&directive.name) else {
                continue;
            };
            let args: HashMap<String, Value> = directive
                .arguments
                .iter()
                .map(|arg| (arg.name.clone(), eval_value(&arg.value, variables)))
                .collect();
            if !handler.include(&args) {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Debug for DirectiveSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveSet")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}
