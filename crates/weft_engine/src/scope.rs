//! Output scopes: the path-addressed response tree.
//!
//! A scope is one node of the response output tree, backed by a source
//! entity and its concrete type mapping. Keys are written at most once per
//! scope, so duplicate batched writes are safe, and key order is write
//! order; the traversal drives writes in declared selection order, so the
//! scope serializes directly without an intermediate copy.

use crate::mapper::SetId;
use indexmap::IndexMap;
use serde_json::Value;
use weft_core::ResponsePath;

/// Identifies a scope within one executer's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// A value held under one key of a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Null,
    Leaf(Value),
    List(Vec<OutputValue>),
    Object(ScopeId),
}

/// One node of the response output tree.
#[derive(Debug)]
pub struct OutputScope {
    /// Path from the response root to this node.
    pub path: ResponsePath,
    /// The backing source entity.
    pub entity: Value,
    /// The entity's concrete type.
    pub type_name: String,
    /// The mapped selection set this scope expands.
    pub set: SetId,
    values: IndexMap<String, OutputValue>,
}

impl OutputScope {
    fn new(path: ResponsePath, entity: Value, type_name: String, set: SetId) -> Self {
        Self {
            path,
            entity,
            type_name,
            set,
            values: IndexMap::new(),
        }
    }

    /// Writes a value under a key. A no-op if the key is already present;
    /// returns true if the write took effect.
    pub fn set_value(&mut self, key: impl Into<String>, value: OutputValue) -> bool {
        let key = key.into();
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, value);
        true
    }

    /// Returns true if a key is already written.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the written values in write order.
    #[must_use]
    pub fn values(&self) -> &IndexMap<String, OutputValue> {
        &self.values
    }
}

/// Arena of scopes owned by one operation-field executer. Scopes reference
/// children by id, so expansion never needs shared mutation.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<OutputScope>,
}

impl ScopeArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a scope.
    pub fn alloc(
        &mut self,
        path: ResponsePath,
        entity: Value,
        type_name: String,
        set: SetId,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(OutputScope::new(path, entity, type_name, set));
        id
    }

    /// Gets a scope.
    #[must_use]
    pub fn get(&self, id: ScopeId) -> &OutputScope {
        &self.scopes[id.0]
    }

    /// Gets a scope mutably.
    pub fn get_mut(&mut self, id: ScopeId) -> &mut OutputScope {
        &mut self.scopes[id.0]
    }

    /// Returns the number of scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Returns true if no scope was allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Renders an output value to JSON, walking child scopes in place.
    #[must_use]
    pub fn render(&self, value: &OutputValue) -> Value {
        match value {
            OutputValue::Null => Value::Null,
            OutputValue::Leaf(v) => v.clone(),
            OutputValue::List(items) => {
                Value::Array(items.iter().map(|v| self.render(v)).collect())
            }
            OutputValue::Object(id) => {
                let scope = self.get(*id);
                let mut map = serde_json::Map::new();
                for (key, value) in scope.values() {
                    map.insert(key.clone(), self.render(value));
                }
                Value::Object(map)
            }
        }
    }
}
