//! The schema container and its builder.

use crate::scalar::{self, ScalarHandler};
use crate::types::{FieldDef, ScalarDef, TypeDef};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// A built schema: the read-only type model for all requests.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, TypeDef>,
    scalars: FxHashMap<String, ScalarHandler>,
    /// Interface/union name to concrete object type names, precomputed at
    /// build time.
    possible_types: FxHashMap<String, Vec<String>>,
}

impl Schema {
    /// Gets a type by name.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Gets a field definition on an object or interface type.
    #[must_use]
    pub fn field_def(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.types.get(type_name)?.fields()?.get(field_name)
    }

    /// Gets the scalar handler for a scalar type name.
    #[must_use]
    pub fn scalar_handler(&self, name: &str) -> Option<&ScalarHandler> {
        self.scalars.get(name)
    }

    /// Returns the possible concrete types of an interface or union.
    #[must_use]
    pub fn possible_types(&self, name: &str) -> Option<&[String]> {
        self.possible_types.get(name).map(Vec::as_slice)
    }

    /// Returns the concrete types a composite type can resolve to: the type
    /// itself for objects, the possible types for interfaces and unions.
    #[must_use]
    pub fn concrete_types(&self, name: &str) -> Vec<String> {
        match self.types.get(name) {
            Some(TypeDef::Object(_)) => vec![name.to_string()],
            Some(TypeDef::Interface(_) | TypeDef::Union(_)) => self
                .possible_types
                .get(name)
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Returns true if the named type is an interface or union.
    #[must_use]
    pub fn is_polymorphic(&self, name: &str) -> bool {
        matches!(
            self.types.get(name),
            Some(TypeDef::Interface(_) | TypeDef::Union(_))
        )
    }
}

/// Schema builder. Seeded with the built-in scalars; `build()` precomputes
/// possible-type lists and field flags.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Creates a new schema builder with built-in scalars registered.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        for name in scalar::BUILTIN_SCALARS {
            builder.schema.types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef {
                    name: name.to_string(),
                    description: Some(format!("Built-in {name} scalar")),
                }),
            );
            if let Some(handler) = scalar::builtin(name) {
                builder.schema.scalars.insert(name.to_string(), handler);
            }
        }
        builder
    }

    /// Sets the query root type.
    #[must_use]
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = Some(name.into());
        self
    }

    /// Sets the mutation root type.
    #[must_use]
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    /// Sets the subscription root type.
    #[must_use]
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = Some(name.into());
        self
    }

    /// Adds a type definition.
    #[must_use]
    pub fn add_type(mut self, type_def: TypeDef) -> Self {
        self.schema
            .types
            .insert(type_def.name().to_string(), type_def);
        self
    }

    /// Adds a custom scalar with its conversion handler.
    #[must_use]
    pub fn add_scalar(mut self, def: ScalarDef, handler: ScalarHandler) -> Self {
        self.schema.scalars.insert(def.name.clone(), handler);
        self.schema.types.insert(def.name.clone(), TypeDef::Scalar(def));
        self
    }

    /// Builds the schema: precomputes possible-type lists from `implements`
    /// declarations and union members, and derives `returns_complex_type`
    /// on every field from its base type.
    #[must_use]
    pub fn build(mut self) -> Schema {
        let mut possible: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut composite: FxHashMap<String, bool> = FxHashMap::default();

        for (name, def) in &self.schema.types {
            composite.insert(name.clone(), def.is_composite());
            match def {
                TypeDef::Object(obj) => {
                    for interface in &obj.implements {
                        possible
                            .entry(interface.clone())
                            .or_default()
                            .push(name.clone());
                    }
                }
                TypeDef::Union(union) => {
                    possible
                        .entry(name.clone())
                        .or_default()
                        .extend(union.members.iter().cloned());
                }
                _ => {}
            }
        }

        for def in self.schema.types.values_mut() {
            let fields = match def {
                TypeDef::Object(obj) => &mut obj.fields,
                TypeDef::Interface(iface) => &mut iface.fields,
                _ => continue,
            };
            for field in fields.values_mut() {
                field.flags.returns_complex_type = composite
                    .get(field.ty.base_name())
                    .copied()
                    .unwrap_or(false);
            }
        }

        self.schema.possible_types = possible;
        self.schema
    }
}
