//! Type references and type definitions.

use crate::enums::EnumDef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A type reference: a base type name wrapped in a nullability/list kind
/// path. Types are nullable by default; `NonNull` and `List` wrap inward,
/// so `[Int!]!` is `NonNull(List(NonNull(Named("Int"))))`.
///
/// Two type references are equal iff their rendered names match; the
/// representation makes structural equality and rendered equality coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    NonNull(Box<TypeRef>),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    /// Returns the base type name at the bottom of the kind path.
    #[must_use]
    pub fn base_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::NonNull(inner) | Self::List(inner) => inner.base_name(),
        }
    }

    /// Returns the list nesting depth, derived purely from the kind path.
    #[must_use]
    pub fn rank(&self) -> usize {
        match self {
            Self::Named(_) => 0,
            Self::NonNull(inner) => inner.rank(),
            Self::List(inner) => 1 + inner.rank(),
        }
    }

    /// Returns true if the outermost wrapper is `NonNull`.
    #[must_use]
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Renders the reference in GraphQL syntax, e.g. `[Int!]!`.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
            Self::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// Behavior flags on a field definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFlags {
    /// The field's base type is an object, interface or union.
    pub returns_complex_type: bool,
    /// The resolver supplies results for all sibling parents in one call.
    pub is_batched: bool,
    /// The resolver returns an asynchronous result. Declaration metadata
    /// for schema consumers (introspection, codegen); the executor awaits
    /// every resolver uniformly and does not branch on it.
    pub returns_async_result: bool,
    /// The resolver reads the parent entity. Declaration metadata like
    /// `returns_async_result`; the parent is exposed on every field
    /// context regardless.
    pub has_parent_arg: bool,
}

/// An argument or input-object field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<serde_json::Value>,
}

impl InputValueDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// A schema-level field definition. Immutable after schema build and shared
/// read-only across all requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    /// Argument definitions in declaration order; this order is the
    /// positional order resolvers see.
    pub arguments: IndexMap<String, InputValueDef>,
    pub flags: FieldFlags,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: IndexMap::new(),
            flags: FieldFlags::default(),
        }
    }

    /// Adds an argument definition.
    #[must_use]
    pub fn with_argument(mut self, arg: InputValueDef) -> Self {
        self.arguments.insert(arg.name.clone(), arg);
        self
    }

    /// Marks the field's resolver as batched.
    #[must_use]
    pub fn batched(mut self) -> Self {
        self.flags.is_batched = true;
        self
    }

    /// Marks the field's resolver as returning an async result.
    #[must_use]
    pub fn async_result(mut self) -> Self {
        self.flags.returns_async_result = true;
        self
    }

    /// Marks the field's resolver as consuming the parent entity.
    #[must_use]
    pub fn parent_arg(mut self) -> Self {
        self.flags.has_parent_arg = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// A type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(d) => &d.name,
            Self::Object(d) => &d.name,
            Self::Interface(d) => &d.name,
            Self::Union(d) => &d.name,
            Self::Enum(d) => &d.name,
            Self::InputObject(d) => &d.name,
        }
    }

    /// Returns the field table for object and interface types.
    #[must_use]
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(d) => Some(&d.fields),
            Self::Interface(d) => Some(&d.fields),
            _ => None,
        }
    }

    /// Returns true for object, interface and union types.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Interface(_) | Self::Union(_))
    }

    /// Returns true for scalar and enum types.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// Returns a short kind name for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Object(_) => "object",
            Self::Interface(_) => "interface",
            Self::Union(_) => "union",
            Self::Enum(_) => "enum",
            Self::InputObject(_) => "input object",
        }
    }
}

/// Scalar type definition. Conversion behavior lives in the schema's
/// scalar handler registry, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

/// Object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field definition.
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Declares an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

/// Interface type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field definition.
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Union type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
}

impl UnionDef {
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            members,
        }
    }
}

/// Input object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValueDef>,
}

impl InputObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
        }
    }

    /// Adds an input field definition.
    #[must_use]
    pub fn with_field(mut self, field: InputValueDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}
