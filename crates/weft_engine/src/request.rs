//! The parsed-request model.
//!
//! The engine consumes an already-parsed request tree; the textual grammar
//! and tokenizer are an external dependency. Every node carries a span for
//! diagnostics. Builder methods exist so tests and embedders can construct
//! requests directly.

use indexmap::IndexMap;
use weft_core::Span;
use weft_schema::TypeRef;

/// A parsed request document: operations plus named fragments.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub operations: Vec<Operation>,
    pub fragments: IndexMap<String, Fragment>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation.
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Adds a fragment definition.
    #[must_use]
    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.insert(fragment.name.clone(), fragment);
        self
    }
}

/// The kind of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// One operation in a document.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDef>,
    pub selection_set: Vec<Selection>,
    pub span: Span,
}

impl Operation {
    /// Creates a query operation over a selection set.
    pub fn query(selection_set: Vec<Selection>) -> Self {
        Self {
            kind: OperationKind::Query,
            name: None,
            variables: Vec::new(),
            selection_set,
            span: Span::default(),
        }
    }

    /// Creates a mutation operation over a selection set.
    pub fn mutation(selection_set: Vec<Selection>) -> Self {
        Self {
            kind: OperationKind::Mutation,
            ..Self::query(selection_set)
        }
    }

    /// Creates a subscription operation over a selection set.
    pub fn subscription(selection_set: Vec<Selection>) -> Self {
        Self {
            kind: OperationKind::Subscription,
            ..Self::query(selection_set)
        }
    }

    /// Sets the operation name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a variable definition.
    #[must_use]
    pub fn with_variable(mut self, variable: VariableDef) -> Self {
        self.variables.push(variable);
        self
    }
}

/// A variable definition on an operation.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub ty: TypeRef,
    pub default_value: Option<ValueNode>,
    pub span: Span,
}

impl VariableDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
            span: Span::default(),
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: ValueNode) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// One item of a selection set.
#[derive(Debug, Clone)]
pub enum Selection {
    Field(FieldNode),
    FragmentSpread(SpreadNode),
    InlineFragment(InlineNode),
}

/// A field selection.
#[derive(Debug, Clone)]
pub struct FieldNode {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub directives: Vec<DirectiveNode>,
    pub selection_set: Vec<Selection>,
    pub span: Span,
}

impl FieldNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: Vec::new(),
            span: Span::default(),
        }
    }

    /// Sets an alias.
    #[must_use]
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: ValueNode) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            value,
            span: Span::default(),
        });
        self
    }

    /// Adds a directive.
    #[must_use]
    pub fn with_directive(mut self, directive: DirectiveNode) -> Self {
        self.directives.push(directive);
        self
    }

    /// Sets the sub-selection.
    #[must_use]
    pub fn with_selection(mut self, selection_set: Vec<Selection>) -> Self {
        self.selection_set = selection_set;
        self
    }

    /// Sets the source span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The key this field's value is written under in the response.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl From<FieldNode> for Selection {
    fn from(node: FieldNode) -> Self {
        Self::Field(node)
    }
}

/// One argument on a field or directive.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub value: ValueNode,
    pub span: Span,
}

/// A directive applied to a selection item.
#[derive(Debug, Clone)]
pub struct DirectiveNode {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

impl DirectiveNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            span: Span::default(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: ValueNode) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            value,
            span: Span::default(),
        });
        self
    }
}

/// A named fragment spread.
#[derive(Debug, Clone)]
pub struct SpreadNode {
    pub name: String,
    pub directives: Vec<DirectiveNode>,
    pub span: Span,
}

impl SpreadNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directives: Vec::new(),
            span: Span::default(),
        }
    }
}

impl From<SpreadNode> for Selection {
    fn from(node: SpreadNode) -> Self {
        Self::FragmentSpread(node)
    }
}

/// An inline fragment, optionally type-conditioned.
#[derive(Debug, Clone)]
pub struct InlineNode {
    pub type_condition: Option<String>,
    pub directives: Vec<DirectiveNode>,
    pub selection_set: Vec<Selection>,
    pub span: Span,
}

impl InlineNode {
    pub fn on(type_condition: impl Into<String>, selection_set: Vec<Selection>) -> Self {
        Self {
            type_condition: Some(type_condition.into()),
            directives: Vec::new(),
            selection_set,
            span: Span::default(),
        }
    }

    /// Creates an inline fragment without a type condition.
    pub fn anonymous(selection_set: Vec<Selection>) -> Self {
        Self {
            type_condition: None,
            directives: Vec::new(),
            selection_set,
            span: Span::default(),
        }
    }
}

impl From<InlineNode> for Selection {
    fn from(node: InlineNode) -> Self {
        Self::InlineFragment(node)
    }
}

/// A named fragment definition.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub type_condition: String,
    pub directives: Vec<DirectiveNode>,
    pub selection_set: Vec<Selection>,
    pub span: Span,
}

impl Fragment {
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection_set: Vec<Selection>,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            directives: Vec::new(),
            selection_set,
            span: Span::default(),
        }
    }
}

/// A value source in the request: a literal, a variable reference, a list
/// or a nested input object.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    Variable(String),
    List(Vec<ValueNode>),
    Object(Vec<(String, ValueNode)>),
}

impl ValueNode {
    /// Creates a string literal.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a variable reference.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }
}
