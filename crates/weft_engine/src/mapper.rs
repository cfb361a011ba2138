//! Selection-to-schema mapping.
//!
//! The mapper walks the parsed selection tree once per request and binds
//! each selection item to a schema field definition. It drives a
//! pending-set queue instead of recursing: a field with a sub-selection is
//! checked for existence only, and its subset is queued; queued subsets are
//! drained in rounds until empty. This keeps stack depth bounded regardless
//! of query depth and lets fragment spreads reference fragments defined
//! later in the document.
//!
//! For an interface- or union-typed parent, the mapper emits one mapped
//! field list per possible concrete type, each validated independently.

use crate::directives::DirectiveSet;
use crate::request::{Document, FieldNode, Operation, OperationKind, Selection};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use weft_core::{ErrorCode, GraphQLError, LineIndex, Span};
use weft_schema::{FieldDef, Schema, TypeDef, TypeRef};

/// Identifies a mapped selection set within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetId(pub usize);

/// One selection item bound to a field definition for one concrete type.
#[derive(Debug, Clone)]
pub struct MappedField {
    /// The key this field writes in the response.
    pub response_key: String,
    /// The concrete type this binding was validated against.
    pub parent_type: String,
    /// Snapshot of the schema field definition.
    pub def: FieldDef,
    /// Raw argument nodes; evaluated per field context.
    pub arguments: Vec<crate::request::Argument>,
    /// The mapped subset for complex-typed fields.
    pub subset: Option<SetId>,
    /// Source span for diagnostics.
    pub span: Span,
}

/// The mapped field lists for one selection set: one declaration-ordered
/// list per possible concrete type of the static parent type.
#[derive(Debug, Clone)]
pub struct MappedSelectionSet {
    /// The declared (static) parent type.
    pub static_type: String,
    /// Concrete type name to its mapped fields.
    pub per_type: IndexMap<String, Vec<MappedField>>,
}

impl MappedSelectionSet {
    /// Returns the mapped fields for a concrete type.
    #[must_use]
    pub fn fields_for(&self, concrete_type: &str) -> Option<&[MappedField]> {
        self.per_type.get(concrete_type).map(Vec::as_slice)
    }
}

/// One mapped operation: its root type and root selection set.
#[derive(Debug, Clone)]
pub struct MappedOperation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub root_type: String,
    pub root: SetId,
}

/// The mapped tree attached to a parsed request.
#[derive(Debug, Clone)]
pub struct MappedRequest {
    /// Mapped operations, parallel to the document's operations.
    pub operations: Vec<MappedOperation>,
    sets: Vec<MappedSelectionSet>,
}

impl MappedRequest {
    /// Gets a mapped selection set.
    #[must_use]
    pub fn set(&self, id: SetId) -> &MappedSelectionSet {
        &self.sets[id.0]
    }
}

struct Pending<'a> {
    set: SetId,
    selections: &'a [Selection],
}

/// Maps and validates a parsed request against the schema model.
pub struct Mapper<'a> {
    schema: &'a Schema,
    document: &'a Document,
    variables: &'a HashMap<String, Value>,
    directives: &'a DirectiveSet,
    line_index: &'a LineIndex,
    sets: Vec<MappedSelectionSet>,
    queue: VecDeque<Pending<'a>>,
    errors: Vec<GraphQLError>,
}

impl<'a> Mapper<'a> {
    /// Creates a mapper for one request.
    pub fn new(
        schema: &'a Schema,
        document: &'a Document,
        variables: &'a HashMap<String, Value>,
        directives: &'a DirectiveSet,
        line_index: &'a LineIndex,
    ) -> Self {
        Self {
            schema,
            document,
            variables,
            directives,
            line_index,
            sets: Vec::new(),
            queue: VecDeque::new(),
            errors: Vec::new(),
        }
    }

    /// Maps the document. Errors accumulate; mapping aborts early only when
    /// it cannot continue.
    pub fn map(mut self) -> Result<MappedRequest, Vec<GraphQLError>> {
        self.validate_structure();

        let mut operations = Vec::with_capacity(self.document.operations.len());
        for operation in &self.document.operations {
            let Some(root_type) = self.root_type(operation) else {
                continue;
            };
            if self.schema.get_type(&root_type).is_none() {
                self.error(
                    format!("unknown operation root type {root_type}"),
                    operation.span,
                );
                continue;
            }
            let root = self.alloc_set(&root_type);
            self.queue.push_back(Pending {
                set: root,
                selections: &operation.selection_set,
            });
            operations.push(MappedOperation {
                kind: operation.kind,
                name: operation.name.clone(),
                root_type,
                root,
            });
        }

        // Drain queued subsets in rounds until empty.
        while let Some(pending) = self.queue.pop_front() {
            self.expand(pending);
        }

        if self.errors.is_empty() {
            Ok(MappedRequest {
                operations,
                sets: self.sets,
            })
        } else {
            Err(self.errors)
        }
    }

    fn root_type(&mut self, operation: &Operation) -> Option<String> {
        let (root, label) = match operation.kind {
            OperationKind::Query => (&self.schema.query_type, "query"),
            OperationKind::Mutation => (&self.schema.mutation_type, "mutation"),
            OperationKind::Subscription => (&self.schema.subscription_type, "subscription"),
        };
        match root {
            Some(name) => Some(name.clone()),
            None => {
                self.error(
                    format!("schema does not define a {label} root type"),
                    operation.span,
                );
                None
            }
        }
    }

    /// Prepass over the whole document: fragment type conditions, spread
    /// targets and fragment cycles. Later passes can then treat unknown
    /// names as silent skips without losing diagnostics.
    fn validate_structure(&mut self) {
        for fragment in self.document.fragments.values() {
            match self.schema.get_type(&fragment.type_condition) {
                Some(def) if def.is_composite() => {}
                Some(def) => self.error(
                    format!(
                        "fragment {} is conditioned on {} type {}",
                        fragment.name,
                        def.kind_name(),
                        fragment.type_condition
                    ),
                    fragment.span,
                ),
                None => self.error(
                    format!(
                        "fragment {} is conditioned on unknown type {}",
                        fragment.name, fragment.type_condition
                    ),
                    fragment.span,
                ),
            }
        }

        let mut spreads: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut roots: Vec<(&'a [Selection], Option<&'a str>)> = self
            .document
            .operations
            .iter()
            .map(|op| (op.selection_set.as_slice(), None))
            .collect();
        for fragment in self.document.fragments.values() {
            roots.push((fragment.selection_set.as_slice(), Some(&fragment.name)));
        }

        for (selections, owner) in roots {
            let mut stack = vec![selections.iter()];
            while let Some(frame) = stack.last_mut() {
                let Some(selection) = frame.next() else {
                    stack.pop();
                    continue;
                };
                match selection {
                    Selection::Field(field) => {
                        if !field.selection_set.is_empty() {
                            stack.push(field.selection_set.iter());
                        }
                    }
                    Selection::InlineFragment(inline) => {
                        if let Some(cond) = &inline.type_condition {
                            if self.schema.get_type(cond).is_none() {
                                self.error(
                                    format!("unknown type condition {cond}"),
                                    inline.span,
                                );
                            }
                        }
                        stack.push(inline.selection_set.iter());
                    }
                    Selection::FragmentSpread(spread) => {
                        if self.document.fragments.contains_key(&spread.name) {
                            if let Some(owner) = owner {
                                spreads.entry(owner).or_default().push(&spread.name);
                            }
                        } else {
                            self.error(
                                format!("unknown fragment {}", spread.name),
                                spread.span,
                            );
                        }
                    }
                }
            }
        }

        // Fragment cycle detection over the spread graph.
        let mut done: FxHashSet<&str> = FxHashSet::default();
        for start in self.document.fragments.keys() {
            if done.contains(start.as_str()) {
                continue;
            }
            let mut on_path: Vec<&str> = Vec::new();
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            while let Some(&(name, next)) = stack.last() {
                if next == 0 {
                    if on_path.contains(&name) {
                        let span = self
                            .document
                            .fragments
                            .get(name)
                            .map_or(Span::default(), |f| f.span);
                        self.error(format!("fragment cycle through {name}"), span);
                        stack.pop();
                        continue;
                    }
                    on_path.push(name);
                }
                let children = spreads.get(name).map(Vec::as_slice).unwrap_or(&[]);
                if let Some(&child) = children.get(next) {
                    stack.last_mut().expect("frame present").1 += 1;
                    if !done.contains(child) {
                        stack.push((child, 0));
                    }
                } else {
                    done.insert(name);
                    on_path.pop();
                    stack.pop();
                }
            }
        }
    }

    fn alloc_set(&mut self, static_type: &str) -> SetId {
        let mut per_type = IndexMap::new();
        for concrete in self.schema.concrete_types(static_type) {
            per_type.insert(concrete, Vec::new());
        }
        let id = SetId(self.sets.len());
        self.sets.push(MappedSelectionSet {
            static_type: static_type.to_string(),
            per_type,
        });
        id
    }

    fn expand(&mut self, pending: Pending<'a>) {
        let static_type = self.sets[pending.set.0].static_type.clone();
        let concretes: Vec<String> = self.sets[pending.set.0].per_type.keys().cloned().collect();
        for concrete in concretes {
            let fields = self.collect_fields(&concrete, &static_type, pending.selections);
            self.sets[pending.set.0].per_type.insert(concrete, fields);
        }
    }

    /// Collects the mapped fields of one selection set for one concrete
    /// type, flattening fragments with an explicit stack.
    fn collect_fields(
        &mut self,
        concrete: &str,
        static_type: &str,
        selections: &'a [Selection],
    ) -> Vec<MappedField> {
        let mut out = Vec::new();
        let mut active_spreads: Vec<&'a str> = Vec::new();
        let mut stack: Vec<(std::slice::Iter<'a, Selection>, Option<&'a str>)> =
            vec![(selections.iter(), None)];

        while let Some((frame, _)) = stack.last_mut() {
            let Some(selection) = frame.next() else {
                let (_, spread) = stack.pop().expect("frame present");
                if spread.is_some() {
                    active_spreads.pop();
                }
                continue;
            };
            match selection {
                Selection::Field(field) => {
                    if self.directives.include(&field.directives, self.variables) {
                        self.map_field(concrete, static_type, field, &mut out);
                    }
                }
                Selection::InlineFragment(inline) => {
                    if !self.directives.include(&inline.directives, self.variables) {
                        continue;
                    }
                    if self.condition_matches(inline.type_condition.as_deref(), concrete) {
                        stack.push((inline.selection_set.iter(), None));
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.directives.include(&spread.directives, self.variables) {
                        continue;
                    }
                    // Unknown fragments and cycles were reported up front.
                    if active_spreads.contains(&spread.name.as_str()) {
                        continue;
                    }
                    let Some(fragment) = self.document.fragments.get(&spread.name) else {
                        continue;
                    };
                    if self.condition_matches(Some(&fragment.type_condition), concrete) {
                        active_spreads.push(&spread.name);
                        stack.push((fragment.selection_set.iter(), Some(&spread.name)));
                    }
                }
            }
        }
        out
    }

    fn condition_matches(&self, condition: Option<&str>, concrete: &str) -> bool {
        match condition {
            None => true,
            Some(cond) if cond == concrete => true,
            Some(cond) => self
                .schema
                .possible_types(cond)
                .is_some_and(|types| types.iter().any(|t| t == concrete)),
        }
    }

    fn map_field(
        &mut self,
        concrete: &str,
        static_type: &str,
        field: &'a FieldNode,
        out: &mut Vec<MappedField>,
    ) {
        if field.name == "__typename" {
            if !field.selection_set.is_empty() {
                self.error(
                    "field __typename cannot have a sub-selection".to_string(),
                    field.span,
                );
                return;
            }
            out.push(MappedField {
                response_key: field.response_key().to_string(),
                parent_type: concrete.to_string(),
                def: FieldDef::new(
                    "__typename",
                    TypeRef::non_null(TypeRef::named("String")),
                ),
                arguments: Vec::new(),
                subset: None,
                span: field.span,
            });
            return;
        }

        let mut seen_args: FxHashSet<&str> = FxHashSet::default();
        for argument in &field.arguments {
            if !seen_args.insert(&argument.name) {
                self.error(
                    format!(
                        "duplicate argument '{}' on field '{}'",
                        argument.name, field.name
                    ),
                    argument.span,
                );
            }
        }

        let Some(def) = self.schema.field_def(concrete, &field.name) else {
            // A field missing on a union member is a silent skip; missing
            // on an interface implementor or plain object is an error.
            if matches!(self.schema.get_type(static_type), Some(TypeDef::Union(_))) {
                return;
            }
            self.error(
                format!("unknown field '{}' on type {concrete}", field.name),
                field.span,
            );
            return;
        };
        let def = def.clone();

        let subset = if field.selection_set.is_empty() {
            if def.flags.returns_complex_type {
                self.error(
                    format!(
                        "field '{}' of type {} requires a sub-selection",
                        field.name,
                        def.ty.render()
                    ),
                    field.span,
                );
                return;
            }
            None
        } else {
            if !def.flags.returns_complex_type {
                self.error(
                    format!(
                        "field '{}' of leaf type {} cannot have a sub-selection",
                        field.name,
                        def.ty.render()
                    ),
                    field.span,
                );
                return;
            }
            // Existence is all that is checked here; the subset itself is
            // queued for a later round.
            let child = self.alloc_set(def.ty.base_name());
            self.queue.push_back(Pending {
                set: child,
                selections: &field.selection_set,
            });
            Some(child)
        };

        out.push(MappedField {
            response_key: field.response_key().to_string(),
            parent_type: concrete.to_string(),
            def,
            arguments: field.arguments.clone(),
            subset,
            span: field.span,
        });
    }

    fn error(&mut self, message: String, span: Span) {
        self.errors.push(
            GraphQLError::new(ErrorCode::BadRequest, message).at_span(span, self.line_index),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Fragment, InlineNode, Operation, ValueNode};
    use weft_schema::{InterfaceDef, ObjectDef, SchemaBuilder, UnionDef};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(TypeDef::Object(
                ObjectDef::new("Query")
                    .with_field(FieldDef::new("user", TypeRef::named("User")))
                    .with_field(FieldDef::new(
                        "node",
                        TypeRef::named("Node"),
                    ))
                    .with_field(FieldDef::new(
                        "search",
                        TypeRef::list(TypeRef::named("SearchResult")),
                    ))
                    .with_field(FieldDef::new("version", TypeRef::named("String"))),
            ))
            .add_type(TypeDef::Interface(
                InterfaceDef::new("Node").with_field(FieldDef::new("id", TypeRef::named("ID"))),
            ))
            .add_type(TypeDef::Object(
                ObjectDef::new("User")
                    .implements("Node")
                    .with_field(FieldDef::new("id", TypeRef::named("ID")))
                    .with_field(FieldDef::new("name", TypeRef::named("String"))),
            ))
            .add_type(TypeDef::Object(
                ObjectDef::new("Post")
                    .implements("Node")
                    .with_field(FieldDef::new("id", TypeRef::named("ID")))
                    .with_field(FieldDef::new("title", TypeRef::named("String"))),
            ))
            .add_type(TypeDef::Union(UnionDef::new(
                "SearchResult",
                vec!["User".to_string(), "Post".to_string()],
            )))
            .build()
    }

    fn map(document: &Document) -> Result<MappedRequest, Vec<GraphQLError>> {
        let schema = schema();
        let variables = HashMap::new();
        let directives = DirectiveSet::new();
        let line_index = LineIndex::new("");
        Mapper::new(&schema, document, &variables, &directives, &line_index).map()
    }

    #[test]
    fn test_maps_simple_query() {
        let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("user")
            .with_selection(vec![
                FieldNode::new("id").into(),
                FieldNode::new("name").into(),
            ])
            .into()]));
        let mapped = map(&doc).unwrap();
        let root = mapped.set(mapped.operations[0].root);
        let fields = root.fields_for("Query").unwrap();
        assert_eq!(fields.len(), 1);
        let subset = mapped.set(fields[0].subset.unwrap());
        let user_fields = subset.fields_for("User").unwrap();
        let keys: Vec<_> = user_fields.iter().map(|f| f.response_key.as_str()).collect();
        assert_eq!(keys, ["id", "name"]);
    }

    #[test]
    fn test_interface_fans_out_per_concrete_type() {
        let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("node")
            .with_selection(vec![FieldNode::new("id").into()])
            .into()]));
        let mapped = map(&doc).unwrap();
        let root = mapped.set(mapped.operations[0].root);
        let subset = mapped.set(root.fields_for("Query").unwrap()[0].subset.unwrap());
        assert!(subset.fields_for("User").is_some());
        assert!(subset.fields_for("Post").is_some());
    }

    #[test]
    fn test_union_member_missing_field_is_silent_skip() {
        let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("search")
            .with_selection(vec![
                FieldNode::new("__typename").into(),
                // `title` exists on Post only; silently skipped for User.
                FieldNode::new("title").into(),
            ])
            .into()]));
        let mapped = map(&doc).unwrap();
        let root = mapped.set(mapped.operations[0].root);
        let subset = mapped.set(root.fields_for("Query").unwrap()[0].subset.unwrap());
        assert_eq!(subset.fields_for("User").unwrap().len(), 1);
        assert_eq!(subset.fields_for("Post").unwrap().len(), 2);
    }

    #[test]
    fn test_interface_missing_field_is_error() {
        let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("node")
            .with_selection(vec![
                FieldNode::new("id").into(),
                // `name` exists on User but not Post.
                FieldNode::new("name").into(),
            ])
            .into()]));
        let errors = map(&doc).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("name"));
        assert!(errors[0].message.contains("Post"));
    }

    #[test]
    fn test_errors_accumulate() {
        let doc = Document::new().with_operation(Operation::query(vec![
            FieldNode::new("missing").into(),
            FieldNode::new("version")
                .with_selection(vec![FieldNode::new("x").into()])
                .into(),
            FieldNode::new("user").into(),
        ]));
        let errors = map(&doc).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.code() == Some("BAD_REQUEST")));
    }

    #[test]
    fn test_duplicate_argument_is_error() {
        let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("version")
            .with_argument("v", ValueNode::Int(1))
            .with_argument("v", ValueNode::Int(2))
            .into()]));
        let errors = map(&doc).unwrap_err();
        assert!(errors[0].message.contains("duplicate argument"));
    }

    #[test]
    fn test_fragment_spread_defined_later_resolves() {
        let doc = Document::new()
            .with_operation(Operation::query(vec![FieldNode::new("user")
                .with_selection(vec![crate::request::SpreadNode::new("UserFields").into()])
                .into()]))
            .with_fragment(Fragment::new(
                "UserFields",
                "User",
                vec![FieldNode::new("name").into()],
            ));
        let mapped = map(&doc).unwrap();
        let root = mapped.set(mapped.operations[0].root);
        let subset = mapped.set(root.fields_for("Query").unwrap()[0].subset.unwrap());
        assert_eq!(subset.fields_for("User").unwrap()[0].response_key, "name");
    }

    #[test]
    fn test_fragment_cycle_is_error() {
        let doc = Document::new()
            .with_operation(Operation::query(vec![FieldNode::new("user")
                .with_selection(vec![crate::request::SpreadNode::new("A").into()])
                .into()]))
            .with_fragment(Fragment::new(
                "A",
                "User",
                vec![crate::request::SpreadNode::new("B").into()],
            ))
            .with_fragment(Fragment::new(
                "B",
                "User",
                vec![crate::request::SpreadNode::new("A").into()],
            ));
        let errors = map(&doc).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("fragment cycle")));
    }

    #[test]
    fn test_inline_fragment_type_condition() {
        let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("search")
            .with_selection(vec![
                InlineNode::on("User", vec![FieldNode::new("name").into()]).into(),
                InlineNode::on("Post", vec![FieldNode::new("title").into()]).into(),
            ])
            .into()]));
        let mapped = map(&doc).unwrap();
        let root = mapped.set(mapped.operations[0].root);
        let subset = mapped.set(root.fields_for("Query").unwrap()[0].subset.unwrap());
        assert_eq!(subset.fields_for("User").unwrap()[0].response_key, "name");
        assert_eq!(subset.fields_for("Post").unwrap()[0].response_key, "title");
    }

    #[test]
    fn test_deep_query_does_not_recurse() {
        // 2k levels of nesting maps fine; the queue bounds stack depth.
        let mut selection: Vec<Selection> = vec![FieldNode::new("id").into()];
        for _ in 0..2000 {
            selection = vec![FieldNode::new("friend").with_selection(selection).into()];
        }
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .add_type(TypeDef::Object(
                ObjectDef::new("Query").with_field(FieldDef::new("friend", TypeRef::named("User"))),
            ))
            .add_type(TypeDef::Object(
                ObjectDef::new("User")
                    .with_field(FieldDef::new("friend", TypeRef::named("User")))
                    .with_field(FieldDef::new("id", TypeRef::named("ID"))),
            ))
            .build();
        let doc = Document::new().with_operation(Operation::query(selection));
        let variables = HashMap::new();
        let directives = DirectiveSet::new();
        let line_index = LineIndex::new("");
        let mapped = Mapper::new(&schema, &doc, &variables, &directives, &line_index)
            .map()
            .unwrap();
        assert!(mapped.sets.len() > 2000);
    }

    #[test]
    fn test_skip_directive_drops_field() {
        let doc = Document::new().with_operation(Operation::query(vec![
            FieldNode::new("version")
                .with_directive(
                    crate::request::DirectiveNode::new("skip")
                        .with_argument("if", ValueNode::Boolean(true)),
                )
                .into(),
            FieldNode::new("user")
                .with_selection(vec![FieldNode::new("id").into()])
                .into(),
        ]));
        let mapped = map(&doc).unwrap();
        let root = mapped.set(mapped.operations[0].root);
        let keys: Vec<_> = root
            .fields_for("Query")
            .unwrap()
            .iter()
            .map(|f| f.response_key.as_str())
            .collect();
        assert_eq!(keys, ["user"]);
    }
}
