//! End-to-end execution pipeline tests: mapping, level-order resolution,
//! batching, quotas, polymorphism and response assembly.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weft_engine::{
    CancelHandle, Document, Engine, ExecuteRequest, FieldContext, FieldNode, InlineNode,
    Operation, RequestQuota, ResolverError, ResolverRegistry, Response, ValueNode, VariableDef,
};
use weft_schema::{
    EnumDef, EnumValueDef, FieldDef, InterfaceDef, ObjectDef, Schema, SchemaBuilder, TypeDef,
    TypeRef, UnionDef,
};

fn schema() -> Schema {
    static TRACING: std::sync::Once = std::sync::Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });

    SchemaBuilder::new()
        .query_type("Query")
        .mutation_type("Mutation")
        .subscription_type("Subscription")
        .add_type(TypeDef::Object(
            ObjectDef::new("Query")
                .with_field(FieldDef::new("users", TypeRef::list(TypeRef::named("User"))))
                .with_field(
                    FieldDef::new("user", TypeRef::named("User")).with_argument(
                        weft_schema::InputValueDef::new("id", TypeRef::named("ID")),
                    ),
                )
                .with_field(FieldDef::new(
                    "search",
                    TypeRef::list(TypeRef::named("SearchResult")),
                ))
                .with_field(FieldDef::new("nodes", TypeRef::list(TypeRef::named("Node"))))
                .with_field(FieldDef::new(
                    "version",
                    TypeRef::non_null(TypeRef::named("String")),
                ))
                .with_field(
                    FieldDef::new("permissions", TypeRef::named("Permission")).with_argument(
                        weft_schema::InputValueDef::new("filter", TypeRef::named("Permission")),
                    ),
                )
                .with_field(FieldDef::new("slow", TypeRef::named("String")))
                .with_field(FieldDef::new("fast", TypeRef::named("String")))
                .with_field(FieldDef::new("broken", TypeRef::named("String"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Mutation")
                .with_field(FieldDef::new("first", TypeRef::named("String")))
                .with_field(FieldDef::new("second", TypeRef::named("String"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Subscription")
                .with_field(FieldDef::new("userJoined", TypeRef::named("User"))),
        ))
        .add_type(TypeDef::Interface(
            InterfaceDef::new("Node")
                .with_field(FieldDef::new("id", TypeRef::named("ID")))
                .with_field(FieldDef::new("summary", TypeRef::named("String"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("User")
                .implements("Node")
                .with_field(FieldDef::new("id", TypeRef::named("ID")))
                .with_field(FieldDef::new("name", TypeRef::named("String")))
                .with_field(FieldDef::new("summary", TypeRef::named("String")))
                .with_field(
                    FieldDef::new("posts", TypeRef::list(TypeRef::named("Int"))).batched(),
                )
                .with_field(FieldDef::new("friend", TypeRef::named("User"))),
        ))
        .add_type(TypeDef::Object(
            ObjectDef::new("Post")
                .implements("Node")
                .with_field(FieldDef::new("id", TypeRef::named("ID")))
                .with_field(FieldDef::new("title", TypeRef::named("String")))
                .with_field(FieldDef::new("summary", TypeRef::named("String"))),
        ))
        .add_type(TypeDef::Union(UnionDef::new(
            "SearchResult",
            vec!["User".to_string(), "Post".to_string()],
        )))
        .add_type(TypeDef::Enum(EnumDef::flags(
            "Permission",
            vec![
                EnumValueDef::new("READ"),
                EnumValueDef::new("WRITE"),
                EnumValueDef::new("ADMIN"),
            ],
        )))
        .build()
}

fn base_resolvers() -> ResolverRegistry {
    let mut resolvers = ResolverRegistry::new();
    resolvers.register_fn("Query", "users", |_ctx| {
        Ok(json!([
            {"id": 1, "name": "Ada"},
            {"id": 2, "name": "Brendan"},
            {"id": 3, "name": "Chris"},
        ]))
    });
    resolvers.register_fn("Query", "version", |_ctx| Ok(json!("1.0")));
    resolvers
}

async fn execute(engine: &Engine, selection: Vec<weft_engine::Selection>) -> Response {
    let doc = Document::new().with_operation(Operation::query(selection));
    engine.execute(ExecuteRequest::new(doc)).await
}

#[tokio::test]
async fn test_batched_field_resolves_once_for_the_level() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let mut resolvers = base_resolvers();
    resolvers.register_async("User", "posts", move |ctx: FieldContext| {
        let seen = seen.clone();
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            let pairs = ctx
                .parent_entities()
                .iter()
                .map(|parent| {
                    let id = parent["id"].as_i64().unwrap();
                    (parent.clone(), json!([id * 10]))
                })
                .collect();
            ctx.set_batched_results(pairs, Value::Null);
            Ok(Value::Null)
        }
    });
    let engine = Engine::new(schema(), resolvers);

    let response = execute(
        &engine,
        vec![FieldNode::new("users")
            .with_selection(vec![FieldNode::new("posts").into()])
            .into()],
    )
    .await;

    assert!(!response.has_errors());
    assert_eq!(
        response.data,
        Some(json!({"users": [
            {"posts": [10]},
            {"posts": [20]},
            {"posts": [30]},
        ]}))
    );
    // One call for the whole sibling group of three parents.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_default_for_missing_covers_uncovered_parents() {
    let mut resolvers = base_resolvers();
    resolvers.register_async("User", "posts", |ctx: FieldContext| async move {
        let first = ctx.parent_entities()[0].clone();
        ctx.set_batched_results(vec![(first, json!([1]))], json!([]));
        Ok(Value::Null)
    });
    let engine = Engine::new(schema(), resolvers);

    let response = execute(
        &engine,
        vec![FieldNode::new("users")
            .with_selection(vec![FieldNode::new("posts").into()])
            .into()],
    )
    .await;

    assert_eq!(
        response.data,
        Some(json!({"users": [
            {"posts": [1]},
            {"posts": []},
            {"posts": []},
        ]}))
    );
}

#[tokio::test]
async fn test_depth_quota_yields_one_error_and_partial_data() {
    let mut resolvers = base_resolvers();
    resolvers.register_fn("Query", "user", |_ctx| Ok(json!({"id": 1})));
    resolvers.register_fn("User", "friend", |ctx| {
        let id = ctx.parent_entity()["id"].as_i64().unwrap_or(0);
        Ok(json!({"id": id + 1}))
    });
    let engine = Engine::new(schema(), resolvers);

    let mut selection: Vec<weft_engine::Selection> = vec![FieldNode::new("id").into()];
    for _ in 0..6 {
        selection = vec![FieldNode::new("friend").with_selection(selection).into()];
    }
    let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("user")
        .with_selection(selection)
        .into()]));

    let response = engine
        .execute(
            ExecuteRequest::new(doc).with_quota(RequestQuota::default().with_max_depth(3)),
        )
        .await;

    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), Some("QUOTA"));
    // Well-formed partial output: the object past the limit is simply cut.
    assert_eq!(
        response.data,
        Some(json!({"user": {"friend": {"friend": {}}}}))
    );
}

#[tokio::test]
async fn test_object_count_quota_aborts_the_operation_field() {
    let engine = Engine::new(schema(), base_resolvers());

    let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("users")
        .with_selection(vec![FieldNode::new("name").into()])
        .into()]));
    let response = engine
        .execute(
            ExecuteRequest::new(doc)
                .with_quota(RequestQuota::default().with_max_output_objects(2)),
        )
        .await;

    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), Some("QUOTA"));
    assert_eq!(response.data, Some(json!({"users": null})));
}

#[tokio::test]
async fn test_null_for_non_null_field_is_a_resolver_error() {
    let mut resolvers = ResolverRegistry::new();
    resolvers.register_fn("Query", "version", |_ctx| Ok(Value::Null));
    let engine = Engine::new(schema(), resolvers);

    let response = execute(&engine, vec![FieldNode::new("version").into()]).await;

    assert_eq!(response.data, Some(json!({"version": null})));
    let errors = response.errors.unwrap();
    assert_eq!(errors[0].code(), Some("RESOLVER_ERROR"));
    assert_eq!(errors[0].path.as_ref().unwrap().to_string(), "version");
}

#[tokio::test]
async fn test_union_list_dispatches_per_concrete_type() {
    let mut resolvers = ResolverRegistry::new();
    resolvers.register_fn("Query", "search", |_ctx| {
        Ok(json!([
            {"__typename": "User", "name": "Ada"},
            {"__typename": "Post", "title": "Hello"},
            {"__typename": "User", "name": "Brendan"},
        ]))
    });
    let engine = Engine::new(schema(), resolvers);

    let response = execute(
        &engine,
        vec![FieldNode::new("search")
            .with_selection(vec![
                FieldNode::new("__typename").into(),
                InlineNode::on("User", vec![FieldNode::new("name").into()]).into(),
                InlineNode::on("Post", vec![FieldNode::new("title").into()]).into(),
            ])
            .into()],
    )
    .await;

    assert!(!response.has_errors());
    assert_eq!(
        response.data,
        Some(json!({"search": [
            {"__typename": "User", "name": "Ada"},
            {"__typename": "Post", "title": "Hello"},
            {"__typename": "User", "name": "Brendan"},
        ]}))
    );
}

#[tokio::test]
async fn test_interface_resolver_with_concrete_override() {
    let mut resolvers = ResolverRegistry::new();
    resolvers.register_fn("Query", "nodes", |_ctx| {
        Ok(json!([
            {"__typename": "User", "id": 1},
            {"__typename": "Post", "id": 2},
        ]))
    });
    resolvers.register_fn("Node", "summary", |_ctx| Ok(json!("a node")));
    resolvers.register_fn("Post", "summary", |ctx| {
        Ok(json!(format!("post {}", ctx.parent_entity()["id"])))
    });
    let engine = Engine::new(schema(), resolvers);

    let response = execute(
        &engine,
        vec![FieldNode::new("nodes")
            .with_selection(vec![FieldNode::new("summary").into()])
            .into()],
    )
    .await;

    assert_eq!(
        response.data,
        Some(json!({"nodes": [
            {"summary": "a node"},
            {"summary": "post 2"},
        ]}))
    );
}

#[tokio::test]
async fn test_declaration_order_survives_completion_order() {
    let mut resolvers = ResolverRegistry::new();
    resolvers.register_async("Query", "slow", |_ctx: FieldContext| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(json!("later"))
    });
    resolvers.register_fn("Query", "fast", |_ctx| Ok(json!("sooner")));
    let engine = Engine::new(schema(), resolvers);

    let response = execute(
        &engine,
        vec![FieldNode::new("slow").into(), FieldNode::new("fast").into()],
    )
    .await;

    let text = serde_json::to_string(&response.data.unwrap()).unwrap();
    assert_eq!(text, r#"{"slow":"later","fast":"sooner"}"#);
}

#[tokio::test]
async fn test_sibling_survives_failed_operation_field() {
    let mut resolvers = base_resolvers();
    resolvers.register_fn("Query", "broken", |_ctx| {
        Err(ResolverError::Custom("backend unavailable".to_string()))
    });
    let engine = Engine::new(schema(), resolvers);

    let response = execute(
        &engine,
        vec![
            FieldNode::new("broken").into(),
            FieldNode::new("version").into(),
        ],
    )
    .await;

    assert_eq!(
        response.data,
        Some(json!({"broken": null, "version": "1.0"}))
    );
    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), Some("RESOLVER_ERROR"));
    assert!(errors[0].message.contains("backend unavailable"));
}

#[tokio::test]
async fn test_flag_enum_round_trips_through_the_pipeline() {
    let mut resolvers = ResolverRegistry::new();
    resolvers.register_fn("Query", "permissions", |ctx| {
        // Arguments arrive as a decoded bitmask.
        let mask: i64 = ctx.require("filter")?;
        assert_eq!(mask, 5);
        Ok(json!(mask))
    });
    let engine = Engine::new(schema(), resolvers);

    let doc = Document::new().with_operation(
        Operation::query(vec![FieldNode::new("permissions")
            .with_argument("filter", ValueNode::variable("f"))
            .into()])
        .with_variable(VariableDef::new("f", TypeRef::named("Permission"))),
    );
    let mut variables = HashMap::new();
    variables.insert("f".to_string(), json!(["READ", "ADMIN"]));

    let response = engine
        .execute(ExecuteRequest::new(doc).with_variables(variables))
        .await;

    assert!(!response.has_errors());
    assert_eq!(
        response.data,
        Some(json!({"permissions": ["READ", "ADMIN"]}))
    );
}

#[tokio::test]
async fn test_property_resolver_reads_entities_by_default() {
    let mut resolvers = ResolverRegistry::new();
    resolvers.register_fn("Query", "user", |_ctx| {
        Ok(json!({"id": 7, "name": "Ada"}))
    });
    let engine = Engine::new(schema(), resolvers);

    let response = execute(
        &engine,
        vec![FieldNode::new("user")
            .with_selection(vec![
                FieldNode::new("id").into(),
                FieldNode::new("name").aliased("handle").into(),
            ])
            .into()],
    )
    .await;

    assert!(!response.has_errors());
    // ID coerces integers to strings on the way out.
    assert_eq!(
        response.data,
        Some(json!({"user": {"id": "7", "handle": "Ada"}}))
    );
}

#[tokio::test]
async fn test_cancellation_stops_at_the_level_boundary() {
    let engine = Engine::new(schema(), base_resolvers());
    let handle = CancelHandle::new();
    handle.cancel();

    let doc = Document::new().with_operation(Operation::query(vec![FieldNode::new("users")
        .with_selection(vec![FieldNode::new("name").into()])
        .into()]));
    let response = engine
        .execute(ExecuteRequest::new(doc).with_cancel(handle))
        .await;

    let errors = response.errors.unwrap();
    assert_eq!(errors[0].code(), Some("CANCELLED"));
    // The top-level list was resolved before the first level boundary;
    // its member scopes render empty.
    assert_eq!(response.data, Some(json!({"users": [{}, {}, {}]})));
}

#[tokio::test]
async fn test_mutation_fields_run_sequentially() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut resolvers = ResolverRegistry::new();
    let first_order = order.clone();
    resolvers.register_async("Mutation", "first", move |_ctx: FieldContext| {
        let order = first_order.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            order.lock().unwrap().push("first");
            Ok(json!("1"))
        }
    });
    let second_order = order.clone();
    resolvers.register_async("Mutation", "second", move |_ctx: FieldContext| {
        let order = second_order.clone();
        async move {
            order.lock().unwrap().push("second");
            Ok(json!("2"))
        }
    });
    let engine = Engine::new(schema(), resolvers);

    let doc = Document::new().with_operation(Operation::mutation(vec![
        FieldNode::new("first").into(),
        FieldNode::new("second").into(),
    ]));
    let response = engine.execute(ExecuteRequest::new(doc)).await;

    assert_eq!(response.data, Some(json!({"first": "1", "second": "2"})));
    // Despite the sleep, the first mutation completes before the second
    // starts.
    assert_eq!(*order.lock().unwrap(), ["first", "second"]);
}

#[tokio::test]
async fn test_subscription_event_executes_its_root_field() {
    // The pub-sub layer re-invokes the pipeline per event with the payload
    // in the root value; the default resolver reads it off.
    let resolvers = ResolverRegistry::new();
    let engine = Engine::new(schema(), resolvers);

    let doc = Document::new().with_operation(Operation::subscription(vec![FieldNode::new(
        "userJoined",
    )
    .with_selection(vec![FieldNode::new("name").into()])
    .into()]));
    let response = engine
        .execute(
            ExecuteRequest::new(doc)
                .with_root_value(json!({"userJoined": {"name": "Ada"}})),
        )
        .await;

    assert!(!response.has_errors());
    assert_eq!(
        response.data,
        Some(json!({"userJoined": {"name": "Ada"}}))
    );
}

#[tokio::test]
async fn test_subscription_requires_a_single_root_field() {
    let engine = Engine::new(schema(), ResolverRegistry::new());

    let doc = Document::new().with_operation(Operation::subscription(vec![
        FieldNode::new("userJoined")
            .with_selection(vec![FieldNode::new("name").into()])
            .into(),
        FieldNode::new("userJoined")
            .aliased("again")
            .with_selection(vec![FieldNode::new("name").into()])
            .into(),
    ]));
    let response = engine.execute(ExecuteRequest::new(doc)).await;

    assert!(!response.has_data());
    let errors = response.errors.unwrap();
    assert_eq!(errors[0].code(), Some("BAD_REQUEST"));
}

#[tokio::test]
async fn test_variable_coercion_failure_stops_before_execution() {
    let engine = Engine::new(schema(), base_resolvers());

    let doc = Document::new().with_operation(
        Operation::query(vec![FieldNode::new("version").into()]).with_variable(
            VariableDef::new("id", TypeRef::non_null(TypeRef::named("ID"))),
        ),
    );
    let response = engine.execute(ExecuteRequest::new(doc)).await;

    assert!(!response.has_data());
    let errors = response.errors.unwrap();
    assert_eq!(errors[0].code(), Some("INPUT_ERROR"));
    assert!(errors[0].message.contains("$id"));
}

#[tokio::test]
async fn test_mapping_errors_come_back_as_bad_request() {
    let engine = Engine::new(schema(), base_resolvers());

    let response = execute(
        &engine,
        vec![
            FieldNode::new("nope").into(),
            FieldNode::new("version")
                .with_selection(vec![FieldNode::new("x").into()])
                .into(),
        ],
    )
    .await;

    assert!(!response.has_data());
    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.code() == Some("BAD_REQUEST")));
}
