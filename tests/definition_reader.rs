// `DefinitionReader`: a `plain` directive returns only a definition's own
// keys; a `resolved` directive recursively pulls in its base sections,
// sub-section targets, and quantity reference targets, bounded by
// `resolve_depth` and breaking cycles between mutually-referencing
// definitions.

mod support;

use graph_query_reader::{EngineConfig, QueryEngine, RootKind};
use serde_json::json;
use support::{user_id, TestBackendsBuilder};

fn backends_with_definitions() -> graph_query_reader::Backends {
    TestBackendsBuilder::new()
        .with_definition(
            "Run",
            json!({
                "definition_id": "Run",
                "base_sections": ["Entity"],
                "quantities": [],
                "sub_sections": [
                    {"name": "system", "repeats": true, "reference": {"target_section_def": "System"}}
                ],
            }),
        )
        .with_definition(
            "Entity",
            json!({
                "definition_id": "Entity",
                "base_sections": [],
                "quantities": [],
                "sub_sections": [],
            }),
        )
        .with_definition(
            "System",
            json!({
                "definition_id": "System",
                "base_sections": [],
                "quantities": [
                    {"name": "method_ref", "reference": {"target_quantity_def": "Run"}}
                ],
                "sub_sections": [],
            }),
        )
        .build()
}

#[tokio::test]
async fn plain_directive_returns_only_the_definitions_own_keys() {
    let engine = QueryEngine::new(backends_with_definitions(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({ "Run": "*" });
    let (result, errors) = engine
        .query(&requester, RootKind::Definition, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(result["Run"]["definition_id"], json!("Run"));
    assert!(result["Run"].get("resolved_base_sections").is_none());
    assert!(result["Run"].get("resolved_sub_sections").is_none());
}

#[tokio::test]
async fn resolved_directive_walks_base_sections_and_sub_section_targets() {
    let engine = QueryEngine::new(backends_with_definitions(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({ "Run": "include-resolved" });
    let (result, errors) = engine
        .query(&requester, RootKind::Definition, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let run = &result["Run"];
    assert_eq!(run["resolved_base_sections"][0]["definition_id"], json!("Entity"));
    assert_eq!(run["resolved_base_sections"][0]["reference"], json!("#/definitions/Entity"));

    let system = &run["resolved_sub_sections"][0]["definition"];
    assert_eq!(system["definition_id"], json!("System"));
    assert_eq!(run["resolved_sub_sections"][0]["name"], json!("system"));

    // `System.method_ref` references back to `Run`, already on the visited
    // path; the cycle stops there instead of recursing forever, so no
    // `resolved_quantities` entry is emitted for it.
    assert!(system.get("resolved_quantities").is_none());
}

#[tokio::test]
async fn zero_resolve_depth_returns_only_the_top_definition() {
    let engine = QueryEngine::new(backends_with_definitions(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "Run": { "__CONFIG__": { "directive": "resolved", "resolve_depth": 0 } }
    });
    let (result, errors) = engine
        .query(&requester, RootKind::Definition, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(result["Run"]["definition_id"], json!("Run"));
    assert!(result["Run"].get("resolved_base_sections").is_none());
}
