// A `plain` directive leaves an archive cross-reference as the raw
// reference string; an `include-resolved`/`resolved` directive follows it
// and inlines the target fragment instead. `resolve_depth` bounds how many
// hops a chain of references may take before giving up.

mod support;

use graph_query_reader::{EngineConfig, QueryEngine, RootKind};
use serde_json::json;
use support::{user_id, TestBackendsBuilder};

fn backends_with_reference() -> graph_query_reader::Backends {
    TestBackendsBuilder::new()
        .with_entry("e1", json!({"entry_id": "e1", "upload_id": "upl-1"}))
        .with_archive_fragment("e1", &["run"], json!([{}]))
        .with_archive_fragment("e1", &["run", "0"], json!({}))
        .with_archive_fragment("e1", &["run", "0", "system_ref"], json!("#/run/0/system/0"))
        .with_archive_fragment("e1", &["run", "0", "system"], json!([{}]))
        .with_archive_fragment(
            "e1",
            &["run", "0", "system", "0"],
            json!({"atom_labels": ["H", "O"]}),
        )
        .build()
}

#[tokio::test]
async fn plain_directive_keeps_reference_string_unresolved() {
    let engine = QueryEngine::new(backends_with_reference(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": { "e1": { "archive": { "run": { "0": { "system_ref": "*" } } } } }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(
        result["entries"]["e1"]["archive"]["run"]["0"]["system_ref"],
        json!("#/run/0/system/0")
    );
}

#[tokio::test]
async fn resolved_directive_with_inplace_inlines_the_target_fragment() {
    let engine = QueryEngine::new(backends_with_reference(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": {
            "e1": {
                "archive": {
                    "run": {
                        "0": {
                            "system_ref": {
                                "__CONFIG__": { "directive": "resolved", "resolve_inplace": true }
                            }
                        }
                    }
                }
            }
        }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(
        result["entries"]["e1"]["archive"]["run"]["0"]["system_ref"]["atom_labels"],
        json!(["H", "O"])
    );
}

#[tokio::test]
async fn resolved_directive_without_inplace_hoists_into_shared_references_tree() {
    let engine = QueryEngine::new(backends_with_reference(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": { "e1": { "archive": { "run": { "0": { "system_ref": "include-resolved" } } } } }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(
        result["entries"]["e1"]["archive"]["run"]["0"]["system_ref"],
        json!("#/run/0/system/0")
    );
    assert_eq!(
        result[QueryEngine::REFERENCES_KEY]["entries"]["e1"]["archive"]["run"]["0"]["system"]["0"]
            ["atom_labels"],
        json!(["H", "O"])
    );
}

#[tokio::test]
async fn cross_upload_reference_resolves_via_access_and_archive_backends() {
    let backends = TestBackendsBuilder::new()
        .with_entry("e1", json!({"entry_id": "e1", "upload_id": "upl-1"}))
        .with_archive_fragment("e1", &["run"], json!([{}]))
        .with_archive_fragment("e1", &["run", "0"], json!({}))
        .with_archive_fragment(
            "e1",
            &["run", "0", "method_ref"],
            json!("../uploads/A/archive/B#/c"),
        )
        .with_entry("B", json!({"entry_id": "B", "upload_id": "A"}))
        .with_archive_fragment("B", &["c"], json!({"value": 42}))
        .build();
    let engine = QueryEngine::new(backends, EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": {
            "e1": { "archive": { "run": { "0": { "method_ref": "include-resolved" } } } }
        }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(
        result["entries"]["e1"]["archive"]["run"]["0"]["method_ref"],
        json!("../uploads/A/archive/B#/c")
    );
    assert_eq!(
        result[QueryEngine::REFERENCES_KEY]["uploads"]["A"]["entries"]["B"]["archive"]["c"]
            ["value"],
        json!(42)
    );
}

#[tokio::test]
async fn zero_resolve_depth_rejects_any_reference_hop() {
    let engine = QueryEngine::new(backends_with_reference(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": {
            "e1": {
                "archive": {
                    "run": {
                        "0": {
                            "system_ref": {
                                "__CONFIG__": { "directive": "resolved", "resolve_depth": 0 }
                            }
                        }
                    }
                }
            }
        }
    });

    let (_result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind,
        graph_query_reader::error::QueryErrorKind::ArchiveError
    );
}
