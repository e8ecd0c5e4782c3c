// A reference that would lead straight back to a node already on the
// current path must be rejected as a cycle rather than looped forever.

mod support;

use graph_query_reader::{EngineConfig, QueryEngine, RootKind};
use serde_json::json;
use support::{user_id, TestBackendsBuilder};

#[tokio::test]
async fn self_referential_fragment_is_rejected_as_a_cycle() {
    // `a` is an object whose own `ref` key points right back at `a`.
    let backends = TestBackendsBuilder::new()
        .with_entry("e1", json!({"entry_id": "e1"}))
        .with_archive_fragment("e1", &["a"], json!({}))
        .with_archive_fragment("e1", &["a", "ref"], json!("#/a"))
        .build();

    let engine = QueryEngine::new(backends, EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": {
            "e1": {
                "archive": {
                    "a": {
                        "ref": "include-resolved"
                    }
                }
            }
        }
    });

    let (_result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert_eq!(errors.len(), 1, "expected exactly one cycle error, got {errors:?}");
    assert_eq!(
        errors[0].kind,
        graph_query_reader::error::QueryErrorKind::ArchiveError
    );
    assert!(errors[0].message.contains("cycle"));
}

#[tokio::test]
async fn reference_to_an_unvisited_sibling_path_still_resolves() {
    // `a/ref` points at `b`, which has not been visited yet, so this is not
    // a cycle and should resolve normally.
    let backends = TestBackendsBuilder::new()
        .with_entry("e1", json!({"entry_id": "e1"}))
        .with_archive_fragment("e1", &["a"], json!({}))
        .with_archive_fragment("e1", &["a", "ref"], json!("#/b"))
        .with_archive_fragment("e1", &["b"], json!({"value": 42}))
        .build();

    let engine = QueryEngine::new(backends, EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": { "e1": { "archive": { "a": { "ref": "include-resolved" } } } }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(result["entries"]["e1"]["archive"]["a"]["ref"], json!("#/b"));
    assert_eq!(
        result[QueryEngine::REFERENCES_KEY]["entries"]["e1"]["archive"]["b"]["value"],
        json!(42)
    );
}
