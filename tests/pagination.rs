// `__WILDCARD__` search dispatch: an explicit pagination block is honored
// as given, and an omitted one defaults to page 1 (the legacy default the
// normalizer injects for any wildcard query that lacks one).

mod support;

use graph_query_reader::{EngineConfig, QueryEngine, RootKind};
use serde_json::json;
use support::{user_id, TestBackendsBuilder};

fn searchable_backends() -> graph_query_reader::Backends {
    TestBackendsBuilder::new()
        .with_searchable_entries(vec![
            json!({"entry_id": "e1", "upload_id": "upl-1"}),
            json!({"entry_id": "e2", "upload_id": "upl-1"}),
            json!({"entry_id": "e3", "upload_id": "upl-2"}),
        ])
        .build()
}

#[tokio::test]
async fn explicit_pagination_page_and_size_round_trip() {
    let engine = QueryEngine::new(searchable_backends(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": {
            "__WILDCARD__": {
                "__CONFIG__": {
                    "query": { "terms": { "upload_id": "upl-1" } },
                    "pagination": { "page": 1, "page_size": 1 }
                }
            }
        }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let page = &result["entries"]["__WILDCARD__"];
    assert_eq!(page["pagination"]["page"], json!(1));
    assert_eq!(page["pagination"]["page_size"], json!(1));
    assert_eq!(page["pagination"]["total"], json!(2));
    assert_eq!(page["data"].as_array().expect("data array").len(), 1);
}

#[tokio::test]
async fn omitted_pagination_defaults_to_page_one() {
    let engine = QueryEngine::new(searchable_backends(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "entries": {
            "__WILDCARD__": {
                "__CONFIG__": {
                    "query": { "terms": {} }
                }
            }
        }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let page = &result["entries"]["__WILDCARD__"];
    assert_eq!(page["pagination"]["page"], json!(1));
    assert_eq!(page["pagination"]["total"], json!(3));
}

fn visible_uploads_backends() -> graph_query_reader::Backends {
    TestBackendsBuilder::new()
        .with_upload("upl-1", json!({"upload_id": "upl-1", "upload_name": "first"}))
        .with_upload("upl-2", json!({"upload_id": "upl-2", "upload_name": "second"}))
        .with_upload("upl-3", json!({"upload_id": "upl-3", "upload_name": "third"}))
        .build()
}

#[tokio::test]
async fn document_store_wildcard_listing_paginates_by_page_size() {
    let engine = QueryEngine::new(visible_uploads_backends(), EngineConfig::default());
    let requester = user_id("user-1");

    let required = json!({
        "uploads": {
            "*": {
                "__CONFIG__": { "pagination": { "page": 1, "page_size": 2 } }
            }
        }
    });

    let (result, errors) = engine
        .query(&requester, RootKind::Mongo, &required)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(result["uploads"]["upl-1"]["upload_name"], json!("first"));
    assert_eq!(result["uploads"]["upl-2"]["upload_name"], json!("second"));
    assert!(result["uploads"].get("upl-3").is_none());
    assert_eq!(result["uploads"]["pagination"]["total"], json!(3));
    assert_eq!(result["uploads"]["pagination"]["next_page_after_value"], json!("upl-2"));
}

#[tokio::test]
async fn document_store_cursor_pagination_round_trips_across_two_requests() {
    let engine = QueryEngine::new(visible_uploads_backends(), EngineConfig::default());
    let requester = user_id("user-1");

    let first_page = json!({
        "uploads": {
            "*": { "__CONFIG__": { "pagination": { "page_size": 2 } } }
        }
    });
    let (first_result, errors) = engine
        .query(&requester, RootKind::Mongo, &first_page)
        .await
        .expect("normalization succeeds");
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let cursor = first_result["uploads"]["pagination"]["next_page_after_value"]
        .as_str()
        .expect("a cursor for the next page")
        .to_string();

    let second_page = json!({
        "uploads": {
            "*": { "__CONFIG__": { "pagination": { "page_after_value": cursor } } }
        }
    });
    let (second_result, errors) = engine
        .query(&requester, RootKind::Mongo, &second_page)
        .await
        .expect("normalization succeeds");

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert!(first_result["uploads"].get("upl-3").is_none());
    assert_eq!(second_result["uploads"]["upl-3"]["upload_name"], json!("third"));
    assert!(second_result["uploads"].get("upl-1").is_none());
}
