//! Integration tests for the search endpoints.
//!
//! Tests cover:
//! - Compiling filters with project scope and time window
//! - Boolean queries, aggregates and having clauses
//! - Field resolution and ordering
//! - Error responses for invalid queries and fields

use api::AppState;
use axum::http::StatusCode;
use serde_json::json;

use super::common::{get, post_json, test_app, test_app_with_state};

#[tokio::test]
async fn test_compile_three_filters_and_free_text() {
    let body = json!({
        "query": "user.email:foo@example.com release:1.2.1 fruit:apple hello",
        "params": {
            "project_ids": [1, 2, 3],
            "organization_id": 1,
            "start": "2020-01-01T00:00:00Z",
            "end": "2020-01-02T00:00:00Z"
        }
    });
    let (status, response) = post_json(test_app(), "/api/v1/search/compile", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["filter"]["conditions"],
        json!([
            ["user.email", "=", "foo@example.com"],
            ["release", "=", "1.2.1"],
            [["ifNull", ["fruit", "''"]], "=", "apple"],
            [["positionCaseInsensitive", ["message", "'hello'"]], "!=", 0],
        ])
    );
    assert_eq!(response["filter"]["start"], "2020-01-01T00:00:00Z");
    assert_eq!(response["filter"]["end"], "2020-01-02T00:00:00Z");
    assert_eq!(response["filter_keys"], json!({"project_id": [1, 2, 3]}));
}

#[tokio::test]
async fn test_compile_has_and_not_has() {
    let (status, response) = post_json(
        test_app(),
        "/api/v1/search/compile",
        json!({"query": "has:release"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["filter"]["conditions"],
        json!([[["isNull", ["release"]], "!=", 1]])
    );

    let (status, response) = post_json(
        test_app(),
        "/api/v1/search/compile",
        json!({"query": "!has:release"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["filter"]["conditions"],
        json!([[["isNull", ["release"]], "=", 1]])
    );
}

#[tokio::test]
async fn test_compile_boolean_query() {
    let (status, response) = post_json(
        test_app(),
        "/api/v1/search/compile",
        json!({"query": "(release:a OR release:b) AND fruit:apple"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["filter"]["conditions"],
        json!([[
            "and",
            [
                ["or", [["release", "=", "a"], ["release", "=", "b"]]],
                [["ifNull", ["fruit", "''"]], "=", "apple"],
            ]
        ]])
    );
}

#[tokio::test]
async fn test_compile_aggregates_with_ordering() {
    let body = json!({
        "query": "release:a AND count():>1",
        "fields": ["count(id)", "count_unique(user)"],
        "params": {"orderby": ["-count(id)"]}
    });
    let (status, response) = post_json(test_app(), "/api/v1/search/compile", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["filter"]["conditions"], json!([["release", "=", "a"]]));
    assert_eq!(response["filter"]["having"], json!([["count", ">", 1]]));
    assert_eq!(response["fields"]["orderby"], json!(["-count_id"]));
    assert_eq!(
        response["fields"]["aggregations"],
        json!([
            ["count", null, "count_id"],
            ["uniq", "user", "count_unique_user"],
            ["argMax", ["id", "timestamp"], "latest_event"],
            ["argMax", ["project.id", "timestamp"], "projectid"],
            ["transform(projectid, array(), array(), '')", null, "project.name"],
        ])
    );
    assert_eq!(response["fields"]["groupby"], json!([]));
}

#[tokio::test]
async fn test_compile_project_name_and_environments() {
    let body = json!({
        "query": "project.name:backend",
        "params": {
            "project_ids": [1, 2],
            "environments": ["prod", "dev"],
            "projects": [{"id": 1, "slug": "backend"}, {"id": 2, "slug": "frontend"}]
        }
    });
    let (status, response) = post_json(test_app(), "/api/v1/search/compile", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["filter"]["conditions"],
        json!([
            ["project_id", "=", 1],
            [["environment", "IN", ["dev", "prod"]]],
        ])
    );
    assert_eq!(response["filter"]["project_ids"], json!([1]));
    assert_eq!(response["filter_keys"], json!({"project_id": [1]}));
}

#[tokio::test]
async fn test_compile_mixed_or_is_rejected() {
    let (status, response) = post_json(
        test_app(),
        "/api/v1/search/compile",
        json!({"query": "release:a OR count():>1"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_search_query");
    assert_eq!(
        response["message"],
        "Having an OR between aggregate filters and normal filters is invalid."
    );
}

#[tokio::test]
async fn test_parse_unbalanced_parentheses() {
    let (status, response) = post_json(
        test_app(),
        "/api/v1/search/parse",
        json!({"query": "(user.email:foo@example.com OR user.email:bar@example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response["message"],
        "Parse error at '(user.' (column 1). This is commonly caused by unmatched parentheses. Enclose any text in double quotes."
    );
}

#[tokio::test]
async fn test_parse_returns_typed_terms() {
    let (status, response) = post_json(
        test_app(),
        "/api/v1/search/parse",
        json!({"query": "transaction.duration:>500s"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let term = &response["terms"][0];
    assert_eq!(term["kind"], "filter");
    assert_eq!(term["key"]["name"], "transaction.duration");
    assert_eq!(term["operator"], ">");
    assert_eq!(term["value"]["value"], 500_000.0);
}

#[tokio::test]
async fn test_rollup_without_aggregate_is_rejected() {
    let body = json!({
        "query": "",
        "fields": ["message"],
        "params": {"rollup": 15}
    });
    let (status, response) = post_json(test_app(), "/api/v1/search/compile", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response["message"],
        "You cannot use rollup without an aggregate field."
    );
}

#[tokio::test]
async fn test_resolve_orderby_unselected_field() {
    let body = json!({
        "fields": ["message"],
        "params": {"orderby": ["timestamp"]}
    });
    let (status, response) = post_json(test_app(), "/api/v1/search/resolve", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response["message"],
        "Cannot order by a field that is not selected."
    );
}

#[tokio::test]
async fn test_key_mappings_apply_to_compile() {
    let app = test_app_with_state(AppState::default().with_key_mapping("user.email", ["email"]));
    let (status, response) = post_json(
        app,
        "/api/v1/search/compile",
        json!({"query": "email:foo@example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["filter"]["conditions"],
        json!([["user.email", "=", "foo@example.com"]])
    );
}

#[tokio::test]
async fn test_grammar_is_served() {
    let (status, body) = get(test_app(), "/api/v1/search/grammar").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("boolean_term"));
}
