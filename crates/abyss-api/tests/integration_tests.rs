//! Integration tests for abyss-api: requests through the router.

use std::sync::Arc;

use abyss_api::{create_app, AppState};
use abyss_core::EvalConfig;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    create_app(Arc::new(AppState::new(EvalConfig::default()).unwrap()))
}

async fn post(app: Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_eval_returns_report() {
    let (status, body) = post(app(), "/v1/sys/eval", json!({ "source": "1 + 1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["kind"], "ok");
    assert_eq!(body["result"]["body"]["embed"]["title"], "Scripting Result");
    assert_eq!(body["replies"], json!([]));
}

#[tokio::test]
async fn test_eval_collects_replies() {
    let (status, body) = post(
        app(),
        "/v1/sys/eval",
        json!({
            "source": "emitReply(\"hi\", invokerIdentity().name);",
            "invoker": { "id": 5, "name": "ada" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replies"][0]["content"], "hi ada");
}

#[tokio::test]
async fn test_hb_replies_in_order() {
    let (status, body) = post(
        app(),
        "/v1/sys/hb",
        json!({ "source": "{{create_message \"a\"}}{{create_message \"b\"}}ok" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["body"]["content"], "ok");
    assert_eq!(body["replies"][0]["content"], "a");
    assert_eq!(body["replies"][1]["content"], "b");
}

#[tokio::test]
async fn test_throwex_is_bad_request() {
    let (status, body) = post(app(), "/v1/sys/throwex", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["result"]["kind"], "bad_request");
    assert_eq!(
        body["result"]["body"],
        "Generic error: InvalidOperationError: Test exception."
    );
}

#[tokio::test]
async fn test_metrics_count_commands() {
    let state = Arc::new(AppState::new(EvalConfig::default()).unwrap());
    post(create_app(state.clone()), "/v1/sys/eval", json!({ "source": "2" })).await;

    let response = create_app(state)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"abyss_commands_total{command="eval",result="ok"} 1"#));
}
