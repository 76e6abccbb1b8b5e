use super::*;
use crate::pipeline::test_helpers::{ScriptedOracle, fast_config, wait_for_terminal};
use crate::types::JobId;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;


/// Test pipeline wrapped in Arc, with its tempdir (which must be kept alive)
async fn create_test_pipeline() -> (Arc<ValidationPipeline>, tempfile::TempDir) {
    let (pipeline, temp_dir, _notifier) =
        crate::pipeline::test_helpers::create_test_pipeline(fast_config(), ScriptedOracle::accepting())
            .await;
    (Arc::new(pipeline), temp_dir)
}

fn router(pipeline: &Arc<ValidationPipeline>) -> Router {
    create_router(pipeline.clone(), pipeline.get_config())
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;

    let mut config = (*pipeline.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let pipeline = pipeline.clone();
        let config = config.clone();
        async move { start_api_server(pipeline, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be serving");
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;

    let mut config = (*pipeline.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(pipeline, Arc::new(config));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (pipeline, _temp_dir) = create_test_pipeline().await;

    let mut config = (*pipeline.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(pipeline, Arc::new(config));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[test]
fn test_cors_specific_origins() {
    // Invalid header values are skipped rather than rejected
    let _layer = build_cors_layer(&[
        "http://localhost:3000".to_string(),
        "not a valid\nheader".to_string(),
    ]);
}
