use super::*;
use crate::downloader::test_helpers::RecordingBroker;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use std::time::Duration;
use tower::ServiceExt;


/// Helper to create a test pipeline wrapped in Arc
fn create_test_downloader() -> (Arc<Wis2Downloader>, RecordingBroker, tempfile::TempDir) {
    let (downloader, broker, temp_dir) = crate::downloader::test_helpers::create_test_downloader();
    (Arc::new(downloader), broker, temp_dir)
}

/// Router over a fresh test pipeline
fn test_app() -> (Router, Arc<Wis2Downloader>, RecordingBroker, tempfile::TempDir) {
    let (downloader, broker, temp_dir) = create_test_downloader();
    let app = create_router(downloader.clone(), downloader.get_config());
    (app, downloader, broker, temp_dir)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn api_server_stops_on_shutdown() {
    let (downloader, _broker, _temp_dir) = create_test_downloader();

    let mut config = (*downloader.get_config()).clone();
    // Port 0 = OS assigns a free port
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        async move { start_api_server(downloader, Arc::new(config)).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    downloader.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), api_handle)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn cors_headers_present_when_enabled() {
    let (downloader, _broker, _temp_dir) = create_test_downloader();

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn cors_headers_absent_when_disabled() {
    let (downloader, _broker, _temp_dir) = create_test_downloader();

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
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

#[tokio::test]
async fn specific_cors_origin_is_echoed() {
    let (downloader, _broker, _temp_dir) = create_test_downloader();

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_origins = vec!["http://dashboard.local".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://dashboard.local"
    );
}
