#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use ffbuilder_api::config::ServerConfig;
use ffbuilder_api::router::build_app_router;
use ffbuilder_api::state::AppState;
use ffbuilder_events::EventBroadcaster;
use ffbuilder_worker::{JobRegistry, JobRunner};

/// Build a test `ServerConfig` writing under `output_path`.
pub fn test_config(output_path: &Path, ffmpeg_bin: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        output_path: output_path.to_path_buf(),
        ffmpeg_bin: ffmpeg_bin.to_string(),
        ws_heartbeat_secs: 30,
    }
}

/// Build the full application router plus the state behind it.
///
/// Uses the same router builder as `main.rs`, so tests exercise the real
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery).
pub fn build_test_app(output_path: &Path, ffmpeg_bin: &str) -> (Router, AppState) {
    let config = test_config(output_path, ffmpeg_bin);
    let broadcaster = Arc::new(EventBroadcaster::new());
    let runner = Arc::new(JobRunner::new(
        config.ffmpeg_config(),
        Arc::new(JobRegistry::new()),
        Arc::clone(&broadcaster),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        runner,
        broadcaster,
    };

    (build_app_router(state.clone(), &config), state)
}

/// Write an executable stand-in for ffmpeg that ignores its arguments and
/// stays alive until signalled.
#[cfg(unix)]
pub fn lingering_tool(dir: &Path) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, body: &'static str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
