//! Integration tests for the conversion, process listing and stop endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, post_raw};
use serde_json::json;

fn ingest_body(output_path: &str) -> serde_json::Value {
    json!({
        "srtAddress": "127.0.0.1",
        "srtPort": 9000,
        "streamId": "live/cam1",
        "outputPath": output_path,
        "hlsName": "stream"
    })
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_processes_starts_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let response = get(app, "/api/v1/processes").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["activeProcesses"], json!([]));
}

#[tokio::test]
async fn list_jobs_starts_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let response = get(app, "/api/v1/jobs").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], json!([]));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn srt_to_hls_rejects_bad_address() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, state) = common::build_test_app(tmp.path(), "ffmpeg");

    let mut body = ingest_body("out");
    body["srtAddress"] = json!("not-an-ip");
    let response = post_json(app, "/api/v1/convert/srt-to-hls", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(state.runner.list().await.is_empty());
}

#[tokio::test]
async fn srt_to_hls_rejects_out_of_range_port() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let mut body = ingest_body("out");
    body["srtPort"] = json!(70000);
    let response = post_json(app, "/api/v1/convert/srt-to-hls", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn hls_to_mp4_rejects_bad_url() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let body = json!({
        "hlsInputUrl": "definitely not a url",
        "outputPath": "out",
        "mp4Name": "recording"
    });
    let response = post_json(app, "/api/v1/convert/hls-to-mp4", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let response = post_raw(app, "/api/v1/convert/srt-to-hls", "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn missing_fields_are_a_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let response = post_json(app, "/api/v1/convert/hls-to-mp4", json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_unknown_process_returns_404() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let uri = format!("/api/v1/stop/{}", ffbuilder_core::types::new_job_id());
    let response = post_json(app, &uri, json!({})).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn stop_with_malformed_id_returns_404() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path(), "ffmpeg");

    let response = post_json(app, "/api/v1/stop/not-a-uuid", json!({})).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Full lifecycle against a stand-in tool
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test]
async fn start_list_and_stop_a_conversion() {
    let tmp = tempfile::tempdir().unwrap();
    let tool = common::lingering_tool(tmp.path());
    let output = tmp.path().join("out");
    let (app, state) = common::build_test_app(&output, &tool);

    let response = post_json(
        app.clone(),
        "/api/v1/convert/srt-to-hls",
        ingest_body("cam1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["message"], "SRT to HLS conversion started");
    let process_id = json["data"]["processId"].as_str().unwrap().to_string();
    assert!(output.join("cam1").is_dir());

    let json = body_json(get(app.clone(), "/api/v1/processes").await).await;
    assert_eq!(json["data"]["activeProcesses"], json!([process_id]));

    let json = body_json(get(app.clone(), "/api/v1/jobs").await).await;
    assert_eq!(json["data"][0]["processId"], process_id);
    assert_eq!(json["data"][0]["kind"], "srt_to_hls");

    let uri = format!("/api/v1/stop/{process_id}");
    let response = post_json(app.clone(), &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["message"], "Process stopped");
    assert_eq!(json["data"]["processId"], process_id);

    let json = body_json(get(app.clone(), "/api/v1/processes").await).await;
    assert_eq!(json["data"]["activeProcesses"], json!([]));

    let response = post_json(app, &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(state.runner.list().await.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn stopped_conversion_reaches_observers() {
    use ffbuilder_events::EventKind;
    use std::time::Duration;

    let tmp = tempfile::tempdir().unwrap();
    let tool = common::lingering_tool(tmp.path());
    let (app, state) = common::build_test_app(tmp.path(), &tool);
    let mut subscription = state.broadcaster.subscribe().await;

    let body = json!({
        "hlsInputUrl": "http://127.0.0.1:8080/live/index.m3u8",
        "outputPath": "recordings",
        "mp4Name": "session"
    });
    let response = post_json(app.clone(), "/api/v1/convert/hls-to-mp4", body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let process_id = json["data"]["processId"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/stop/{process_id}");
    let response = post_json(app, &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let event = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = subscription.receiver.recv().await.unwrap();
            if event.is_terminal() {
                break event;
            }
        }
    })
    .await
    .expect("terminal event should arrive after stop");

    assert_eq!(event.kind, EventKind::Error);
    assert_eq!(event.process_id.to_string(), process_id);
}

#[tokio::test]
async fn missing_tool_returns_spawn_error() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, state) =
        common::build_test_app(tmp.path(), "/nonexistent/ffbuilder-missing-ffmpeg");

    let response = post_json(app, "/api/v1/convert/srt-to-hls", ingest_body("cam1")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "SPAWN_ERROR");
    assert!(state.runner.list().await.is_empty());
}
