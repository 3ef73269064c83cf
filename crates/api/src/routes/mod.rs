pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /processes                        list running job ids (GET)
/// /jobs                             list running job details (GET)
/// /convert/srt-to-hls               start SRT -> HLS ingest (POST)
/// /convert/hls-to-mp4               start HLS -> MP4 remux (POST)
/// /stop/{process_id}                stop a running job (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/processes", get(handlers::jobs::list_processes))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route(
            "/convert/srt-to-hls",
            post(handlers::conversions::convert_srt_to_hls),
        )
        .route(
            "/convert/hls-to-mp4",
            post(handlers::conversions::convert_hls_to_mp4),
        )
        .route("/stop/{process_id}", post(handlers::jobs::stop_process))
}

/// Root-level WebSocket endpoint for live job events.
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws::ws_handler))
}
