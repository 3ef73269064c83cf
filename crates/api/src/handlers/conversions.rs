//! Handlers for starting conversions.
//!
//! Both endpoints validate the body, launch the job, and answer `202
//! Accepted` with the new process id without waiting for ffmpeg. Progress
//! and the outcome arrive over the `/ws` event stream.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use ffbuilder_core::params::{JobRequest, SegmentRemuxParams, StreamIngestParams};
use ffbuilder_core::types::{JobId, Timestamp};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body returned when a conversion has been accepted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStarted {
    pub message: String,
    pub process_id: JobId,
    pub timestamp: Timestamp,
}

/// POST /api/v1/convert/srt-to-hls
pub async fn convert_srt_to_hls(
    State(state): State<AppState>,
    payload: Result<Json<StreamIngestParams>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(params) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    start(&state, JobRequest::StreamIngest(params)).await
}

/// POST /api/v1/convert/hls-to-mp4
pub async fn convert_hls_to_mp4(
    State(state): State<AppState>,
    payload: Result<Json<SegmentRemuxParams>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(params) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    start(&state, JobRequest::SegmentRemux(params)).await
}

async fn start(state: &AppState, request: JobRequest) -> AppResult<impl IntoResponse> {
    let kind = request.kind();
    let process_id = state.runner.start(request).await?;

    tracing::info!(job_id = %process_id, kind = %kind, "Conversion accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ConversionStarted {
                message: format!("{} conversion started", kind.label()),
                process_id,
                timestamp: chrono::Utc::now(),
            },
        }),
    ))
}
