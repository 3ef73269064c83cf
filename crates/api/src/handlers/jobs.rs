//! Handlers for listing and stopping running jobs.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use ffbuilder_core::error::CoreError;
use ffbuilder_core::types::JobId;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProcesses {
    pub active_processes: Vec<JobId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStopped {
    pub message: &'static str,
    pub process_id: JobId,
}

/// GET /api/v1/processes
///
/// Ids of all running jobs, oldest first.
pub async fn list_processes(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let active_processes = state.runner.list().await;
    Ok(Json(DataResponse {
        data: ActiveProcesses { active_processes },
    }))
}

/// GET /api/v1/jobs
///
/// Running jobs with kind, pid and start time.
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.runner.summaries().await;
    Ok(Json(DataResponse { data: jobs }))
}

/// POST /api/v1/stop/{process_id}
///
/// Signals the job and removes it from the running set. The terminal event
/// follows on the event stream once the process has exited. Ids that are
/// unknown, already finished, or not UUIDs all answer 404.
pub async fn stop_process(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let not_found = || CoreError::NotFound {
        entity: "Process",
        id: process_id.clone(),
    };
    let job_id: JobId = process_id.parse().map_err(|_| not_found())?;

    state.runner.stop(job_id).await.map_err(|e| match e {
        CoreError::NotFound { .. } => not_found(),
        other => other,
    })?;

    Ok(Json(DataResponse {
        data: ProcessStopped {
            message: "Process stopped",
            process_id: job_id,
        },
    }))
}
