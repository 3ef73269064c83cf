//! The job event envelope pushed to observers.

use chrono::Utc;
use ffbuilder_core::job::{JobKind, JobState};
use ffbuilder_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};

/// Wire type of a [`JobEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A raw chunk of subprocess output.
    Progress,
    /// The job exited successfully.
    Completed,
    /// The job failed, could not start, or was stopped.
    Error,
}

/// A lifecycle or progress notification for one job.
///
/// Serialized as:
///
/// ```json
/// {"type": "progress", "processId": "…", "jobKind": "hls_to_mp4",
///  "message": "frame=  42 …", "timestamp": "2026-01-01T00:00:00Z"}
/// ```
///
/// Terminal events (`completed`/`error`) also carry `state`, and failures
/// carry the accumulated diagnostic output in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Id of the job the event belongs to.
    pub process_id: JobId,

    pub job_kind: JobKind,

    /// Raw output text for `progress`, a summary line otherwise.
    pub message: String,

    /// Diagnostic output for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Final job state; set on terminal events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,

    pub timestamp: Timestamp,
}

impl JobEvent {
    fn new(kind: EventKind, job_id: JobId, job_kind: JobKind, message: String) -> Self {
        Self {
            kind,
            process_id: job_id,
            job_kind,
            message,
            error: None,
            state: None,
            timestamp: Utc::now(),
        }
    }

    /// A chunk of output, forwarded verbatim.
    pub fn progress(job_id: JobId, job_kind: JobKind, chunk: impl Into<String>) -> Self {
        Self::new(EventKind::Progress, job_id, job_kind, chunk.into())
    }

    pub fn completed(job_id: JobId, job_kind: JobKind) -> Self {
        let mut event = Self::new(
            EventKind::Completed,
            job_id,
            job_kind,
            format!("{} conversion completed successfully", job_kind.label()),
        );
        event.state = Some(JobState::Completed);
        event
    }

    /// The process exited nonzero (or was killed by a signal, `code: None`).
    pub fn failed(job_id: JobId, job_kind: JobKind, code: Option<i32>, stderr: String) -> Self {
        let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        let mut event = Self::new(
            EventKind::Error,
            job_id,
            job_kind,
            format!("{} conversion failed with code {code}", job_kind.label()),
        );
        event.error = Some(stderr);
        event.state = Some(JobState::Failed);
        event
    }

    /// The process ended after an explicit stop request.
    pub fn stopped(job_id: JobId, job_kind: JobKind) -> Self {
        let mut event = Self::new(
            EventKind::Error,
            job_id,
            job_kind,
            format!("{} conversion stopped", job_kind.label()),
        );
        event.state = Some(JobState::Stopped);
        event
    }

    /// The process could not be started at all.
    pub fn spawn_failed(job_id: JobId, job_kind: JobKind, reason: &str) -> Self {
        let mut event = Self::new(
            EventKind::Error,
            job_id,
            job_kind,
            format!("{} conversion error: {reason}", job_kind.label()),
        );
        event.error = Some(reason.to_string());
        event.state = Some(JobState::Failed);
        event
    }

    pub fn is_terminal(&self) -> bool {
        self.kind != EventKind::Progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffbuilder_core::types::new_job_id;

    #[test]
    fn progress_serializes_with_camel_case_field_names() {
        let id = new_job_id();
        let json = serde_json::to_value(JobEvent::progress(id, JobKind::SegmentRemux, "frame=1"))
            .unwrap();

        assert_eq!(json["type"], "progress");
        assert_eq!(json["processId"], id.to_string());
        assert_eq!(json["jobKind"], "hls_to_mp4");
        assert_eq!(json["message"], "frame=1");
        assert!(json.get("error").is_none());
        assert!(json.get("state").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn failure_carries_stderr_and_state() {
        let event = JobEvent::failed(
            new_job_id(),
            JobKind::StreamIngest,
            Some(1),
            "no such file".to_string(),
        );
        assert_eq!(event.kind, EventKind::Error);
        assert_eq!(event.error.as_deref(), Some("no such file"));
        assert_eq!(event.state, Some(JobState::Failed));
        assert_eq!(event.message, "SRT to HLS conversion failed with code 1");
        assert!(event.is_terminal());
    }

    #[test]
    fn signal_exit_is_reported_without_code() {
        let event = JobEvent::failed(new_job_id(), JobKind::SegmentRemux, None, String::new());
        assert!(event.message.ends_with("with code signal"));
    }

    #[test]
    fn stopped_is_an_error_event_with_stopped_state() {
        let json =
            serde_json::to_value(JobEvent::stopped(new_job_id(), JobKind::SegmentRemux)).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["state"], "stopped");
    }

    #[test]
    fn completed_is_terminal_and_progress_is_not() {
        let id = new_job_id();
        assert!(JobEvent::completed(id, JobKind::SegmentRemux).is_terminal());
        assert!(!JobEvent::progress(id, JobKind::SegmentRemux, "x").is_terminal());
    }
}
