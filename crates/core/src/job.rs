//! Job kinds and the job lifecycle state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The closed set of conversions the service can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Live SRT ingest written out as an HLS playlist plus segments.
    #[serde(rename = "srt_to_hls")]
    StreamIngest,
    /// HLS playlist remuxed into a single MP4 file.
    #[serde(rename = "hls_to_mp4")]
    SegmentRemux,
}

/// All valid job kind strings.
const VALID_KIND_STRINGS: &[&str] = &["srt_to_hls", "hls_to_mp4"];

impl JobKind {
    /// Return the kind as a snake_case string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamIngest => "srt_to_hls",
            Self::SegmentRemux => "hls_to_mp4",
        }
    }

    /// Human-readable label used in event messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::StreamIngest => "SRT to HLS",
            Self::SegmentRemux => "HLS to MP4",
        }
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "srt_to_hls" => Ok(Self::StreamIngest),
            "hls_to_mp4" => Ok(Self::SegmentRemux),
            _ => Err(CoreError::Validation(format!(
                "Invalid job kind '{s}'. Must be one of: {}",
                VALID_KIND_STRINGS.join(", ")
            ))),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// `Running` is the only initial state. The other three are terminal and
/// have no outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Resolve the terminal state of a process that has exited.
    ///
    /// A stop request wins over the exit status: a process signalled by
    /// `stop()` is `Stopped` whatever code it exits with.
    pub fn from_exit(success: bool, stop_requested: bool) -> Self {
        if stop_requested {
            Self::Stopped
        } else if success {
            Self::Completed
        } else {
            Self::Failed
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
