//! Request parameters for each job kind and their validation rules.
//!
//! Field-level rules (IP address, port range, URL shape, required strings)
//! are declared with `validator` derives. Structural rules the derives
//! cannot express, such as output names that must be a single plain file
//! name, are checked by hand afterwards.

use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::error::CoreError;
use crate::job::JobKind;

/// Maximum length of an output base name (playlist or file stem).
const MAX_OUTPUT_NAME_LEN: usize = 128;

/// Maximum length of a caller-supplied output path.
const MAX_OUTPUT_PATH_LEN: usize = 1024;

// ---------------------------------------------------------------------------
// Parameter types
// ---------------------------------------------------------------------------

/// Parameters for a live SRT ingest written out as HLS.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StreamIngestParams {
    #[validate(ip(message = "srtAddress must be a valid IP address"))]
    pub srt_address: String,

    #[validate(range(min = 1, max = 65535, message = "srtPort must be between 1 and 65535"))]
    pub srt_port: u32,

    #[serde(default)]
    pub stream_id: Option<String>,

    #[serde(default)]
    pub passphrase: Option<String>,

    #[validate(length(min = 1, message = "outputPath is required"))]
    pub output_path: String,

    #[validate(length(min = 1, message = "hlsName is required"))]
    pub hls_name: String,
}

/// Parameters for remuxing an HLS playlist into one MP4 file.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRemuxParams {
    #[validate(url(message = "hlsInputUrl must be a valid URL"))]
    pub hls_input_url: String,

    #[validate(length(min = 1, message = "outputPath is required"))]
    pub output_path: String,

    #[validate(length(min = 1, message = "mp4Name is required"))]
    pub mp4_name: String,
}

/// A job submission: one parameter bag per job kind.
#[derive(Debug, Clone)]
pub enum JobRequest {
    StreamIngest(StreamIngestParams),
    SegmentRemux(SegmentRemuxParams),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::StreamIngest(_) => JobKind::StreamIngest,
            Self::SegmentRemux(_) => JobKind::SegmentRemux,
        }
    }

    /// Run every validation rule for this request's kind.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::StreamIngest(p) => {
                Validate::validate(p).map_err(validation_error)?;
                validate_output_path(&p.output_path)?;
                validate_output_name("hlsName", &p.hls_name)?;
            }
            Self::SegmentRemux(p) => {
                Validate::validate(p).map_err(validation_error)?;
                validate_output_path(&p.output_path)?;
                validate_output_name("mp4Name", &p.mp4_name)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Flatten `validator` field errors into one sorted, human-readable message.
fn validation_error(errors: ValidationErrors) -> CoreError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter()
                .map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{field} is invalid ({})", e.code),
                })
                .collect::<Vec<_>>()
        })
        .collect();
    messages.sort();
    CoreError::Validation(messages.join("; "))
}

/// Validate a caller-supplied output path.
///
/// Traversal components are neutralised later by the command builder; this
/// only rejects values that can never name a directory.
pub fn validate_output_path(path: &str) -> Result<(), CoreError> {
    if path.trim().is_empty() {
        return Err(CoreError::Validation(
            "outputPath must not be blank".to_string(),
        ));
    }
    if path.len() > MAX_OUTPUT_PATH_LEN {
        return Err(CoreError::Validation(format!(
            "outputPath must not exceed {MAX_OUTPUT_PATH_LEN} characters"
        )));
    }
    if path.contains('\0') {
        return Err(CoreError::Validation(
            "outputPath contains null bytes".to_string(),
        ));
    }
    Ok(())
}

/// Validate an output base name.
///
/// Rules:
/// - Must not be blank.
/// - Must not exceed `MAX_OUTPUT_NAME_LEN` characters.
/// - Must be a single file-name component: no path separators, no `.`/`..`.
pub fn validate_output_name(field: &str, name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "{field} must not be blank"
        )));
    }
    if name.len() > MAX_OUTPUT_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "{field} must not exceed {MAX_OUTPUT_NAME_LEN} characters"
        )));
    }
    if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        return Err(CoreError::Validation(format!(
            "{field} must be a plain file name without path separators"
        )));
    }
    Ok(())
}

/// The value of an optional parameter, treating blank strings as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
