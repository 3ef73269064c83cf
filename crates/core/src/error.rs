//! Domain-level error type shared across the workspace.

/// Errors produced by job validation, command building, and job control.
///
/// The HTTP layer maps each variant onto a status code; the worker maps
/// [`CoreError::RuntimeFailure`] onto a terminal `error` event.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Request parameters are missing or malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The output directory could not be created or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external tool could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited with a nonzero status.
    #[error("Process exited with code {code:?}: {stderr}")]
    RuntimeFailure { code: Option<i32>, stderr: String },

    /// An operation referenced an unknown entity.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
