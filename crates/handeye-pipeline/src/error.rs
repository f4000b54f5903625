use std::path::PathBuf;
use std::time::Duration;

use handeye_core::RigidityError;
use thiserror::Error;

/// Failure of a single pose lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoseLookupError {
    #[error("no transform {target_frame} -> {source_frame} within {timeout:?}")]
    Timeout {
        target_frame: String,
        source_frame: String,
        timeout: Duration,
    },
    #[error("transform {target_frame} -> {source_frame} is not rigid: {reason}")]
    NotRigid {
        target_frame: String,
        source_frame: String,
        reason: RigidityError,
    },
    #[error("pose source disconnected")]
    Disconnected,
}

/// Errors raised by the acquisition pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pose could not be looked up; the capture is skipped.
    #[error(transparent)]
    Lookup(#[from] PoseLookupError),

    /// Internal invariant violation (programming defect).
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed file {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("only {motions} motion pairs collected, at least {required} recommended")]
    InsufficientData { motions: usize, required: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("hand-eye solver failed: {0:#}")]
    Solver(#[source] anyhow::Error),

    /// The session was finalized and produced no result.
    #[error("session is already finalized")]
    SessionClosed,
}

impl PipelineError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PipelineError::Io { op, path, source }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_carries_path() {
        let err = PipelineError::io("read", "/tmp/missing.json")(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let msg = err.to_string();
        assert!(msg.contains("failed to read"));
        assert!(msg.contains("/tmp/missing.json"));
    }

    #[test]
    fn timeout_message_names_frames() {
        let err = PipelineError::from(PoseLookupError::Timeout {
            target_frame: "/base_link".to_string(),
            source_frame: "/ee_fixed_link".to_string(),
            timeout: Duration::from_millis(500),
        });
        assert!(err.to_string().contains("/base_link -> /ee_fixed_link"));
    }
}
