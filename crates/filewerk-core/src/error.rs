// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Filewerk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Top-level error type for all Filewerk operations.
#[derive(Debug, Error)]
pub enum FilewerkError {
    // -- Intake / validation --
    #[error("file rejected: {name} ({reason})")]
    InputRejected { name: String, reason: String },

    #[error("invalid options: {0}")]
    Validation(String),

    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    // -- Adapter errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("archive operation failed: {0}")]
    ArchiveError(String),

    #[error("document conversion failed: {0}")]
    DocumentError(String),

    #[error("transcoding failed: {0}")]
    TranscodeError(String),

    // -- Heavy resources --
    #[error("failed to initialise {resource}: {detail}")]
    ResourceLoad { resource: String, detail: String },

    // -- Remote conversion --
    #[error("remote conversion timed out after {0}s")]
    RemoteTimeout(u64),

    #[error("remote conversion returned HTTP {status}: {detail}")]
    RemoteStatus { status: u16, detail: String },

    #[error("remote conversion returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("remote request failed: {0}")]
    Network(String),

    // -- Batch control --
    #[error("job was cancelled")]
    Cancelled,

    #[error("job exceeded its {0}s time limit")]
    TimedOut(u64),

    #[error("job {job_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {0} not found")]
    JobNotFound(JobId),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FilewerkError>;

/// Error taxonomy as seen by the batch and UI layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// File type or extension not accepted by the tool.
    InputRejected,
    /// User-supplied options out of range; the batch never starts.
    Validation,
    /// The conversion library rejected the input.
    Adapter,
    /// A lazily initialised heavy resource failed to load.
    ResourceLoad,
    /// Remote conversion endpoint unreachable or misbehaving.
    Network,
    Cancelled,
    TimedOut,
    /// Bug or environment problem (I/O, invalid state).
    Internal,
}

impl FilewerkError {
    /// Classify this error into the batch-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputRejected { .. } => ErrorKind::InputRejected,
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnsupportedInput(_)
            | Self::PdfError(_)
            | Self::ImageError(_)
            | Self::ArchiveError(_)
            | Self::DocumentError(_)
            | Self::TranscodeError(_) => ErrorKind::Adapter,
            Self::ResourceLoad { .. } => ErrorKind::ResourceLoad,
            Self::RemoteTimeout(_)
            | Self::RemoteStatus { .. }
            | Self::MalformedResponse(_)
            | Self::Network(_) => ErrorKind::Network,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::TimedOut(_) => ErrorKind::TimedOut,
            Self::InvalidTransition { .. }
            | Self::JobNotFound(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Structured failure recorded on a job.
///
/// Carries the error kind and rendered message rather than the error itself so
/// that jobs stay `Clone` and serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub job_id: JobId,
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn from_error(job_id: JobId, err: &FilewerkError) -> Self {
        Self {
            job_id,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job {}: {}", self.job_id, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_are_network_kind() {
        assert_eq!(FilewerkError::RemoteTimeout(30).kind(), ErrorKind::Network);
        assert_eq!(
            FilewerkError::RemoteStatus {
                status: 502,
                detail: "bad gateway".into()
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(
            FilewerkError::MalformedResponse("missing data".into()).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn job_error_keeps_message_and_kind() {
        let id = JobId::new();
        let err = FilewerkError::PdfError("trailer missing".into());
        let job_err = JobError::from_error(id, &err);
        assert_eq!(job_err.job_id, id);
        assert_eq!(job_err.kind, ErrorKind::Adapter);
        assert!(job_err.message.contains("trailer missing"));
    }
}
