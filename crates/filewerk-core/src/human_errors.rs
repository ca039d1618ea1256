// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language error messages.
//
// Every technical error is mapped to a short explanation with a concrete
// suggestion. Severity drives how the failure is presented.

use crate::error::{ErrorKind, FilewerkError, JobError};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or timeout; trying again may work.
    Transient,
    /// The user must change something (options, file choice).
    ActionRequired,
    /// This file cannot be converted by this tool.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether re-running the same job could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `FilewerkError` into a `HumanError`.
pub fn humanize_error(err: &FilewerkError) -> HumanError {
    match err {
        FilewerkError::InputRejected { name, .. } => HumanError {
            message: format!("\"{name}\" can't be used with this tool."),
            suggestion: "Check the list of supported file types and choose a matching file.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FilewerkError::Validation(detail) => HumanError {
            message: "Some of the settings aren't valid.".into(),
            suggestion: format!("Fix the settings and start again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FilewerkError::UnsupportedInput(detail) => HumanError {
            message: "This type of file isn't supported here.".into(),
            suggestion: format!("Try converting it to a common format first. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        FilewerkError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged or password-protected. Try opening it in a PDF viewer first, or use a different file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FilewerkError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FilewerkError::ArchiveError(_) => HumanError {
            message: "This archive couldn't be read or written.".into(),
            suggestion: "The ZIP file may be damaged or use an unsupported compression method.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FilewerkError::DocumentError(_) => HumanError {
            message: "This document couldn't be converted.".into(),
            suggestion: "Make sure it is a .docx file (not the older .doc format) and that it opens in a word processor.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FilewerkError::TranscodeError(detail) => HumanError {
            message: "This audio or video file couldn't be converted.".into(),
            suggestion: format!("The file may use a codec that isn't supported, or be damaged. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        FilewerkError::ResourceLoad { resource, .. } => HumanError {
            message: format!("The {resource} couldn't be started."),
            suggestion: "Check that it is installed and reachable, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FilewerkError::RemoteTimeout(_) => HumanError {
            message: "The conversion service didn't respond in time.".into(),
            suggestion: "The service may be busy. Try again in a moment.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FilewerkError::RemoteStatus { status, .. } if *status >= 500 => HumanError {
            message: "The conversion service had a problem.".into(),
            suggestion: format!("This is on the service's side (HTTP {status}). Try again later."),
            retriable: true,
            severity: Severity::Transient,
        },

        FilewerkError::RemoteStatus { status, .. } => HumanError {
            message: "The conversion service refused this file.".into(),
            suggestion: format!("The file may be too large or not a valid document (HTTP {status})."),
            retriable: false,
            severity: Severity::Permanent,
        },

        FilewerkError::MalformedResponse(_) => HumanError {
            message: "The conversion service sent back something unexpected.".into(),
            suggestion: "Try again. If this keeps happening, the service may have changed.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FilewerkError::Network(_) => HumanError {
            message: "We couldn't reach the conversion service.".into(),
            suggestion: "Check your internet connection, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FilewerkError::Cancelled => HumanError {
            message: "Conversion was cancelled.".into(),
            suggestion: "Start the batch again when you're ready.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        FilewerkError::TimedOut(secs) => HumanError {
            message: "This file took too long to convert.".into(),
            suggestion: format!("It ran for more than {secs} seconds. Try a smaller file or raise the time limit in the settings."),
            retriable: true,
            severity: Severity::Transient,
        },

        FilewerkError::InvalidTransition { .. } | FilewerkError::JobNotFound(_) => HumanError {
            message: "Filewerk got confused about this file.".into(),
            suggestion: "Start over with the same files. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FilewerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Filewerk doesn't have permission to use that file or folder.".into(),
                    suggestion: "Check the permissions, or choose a different output folder.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        FilewerkError::Serialization(_) => HumanError {
            message: "Filewerk had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

/// Humanise a failure recorded on a job, where only the kind survives.
pub fn humanize_job_error(err: &JobError) -> HumanError {
    let (message, suggestion, retriable, severity) = match err.kind {
        ErrorKind::InputRejected => (
            "This file type isn't accepted by the tool.",
            "Choose a file of a supported type.",
            false,
            Severity::ActionRequired,
        ),
        ErrorKind::Validation => (
            "Some of the settings aren't valid.",
            "Fix the settings and start again.",
            false,
            Severity::ActionRequired,
        ),
        ErrorKind::Adapter => (
            "This file couldn't be converted.",
            "It may be damaged, protected, or use an unsupported feature.",
            false,
            Severity::Permanent,
        ),
        ErrorKind::ResourceLoad => (
            "A required component couldn't be started.",
            "Check it is installed, then try again.",
            true,
            Severity::Transient,
        ),
        ErrorKind::Network => (
            "The conversion service couldn't complete the request.",
            "Check your connection and try again.",
            true,
            Severity::Transient,
        ),
        ErrorKind::Cancelled => (
            "Conversion was cancelled.",
            "Start the batch again when you're ready.",
            true,
            Severity::ActionRequired,
        ),
        ErrorKind::TimedOut => (
            "This file took too long to convert.",
            "Try a smaller file or raise the time limit.",
            true,
            Severity::Transient,
        ),
        ErrorKind::Internal => (
            "Something went wrong inside Filewerk.",
            "Start over. If this keeps happening, please report it.",
            true,
            Severity::Transient,
        ),
    };

    HumanError {
        message: message.into(),
        suggestion: format!("{suggestion} ({})", err.message),
        retriable,
        severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobId;

    #[test]
    fn server_errors_are_transient() {
        let human = humanize_error(&FilewerkError::RemoteStatus {
            status: 503,
            detail: "unavailable".into(),
        });
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn client_errors_are_permanent() {
        let human = humanize_error(&FilewerkError::RemoteStatus {
            status: 413,
            detail: "too large".into(),
        });
        assert_eq!(human.severity, Severity::Permanent);
        assert!(!human.retriable);
    }

    #[test]
    fn validation_needs_user_action() {
        let human = humanize_error(&FilewerkError::Validation("page 0".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("page 0"));
    }

    #[test]
    fn corrupt_pdf_is_permanent() {
        let human = humanize_error(&FilewerkError::PdfError("bad xref".into()));
        assert_eq!(human.severity, Severity::Permanent);
    }

    #[test]
    fn job_error_keeps_detail_in_suggestion() {
        let err = JobError {
            job_id: JobId::new(),
            kind: ErrorKind::TimedOut,
            message: "job exceeded its 60s time limit".into(),
        };
        let human = humanize_job_error(&err);
        assert!(human.retriable);
        assert!(human.suggestion.contains("60s"));
    }
}
