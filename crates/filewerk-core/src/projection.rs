// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// What the user should see, derived purely from the batch state.

use serde::Serialize;

use crate::error::JobError;
use crate::types::{BatchState, JobId, JobStatus};

/// A downloadable result for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadEntry {
    pub job_id: JobId,
    pub source_name: String,
    pub filenames: Vec<String>,
}

/// The screen to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ViewState {
    /// Nothing selected yet: show the intake prompt.
    Empty,
    /// Files selected, nothing started: show the list and tool options.
    Listing { files: Vec<String> },
    /// At least one job is running.
    InProgress {
        percent: u8,
        done: usize,
        total: usize,
    },
    /// Nothing is running any more. `not_started` counts jobs left pending
    /// by cancellation or a fail-fast abort.
    Finished {
        downloads: Vec<DownloadEntry>,
        failures: Vec<JobError>,
        not_started: usize,
    },
}

/// Project a batch onto the view. Pure: no I/O, no mutation.
pub fn project<O>(state: &BatchState<O>) -> ViewState {
    if state.is_empty() {
        return ViewState::Empty;
    }

    let counts = state.counts();
    let total = state.len();
    let done = counts.succeeded + counts.failed;

    if counts.pending == total {
        return ViewState::Listing {
            files: state
                .jobs()
                .iter()
                .map(|job| job.input.display_name())
                .collect(),
        };
    }

    if counts.running > 0 {
        return ViewState::InProgress {
            percent: (state.progress() * 100.0).round().clamp(0.0, 100.0) as u8,
            done,
            total,
        };
    }

    let mut downloads = Vec::new();
    let mut failures = Vec::new();
    for job in state.jobs() {
        match job.status() {
            JobStatus::Succeeded => downloads.push(DownloadEntry {
                job_id: job.id,
                source_name: job.input.display_name(),
                filenames: job
                    .result()
                    .unwrap_or_default()
                    .iter()
                    .map(|artifact| artifact.filename.clone())
                    .collect(),
            }),
            JobStatus::Failed => {
                if let Some(error) = job.error() {
                    failures.push(error.clone());
                }
            }
            JobStatus::Pending | JobStatus::Running => {}
        }
    }

    ViewState::Finished {
        downloads,
        failures,
        not_started: counts.pending,
    }
}
