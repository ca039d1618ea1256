// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The transform adapter contract.
//
// Every conversion tool wraps one external capability (lopdf, image, ffmpeg,
// a remote endpoint, ...) behind `TransformAdapter`. The batch runner only
// ever talks to this trait, so adapters can be swapped without touching it.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::TimeoutClass;
use crate::error::{FilewerkError, Result};
use crate::types::{Artifact, JobId, JobInput};

/// How an adapter consumes the job list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterMode {
    /// One job per input file.
    PerFile,
    /// All inputs are bundled, in order, into a single job.
    Combine,
}

/// A progress update: which job, and how far along (0.0..=1.0).
pub type ProgressUpdate = (JobId, f32);

/// Handle through which an adapter reports sub-job progress.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    sink: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

impl ProgressReporter {
    pub fn new(job_id: JobId, sink: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        Self {
            job_id,
            sink: Some(sink),
        }
    }

    /// A reporter that drops every update.
    pub fn detached(job_id: JobId) -> Self {
        Self { job_id, sink: None }
    }

    pub fn report(&self, fraction: f32) {
        if let Some(sink) = &self.sink {
            // The runner may already have moved on; a closed channel is fine.
            let _ = sink.send((self.job_id, fraction));
        }
    }
}

/// Per-invocation context handed to an adapter.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub job_id: JobId,
    pub cancel: CancellationToken,
    pub progress: ProgressReporter,
}

impl TransformContext {
    pub fn new(job_id: JobId, cancel: CancellationToken, progress: ProgressReporter) -> Self {
        Self {
            job_id,
            cancel,
            progress,
        }
    }

    /// Context for calling an adapter outside the batch runner.
    pub fn detached(job_id: JobId) -> Self {
        Self {
            job_id,
            cancel: CancellationToken::new(),
            progress: ProgressReporter::detached(job_id),
        }
    }

    /// Return `Err(Cancelled)` once cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(FilewerkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One conversion capability.
///
/// Implementations fail by returning `Err`; they must not panic on bad input.
#[async_trait]
pub trait TransformAdapter: Send + Sync {
    /// Tool-specific options, validated before the batch starts and passed
    /// unmodified to every call.
    type Options: Send + Sync;

    /// Short machine name used in logs.
    fn name(&self) -> &'static str;

    fn mode(&self) -> AdapterMode {
        AdapterMode::PerFile
    }

    fn timeout_class(&self) -> TimeoutClass {
        TimeoutClass::Quick
    }

    /// Reject out-of-range options before any job is dispatched.
    fn validate(&self, _options: &Self::Options) -> Result<()> {
        Ok(())
    }

    /// Convert one job's input into zero or more artifacts.
    async fn transform(
        &self,
        input: &JobInput,
        options: &Self::Options,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>>;
}

/// Run CPU-bound conversion work off the async executor.
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| FilewerkError::Io(std::io::Error::other(format!("worker task failed: {e}"))))?
}
