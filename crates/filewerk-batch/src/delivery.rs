// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result delivery: hand finished artifacts to the user.
//
// `DirectorySink` stages each artifact in a temporary file next to its final
// location and only then moves it into place under a name that does not
// overwrite anything. `Deliverer` spaces bulk deliveries out so that a
// download target is never flooded with simultaneous triggers. A bulk
// delivery that cannot save one artifact records the failure and carries on
// with the rest.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use filewerk_core::adapter::run_blocking;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{Artifact, Job, JobError, JobId, JobStatus, numbered_filename};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default spacing between consecutive deliveries.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Name used when an artifact's suggested name is unusable.
const FALLBACK_NAME: &str = "download";

/// Somewhere artifacts can be delivered to.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver one artifact, returning where it ended up.
    async fn deliver(&self, artifact: &Artifact) -> Result<PathBuf>;
}

/// Writes artifacts into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Use `dir`, creating it if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DeliverySink for DirectorySink {
    #[instrument(skip_all, fields(filename = %artifact.filename, bytes = artifact.size()))]
    async fn deliver(&self, artifact: &Artifact) -> Result<PathBuf> {
        let dir = self.dir.clone();
        let name = safe_filename(&artifact.filename);
        let bytes = artifact.bytes.clone();

        run_blocking(move || write_unique(&dir, &name, &bytes)).await
    }
}

/// Reduce a suggested name to a plain file name inside the target directory.
fn safe_filename(suggested: &str) -> String {
    Path::new(suggested)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.starts_with('.'))
        .unwrap_or(FALLBACK_NAME)
        .to_string()
}

/// Stage `bytes` in a temporary file in `dir`, then persist it as `name` or
/// the first free `name (n)` variant. The temporary file is removed if
/// anything fails before it is persisted.
fn write_unique(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let mut staged = tempfile::Builder::new()
        .prefix(".filewerk-")
        .suffix(".part")
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;

    let mut n = 0;
    loop {
        let target = dir.join(numbered_filename(name, n));
        match staged.persist_noclobber(&target) {
            Ok(_) => {
                debug!(path = %target.display(), "Artifact written");
                return Ok(target);
            }
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
                staged = err.file;
                n += 1;
            }
            Err(err) => return Err(FilewerkError::Io(err.error)),
        }
    }
}

/// Where and when one artifact was delivered.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub job_id: JobId,
    pub path: PathBuf,
    pub dispatched_at: Instant,
}

/// An artifact the sink could not take.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub filename: String,
    pub error: JobError,
}

/// Outcome of a bulk delivery, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub receipts: Vec<DeliveryReceipt>,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delivers the artifacts of finished jobs through a sink.
pub struct Deliverer<S> {
    sink: S,
    min_interval: Duration,
}

impl<S: DeliverySink> Deliverer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Deliver every artifact of one succeeded job, immediately.
    pub async fn deliver(&self, job: &Job) -> Result<Vec<DeliveryReceipt>> {
        let artifacts = succeeded_artifacts(job)?;
        let mut receipts = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            receipts.push(self.dispatch(job.id, artifact).await?);
        }
        Ok(receipts)
    }

    /// Deliver the artifacts of every succeeded job, in job order, with
    /// consecutive deliveries at least `min_interval` apart. Jobs that did
    /// not succeed are skipped. An artifact the sink rejects is recorded as a
    /// failure and the remaining artifacts are still delivered.
    #[instrument(skip_all, fields(jobs = jobs.len(), interval_ms = self.min_interval.as_millis() as u64))]
    pub async fn deliver_all(&self, jobs: &[Job]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut last: Option<Instant> = None;

        for job in jobs.iter().filter(|job| job.status() == JobStatus::Succeeded) {
            for artifact in job.result().unwrap_or_default() {
                if let Some(previous) = last {
                    tokio::time::sleep_until(previous + self.min_interval).await;
                }
                last = Some(Instant::now());
                match self.dispatch(job.id, artifact).await {
                    Ok(receipt) => report.receipts.push(receipt),
                    Err(err) => {
                        warn!(filename = %artifact.filename, error = %err, "Delivery failed");
                        report.failures.push(DeliveryFailure {
                            filename: artifact.filename.clone(),
                            error: JobError::from_error(job.id, &err),
                        });
                    }
                }
            }
        }

        info!(
            delivered = report.receipts.len(),
            failed = report.failures.len(),
            "Delivery complete"
        );
        report
    }

    async fn dispatch(&self, job_id: JobId, artifact: &Artifact) -> Result<DeliveryReceipt> {
        let dispatched_at = Instant::now();
        let path = self.sink.deliver(artifact).await?;
        Ok(DeliveryReceipt {
            job_id,
            path,
            dispatched_at,
        })
    }
}

fn succeeded_artifacts(job: &Job) -> Result<&[Artifact]> {
    match job.result() {
        Some(artifacts) if job.status() == JobStatus::Succeeded => Ok(artifacts),
        _ => Err(FilewerkError::Validation(format!(
            "job {} is {:?} and has nothing to deliver",
            job.id,
            job.status()
        ))),
    }
}
