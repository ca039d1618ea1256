// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The batch runner: drives one transform adapter over every pending job.
//
// Jobs are dispatched in list order with at most `concurrency` in flight.
// Each job runs under its adapter's timeout class and a child of the batch
// cancellation token. A failing job is recorded on that job only; under
// `FailFast` nothing further is dispatched after the first failure.

use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};

use filewerk_core::adapter::ProgressUpdate;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{
    AdapterMode, AppConfig, Artifact, BatchState, ErrorKind, FailurePolicy, Job, JobError, JobId,
    JobInput, JobStatus, ProgressReporter, TimeoutClass, TransformAdapter, TransformContext,
};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

// -- Configuration ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Jobs in flight at once; 0 is treated as 1.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub quick_timeout: Duration,
    pub long_timeout: Duration,
    pub remote_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RunnerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            failure_policy: config.failure_policy,
            quick_timeout: config.timeout_for(TimeoutClass::Quick),
            long_timeout: config.timeout_for(TimeoutClass::Long),
            remote_timeout: config.timeout_for(TimeoutClass::Remote),
        }
    }
}

impl RunnerConfig {
    pub fn timeout_for(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Quick => self.quick_timeout,
            TimeoutClass::Long => self.long_timeout,
            TimeoutClass::Remote => self.remote_timeout,
        }
    }
}

// -- Events and report ----------------------------------------------------------

/// Live updates for a UI or log while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    JobStarted(JobId),
    JobProgress(JobId, f32),
    /// The job as it stands after reaching a terminal state.
    JobFinished(Job),
    BatchFinished(BatchReport),
}

/// Summary of one `run` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs never dispatched (cancellation or fail-fast).
    pub pending: usize,
    /// Cancellation stopped a running job or left jobs undispatched.
    pub cancelled: bool,
    /// The failure that stopped a fail-fast batch.
    pub aborted_by: Option<JobId>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// Every job ran and none failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.pending == 0 && !self.cancelled
    }
}

// -- Runner ---------------------------------------------------------------------

pub struct BatchRunner {
    config: RunnerConfig,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl BatchRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(events) = &self.events {
            // Nobody listening is fine.
            let _ = events.send(event);
        }
    }

    /// Run `adapter` over every pending job in `state`.
    ///
    /// Options are validated first; a validation error leaves every job
    /// untouched. Combining adapters get all jobs bundled into one. Job
    /// failures are recorded on the jobs and never make this return `Err`.
    #[instrument(skip_all, fields(adapter = adapter.name(), jobs = state.len()))]
    pub async fn run<A>(
        &self,
        state: &mut BatchState<A::Options>,
        adapter: &A,
        cancel: CancellationToken,
    ) -> Result<BatchReport>
    where
        A: TransformAdapter,
    {
        let started_at = Instant::now();
        adapter.validate(state.options())?;

        if adapter.mode() == AdapterMode::Combine && needs_bundling(state) {
            let bundle = state.bundle()?;
            debug!(job_id = %bundle, "Inputs bundled into one job");
        }

        let limit = self.config.timeout_for(adapter.timeout_class());
        let concurrency = self.config.concurrency.max(1);
        let (options, jobs) = state.split_mut();
        let mut queue: VecDeque<JobId> = jobs
            .iter()
            .filter(|job| job.status() == JobStatus::Pending)
            .map(|job| job.id)
            .collect();

        info!(
            pending = queue.len(),
            concurrency,
            timeout_secs = limit.as_secs(),
            "Batch started"
        );

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressUpdate>();
        let mut in_flight = FuturesUnordered::new();
        let mut aborted_by: Option<JobId> = None;

        loop {
            while in_flight.len() < concurrency && aborted_by.is_none() && !cancel.is_cancelled() {
                let Some(id) = queue.pop_front() else {
                    break;
                };
                let job = find_job(jobs, id)?;
                job.start()?;
                self.emit(BatchEvent::JobStarted(id));
                debug!(job_id = %id, input = %job.input.display_name(), "Job dispatched");

                let ctx = TransformContext::new(
                    id,
                    cancel.child_token(),
                    ProgressReporter::new(id, progress_tx.clone()),
                );
                in_flight.push(run_job(adapter, options, job.input.clone(), ctx, limit));
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                Some((id, fraction)) = progress_rx.recv() => {
                    let job = find_job(jobs, id)?;
                    if job.status() == JobStatus::Running {
                        job.report_progress(fraction);
                        self.emit(BatchEvent::JobProgress(id, job.progress().unwrap_or(fraction)));
                    }
                }
                Some((id, outcome)) = in_flight.next() => {
                    let job = find_job(jobs, id)?;
                    match outcome {
                        Ok(artifacts) => {
                            debug!(job_id = %id, artifacts = artifacts.len(), "Job succeeded");
                            job.succeed(artifacts)?;
                        }
                        Err(err) => {
                            warn!(job_id = %id, error = %err, "Job failed");
                            job.fail(JobError::from_error(id, &err))?;
                            if self.config.failure_policy == FailurePolicy::FailFast
                                && aborted_by.is_none()
                                && !matches!(err, FilewerkError::Cancelled)
                            {
                                warn!(job_id = %id, "Fail-fast: no further jobs will start");
                                aborted_by = Some(id);
                            }
                        }
                    }
                    self.emit(BatchEvent::JobFinished(job.clone()));
                }
            }
        }

        drop(in_flight);
        let counts = state.counts();
        let report = BatchReport {
            succeeded: counts.succeeded,
            failed: counts.failed,
            pending: counts.pending,
            cancelled: cancel.is_cancelled() && cut_short(state.jobs()),
            aborted_by,
            elapsed_ms: started_at.elapsed().as_millis() as u64,
        };

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            pending = report.pending,
            cancelled = report.cancelled,
            "Batch finished"
        );
        self.emit(BatchEvent::BatchFinished(report.clone()));
        Ok(report)
    }
}

/// Whether any job was left undispatched or stopped by cancellation.
fn cut_short(jobs: &[Job]) -> bool {
    jobs.iter().any(|job| {
        job.status() == JobStatus::Pending
            || job.error().is_some_and(|err| err.kind == ErrorKind::Cancelled)
    })
}

/// Pending jobs not yet gathered into a single bundle.
fn needs_bundling<O>(state: &BatchState<O>) -> bool {
    let all_pending = state.counts().pending == state.len();
    let already_bundled =
        matches!(state.jobs(), [job] if matches!(job.input, JobInput::Bundle(_)));
    all_pending && !state.is_empty() && !already_bundled
}

fn find_job(jobs: &mut [Job], id: JobId) -> Result<&mut Job> {
    jobs.iter_mut()
        .find(|job| job.id == id)
        .ok_or(FilewerkError::JobNotFound(id))
}

/// One adapter invocation under the class time limit.
///
/// On timeout the job's token is cancelled so blocking work stops at its
/// next check, and any subprocess is killed when the future is dropped.
fn run_job<'a, A>(
    adapter: &'a A,
    options: &'a A::Options,
    input: JobInput,
    ctx: TransformContext,
    limit: Duration,
) -> impl Future<Output = (JobId, Result<Vec<Artifact>>)> + 'a
where
    A: TransformAdapter,
{
    async move {
        let id = ctx.job_id;
        let outcome = match tokio::time::timeout(limit, adapter.transform(&input, options, &ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                ctx.cancel.cancel();
                Err(FilewerkError::TimedOut(limit.as_secs()))
            }
        };
        (id, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use filewerk_core::SourceFile;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Behaviour is chosen by file name prefix:
    /// `fail` errors, `slow` sleeps 10s, `wait` blocks until cancelled,
    /// `interrupt` cancels `interrupt` and then succeeds, anything else
    /// succeeds after 1s.
    #[derive(Default)]
    struct Scripted {
        mode: Option<AdapterMode>,
        interrupt: Option<CancellationToken>,
        calls: Mutex<Vec<String>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[derive(Debug, Clone, Default)]
    struct ScriptedOptions {
        invalid: bool,
    }

    #[async_trait]
    impl TransformAdapter for Scripted {
        type Options = ScriptedOptions;

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn mode(&self) -> AdapterMode {
            self.mode.unwrap_or(AdapterMode::PerFile)
        }

        fn validate(&self, options: &ScriptedOptions) -> Result<()> {
            if options.invalid {
                return Err(FilewerkError::Validation("bad options".into()));
            }
            Ok(())
        }

        async fn transform(
            &self,
            input: &JobInput,
            _options: &ScriptedOptions,
            ctx: &TransformContext,
        ) -> Result<Vec<Artifact>> {
            let name = input.display_name();
            self.calls.lock().expect("lock").push(name.clone());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            ctx.progress.report(0.5);
            let result = if name.starts_with("fail") {
                Err(FilewerkError::DocumentError(format!("{name} is corrupt")))
            } else if name.starts_with("slow") {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            } else if name.starts_with("wait") {
                ctx.cancel.cancelled().await;
                Err(FilewerkError::Cancelled)
            } else if name.starts_with("interrupt") {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if let Some(token) = &self.interrupt {
                    token.cancel();
                }
                Ok(())
            } else {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            result.map(|()| {
                let names: Vec<&str> = input.files().iter().map(|f| f.name()).collect();
                vec![Artifact::with_media_type(
                    format!("{}.out", names.join("+")),
                    Vec::new(),
                    "application/octet-stream",
                )]
            })
        }
    }

    fn batch(names: &[&str]) -> BatchState<ScriptedOptions> {
        let mut state = BatchState::new(ScriptedOptions::default());
        for name in names {
            state.push(Job::for_file(SourceFile::new(*name, b"x".to_vec(), None)));
        }
        state
    }

    fn config(concurrency: usize, failure_policy: FailurePolicy) -> RunnerConfig {
        RunnerConfig {
            concurrency,
            failure_policy,
            quick_timeout: Duration::from_secs(5),
            ..RunnerConfig::default()
        }
    }

    fn statuses(state: &BatchState<ScriptedOptions>) -> Vec<JobStatus> {
        state.jobs().iter().map(|job| job.status()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_isolated_to_its_job() {
        let mut state = batch(&["a.png", "fail.png", "c.png"]);
        let adapter = Scripted::default();
        let runner = BatchRunner::new(config(1, FailurePolicy::FailIsolated));

        let report = runner
            .run(&mut state, &adapter, CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(
            statuses(&state),
            [JobStatus::Succeeded, JobStatus::Failed, JobStatus::Succeeded]
        );
        assert_eq!((report.succeeded, report.failed, report.pending), (2, 1, 0));
        assert_eq!(report.aborted_by, None);

        let failed = &state.jobs()[1];
        let error = failed.error().expect("error recorded");
        assert_eq!(error.job_id, failed.id);
        assert_eq!(error.kind, ErrorKind::Adapter);
        assert!(failed.result().is_none());
        assert_eq!(state.jobs()[2].result().expect("result")[0].filename, "c.png.out");
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_leaves_the_rest_pending() {
        let mut state = batch(&["a.png", "fail.png", "c.png", "d.png"]);
        let adapter = Scripted::default();
        let runner = BatchRunner::new(config(1, FailurePolicy::FailFast));

        let report = runner
            .run(&mut state, &adapter, CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(
            statuses(&state),
            [JobStatus::Succeeded, JobStatus::Failed, JobStatus::Pending, JobStatus::Pending]
        );
        assert_eq!(report.aborted_by, Some(state.jobs()[1].id));
        assert_eq!(report.pending, 2);
        assert_eq!(adapter.calls.lock().expect("lock").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_dispatches_nothing() {
        let mut state = batch(&["a.png", "b.png"]);
        let adapter = Scripted::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = BatchRunner::new(RunnerConfig::default())
            .run(&mut state, &adapter, cancel)
            .await
            .expect("run");

        assert!(report.cancelled);
        assert_eq!(report.pending, 2);
        assert!(adapter.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_batch_stops_dispatch_and_reaches_running_job() {
        let mut state = batch(&["a.png", "wait.png", "c.png"]);
        let adapter = Scripted::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let report = BatchRunner::new(config(1, FailurePolicy::FailIsolated))
            .run(&mut state, &adapter, cancel)
            .await
            .expect("run");

        assert_eq!(
            statuses(&state),
            [JobStatus::Succeeded, JobStatus::Failed, JobStatus::Pending]
        );
        assert_eq!(state.jobs()[1].error().expect("error").kind, ErrorKind::Cancelled);
        assert!(report.cancelled);
        assert_eq!(report.aborted_by, None);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_after_the_last_job_is_not_a_cancelled_batch() {
        let cancel = CancellationToken::new();
        let adapter = Scripted {
            interrupt: Some(cancel.clone()),
            ..Scripted::default()
        };
        let mut state = batch(&["a.png", "interrupt.png"]);

        let report = BatchRunner::new(config(1, FailurePolicy::FailIsolated))
            .run(&mut state, &adapter, cancel.clone())
            .await
            .expect("run");

        assert!(cancel.is_cancelled());
        assert!(!report.cancelled);
        assert!(report.is_clean());
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_with_work_left_is_a_cancelled_batch() {
        let cancel = CancellationToken::new();
        let adapter = Scripted {
            interrupt: Some(cancel.clone()),
            ..Scripted::default()
        };
        let mut state = batch(&["interrupt.png", "b.png"]);

        let report = BatchRunner::new(config(1, FailurePolicy::FailIsolated))
            .run(&mut state, &adapter, cancel)
            .await
            .expect("run");

        assert!(report.cancelled);
        assert_eq!((report.succeeded, report.pending), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_job_times_out_and_batch_continues() {
        let mut state = batch(&["slow.mp4", "b.mp4"]);
        let adapter = Scripted::default();

        let report = BatchRunner::new(config(1, FailurePolicy::FailIsolated))
            .run(&mut state, &adapter, CancellationToken::new())
            .await
            .expect("run");

        let timed_out = state.jobs()[0].error().expect("error");
        assert_eq!(timed_out.kind, ErrorKind::TimedOut);
        assert_eq!(state.jobs()[1].status(), JobStatus::Succeeded);
        assert_eq!((report.succeeded, report.failed), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let mut state = batch(&["1.png", "2.png", "3.png", "4.png", "5.png"]);
        let adapter = Scripted::default();

        BatchRunner::new(config(2, FailurePolicy::FailIsolated))
            .run(&mut state, &adapter, CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(adapter.peak.load(Ordering::SeqCst), 2);
        assert_eq!(state.counts().succeeded, 5);
        // Dispatch follows list order even when completions interleave.
        assert_eq!(
            *adapter.calls.lock().expect("lock"),
            ["1.png", "2.png", "3.png", "4.png", "5.png"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_options_start_nothing() {
        let original = batch(&["a.png"]);
        let mut state = BatchState::new(ScriptedOptions { invalid: true });
        state.push(Job::new(original.jobs()[0].input.clone()));
        let adapter = Scripted::default();

        let err = BatchRunner::new(RunnerConfig::default())
            .run(&mut state, &adapter, CancellationToken::new())
            .await
            .expect_err("invalid");

        assert!(matches!(err, FilewerkError::Validation(_)));
        assert_eq!(statuses(&state), [JobStatus::Pending]);
        assert!(adapter.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn combining_adapter_runs_once_over_the_bundle() {
        let mut state = batch(&["c.pdf", "a.pdf", "b.pdf"]);
        let adapter = Scripted {
            mode: Some(AdapterMode::Combine),
            ..Default::default()
        };

        let report = BatchRunner::new(RunnerConfig::default())
            .run(&mut state, &adapter, CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(state.len(), 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(
            state.jobs()[0].result().expect("result")[0].filename,
            "c.pdf+a.pdf+b.pdf.out"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn events_follow_the_job_lifecycle() {
        let mut state = batch(&["a.png"]);
        let id = state.jobs()[0].id;
        let adapter = Scripted::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        BatchRunner::new(RunnerConfig::default())
            .with_events(tx)
            .run(&mut state, &adapter, CancellationToken::new())
            .await
            .expect("run");

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], BatchEvent::JobStarted(started) if started == id));
        assert!(matches!(events[1], BatchEvent::JobProgress(job, p) if job == id && p == 0.5));
        assert!(matches!(&events[2], BatchEvent::JobFinished(job) if job.status() == JobStatus::Succeeded));
        assert!(matches!(&events[3], BatchEvent::BatchFinished(report) if report.is_clean()));
        assert_eq!(events.len(), 4);
    }
}
