// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the batch plumbing in filewerk-batch: intake
// filtering and runner dispatch overhead with an adapter that does no work.

use async_trait::async_trait;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use tokio_util::sync::CancellationToken;

use filewerk_batch::{AcceptList, BatchRunner, FileIntake, RunnerConfig};
use filewerk_core::error::Result;
use filewerk_core::{Artifact, BatchState, FileFormat, JobInput, SourceFile, TransformAdapter, TransformContext};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns the input unchanged.
struct Passthrough;

#[async_trait]
impl TransformAdapter for Passthrough {
    type Options = ();

    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn transform(&self, input: &JobInput, _: &(), _: &TransformContext) -> Result<Vec<Artifact>> {
        let file = input.file()?;
        Ok(vec![Artifact::new(file.name(), file.bytes().to_vec(), FileFormat::PlainText)])
    }
}

fn files(count: usize) -> Vec<SourceFile> {
    (0..count)
        .map(|i| {
            let (name, mime) = if i % 4 == 0 {
                (format!("clip-{i}.mp4"), "video/mp4")
            } else {
                (format!("page-{i}.txt"), "text/plain")
            };
            SourceFile::new(name, vec![b'x'; 256], Some(mime.into()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_intake(c: &mut Criterion) {
    let intake = FileIntake::new(AcceptList::new(["text/*"], ["txt", "md"]));
    let inputs = files(1_000);

    c.bench_function("intake (1000 files, 25% rejected)", |b| {
        b.iter_batched(
            || inputs.clone(),
            |batch| {
                let mut state = BatchState::new(());
                black_box(intake.add_files(&mut state, batch))
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_runner_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let intake = FileIntake::new(AcceptList::any());
    let inputs = files(500);
    let runner = BatchRunner::new(RunnerConfig {
        concurrency: 8,
        ..RunnerConfig::default()
    });

    c.bench_function("runner dispatch (500 no-op jobs, concurrency 8)", |b| {
        b.iter_batched(
            || {
                let mut state = BatchState::new(());
                intake.add_files(&mut state, inputs.clone());
                state
            },
            |mut state| {
                runtime.block_on(async {
                    black_box(
                        runner
                            .run(&mut state, &Passthrough, CancellationToken::new())
                            .await
                            .expect("run"),
                    )
                })
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_intake, bench_runner_dispatch);
criterion_main!(benches);
