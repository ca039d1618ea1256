// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Terminal rendering of the projected view and of intake/delivery outcomes.

use std::io::{self, Write};

use filewerk_batch::{BatchEvent, BatchReport, DeliveryReport, Rejection};
use filewerk_core::human_errors::{humanize_error, humanize_job_error};
use filewerk_core::{JobId, JobStatus, ViewState};

use crate::catalog::Tool;

pub fn render_tools(out: &mut impl Write, tools: &[Tool]) -> io::Result<()> {
    let width = tools.iter().map(|tool| tool.slug.len()).max().unwrap_or(0);
    for tool in tools {
        writeln!(out, "{:<width$}  {}", tool.slug, tool.title)?;
    }
    Ok(())
}

pub fn render_rejections(out: &mut impl Write, rejected: &[Rejection]) -> io::Result<()> {
    for rejection in rejected {
        let human = humanize_error(&rejection.to_error());
        writeln!(out, "skipped {}", human.message)?;
        writeln!(out, "      {} ({})", human.suggestion, rejection.reason)?;
    }
    Ok(())
}

/// One status line per runner event worth showing; progress ticks are quiet.
pub fn event_line(event: &BatchEvent, total: usize, finished: usize) -> Option<String> {
    match event {
        BatchEvent::JobFinished(job) => {
            let mark = match job.status() {
                JobStatus::Succeeded => "done",
                _ => "failed",
            };
            Some(format!(
                "[{finished}/{total}] {mark} {}",
                job.input.display_name()
            ))
        }
        BatchEvent::BatchFinished(report) if report.cancelled => {
            Some("Cancelled; jobs already running were stopped.".into())
        }
        _ => None,
    }
}

/// Render a view. `source_name` resolves a failed job's id to its input name.
pub fn render_view<F>(out: &mut impl Write, view: &ViewState, source_name: F) -> io::Result<()>
where
    F: Fn(JobId) -> Option<String>,
{
    match view {
        ViewState::Empty => writeln!(out, "No files to convert."),
        ViewState::Listing { files } => {
            writeln!(out, "{} file(s) ready:", files.len())?;
            for name in files {
                writeln!(out, "  {name}")?;
            }
            Ok(())
        }
        ViewState::InProgress {
            percent,
            done,
            total,
        } => writeln!(out, "Converting... {percent}% ({done} of {total})"),
        ViewState::Finished {
            downloads,
            failures,
            not_started,
        } => {
            for entry in downloads {
                writeln!(
                    out,
                    "ok    {} -> {}",
                    entry.source_name,
                    entry.filenames.join(", ")
                )?;
            }
            for failure in failures {
                let human = humanize_job_error(failure);
                let name = source_name(failure.job_id).unwrap_or_else(|| failure.job_id.to_string());
                writeln!(out, "error {name}: {}", human.message)?;
                writeln!(out, "      {}", human.suggestion)?;
                writeln!(out, "      ({})", failure.message)?;
            }
            if *not_started > 0 {
                writeln!(out, "{not_started} file(s) were not started.")?;
            }
            if downloads.is_empty() {
                writeln!(out, "Nothing was converted.")?;
            }
            Ok(())
        }
    }
}

pub fn render_summary(out: &mut impl Write, report: &BatchReport) -> io::Result<()> {
    writeln!(
        out,
        "{} succeeded, {} failed, {} not started ({} ms)",
        report.succeeded, report.failed, report.pending, report.elapsed_ms
    )
}

pub fn render_delivery(out: &mut impl Write, delivery: &DeliveryReport) -> io::Result<()> {
    for receipt in &delivery.receipts {
        writeln!(out, "saved {}", receipt.path.display())?;
    }
    for failure in &delivery.failures {
        let human = humanize_job_error(&failure.error);
        writeln!(out, "not saved {}: {}", failure.filename, human.message)?;
        writeln!(out, "      ({})", failure.error.message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filewerk_core::error::FilewerkError;
    use filewerk_core::projection::DownloadEntry;
    use filewerk_core::{Job, JobError, SourceFile};

    fn rendered(view: &ViewState) -> String {
        let mut out = Vec::new();
        render_view(&mut out, view, |_| Some("scan.pdf".into())).expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn finished_view_lists_downloads_and_humanised_failures() {
        let ok = JobId::new();
        let bad = JobId::new();
        let view = ViewState::Finished {
            downloads: vec![DownloadEntry {
                job_id: ok,
                source_name: "report.pdf".into(),
                filenames: vec!["report-page-1.pdf".into(), "report-page-2.pdf".into()],
            }],
            failures: vec![JobError::from_error(
                bad,
                &FilewerkError::PdfError("scan.pdf: no catalog".into()),
            )],
            not_started: 0,
        };

        let text = rendered(&view);
        assert!(text.contains("ok    report.pdf -> report-page-1.pdf, report-page-2.pdf"));
        assert!(text.contains("error scan.pdf: This file couldn't be converted."));
        assert!(text.contains("no catalog"));
        assert!(!text.contains("Nothing was converted"));
    }

    #[test]
    fn all_failed_says_nothing_was_converted() {
        let view = ViewState::Finished {
            downloads: Vec::new(),
            failures: vec![JobError::from_error(JobId::new(), &FilewerkError::Cancelled)],
            not_started: 2,
        };
        let text = rendered(&view);
        assert!(text.contains("2 file(s) were not started."));
        assert!(text.contains("Nothing was converted."));
    }

    #[test]
    fn progress_and_listing() {
        let text = rendered(&ViewState::InProgress {
            percent: 40,
            done: 2,
            total: 5,
        });
        assert_eq!(text, "Converting... 40% (2 of 5)\n");

        let text = rendered(&ViewState::Listing {
            files: vec!["a.png".into(), "b.png".into()],
        });
        assert_eq!(text, "2 file(s) ready:\n  a.png\n  b.png\n");
    }

    #[test]
    fn finished_jobs_get_a_status_line() {
        let mut job = Job::for_file(SourceFile::new("a.png", b"x".to_vec(), None));
        job.start().expect("start");
        job.succeed(Vec::new()).expect("succeed");

        let line = event_line(&BatchEvent::JobFinished(job.clone()), 3, 1);
        assert_eq!(line.as_deref(), Some("[1/3] done a.png"));
        assert!(event_line(&BatchEvent::JobStarted(job.id), 3, 1).is_none());
    }

    #[test]
    fn rejections_are_explained_in_plain_language() {
        let mut out = Vec::new();
        let rejected = [Rejection {
            name: "notes.txt".into(),
            reason: "text/plain is not accepted here".into(),
        }];
        render_rejections(&mut out, &rejected).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("skipped \"notes.txt\" can't be used with this tool.\n"));
        assert!(text.contains("supported file types"));
        assert!(text.contains("(text/plain is not accepted here)"));
    }

    #[test]
    fn unsaved_results_are_reported() {
        let delivery = DeliveryReport {
            receipts: Vec::new(),
            failures: vec![filewerk_batch::DeliveryFailure {
                filename: "b.txt".into(),
                error: JobError::from_error(
                    JobId::new(),
                    &FilewerkError::Io(io::Error::other("disk full")),
                ),
            }],
        };
        let mut out = Vec::new();
        render_delivery(&mut out, &delivery).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("not saved b.txt: "));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn tool_list_is_aligned() {
        let mut out = Vec::new();
        render_tools(&mut out, &crate::catalog::TOOLS[..2]).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("image-convert      Convert images\n"));
    }
}
