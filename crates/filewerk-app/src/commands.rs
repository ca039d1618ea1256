// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command execution: turn a parsed command line into a batch run and render
// what happened.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use filewerk_batch::{BatchEvent, BatchRunner, Deliverer, DirectorySink, FileIntake, RunnerConfig};
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{AppConfig, BatchState, TimeoutClass, TransformAdapter, ViewState, project};
use filewerk_document::{
    DocxToPdf, DocxToPdfOptions, ImageConvert, ImageConvertOptions, ImagePlacement, ImagesToPdf,
    ImagesToPdfOptions, MergePdf, MergePdfOptions, RemoteConvert, RemoteConvertOptions,
    RemoveBackground, RemoveBackgroundOptions, RotatePdf, RotatePdfOptions, SplitMode, SplitPdf,
    SplitPdfOptions, TextToPdf, TextToPdfOptions, Transcode, TranscodeOptions, ZipPack,
    ZipPackOptions, ZipUnpack, ZipUnpackOptions,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::{self, SeoMeta, TOOLS, Tool};
use crate::cli::{BatchArgs, Commands, ConfigAction};
use crate::config;
use crate::render;
use crate::sitemap::{Route, sitemap_xml};

/// How a command ended, as far as the exit status is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The batch ran but not every file was accepted and converted.
    PartialFailure,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::PartialFailure => ExitCode::from(2),
        }
    }
}

/// A registry entry with its page metadata, for `tools --json`.
#[derive(Serialize)]
struct ToolListing<'a> {
    #[serde(flatten)]
    tool: &'a Tool,
    seo: SeoMeta,
}

/// Run one command to completion.
pub async fn execute(
    command: Commands,
    config: &AppConfig,
    config_path: &Path,
    cancel: CancellationToken,
) -> Result<Outcome> {
    let slug = command.tool_slug();
    match command {
        Commands::Tools { json } => {
            let mut out = io::stdout();
            if json {
                let listing: Vec<ToolListing<'_>> = TOOLS
                    .iter()
                    .map(|tool| ToolListing {
                        tool,
                        seo: tool.seo(&config.site_base_url),
                    })
                    .collect();
                writeln!(out, "{}", serde_json::to_string_pretty(&listing)?)?;
            } else {
                render::render_tools(&mut out, TOOLS)?;
            }
            Ok(Outcome::Success)
        }

        Commands::Sitemap {
            base_url,
            routes,
            output,
        } => {
            let base_url = base_url.unwrap_or_else(|| config.site_base_url.clone());
            let mut extra = vec![Route::home()];
            extra.extend(routes.into_iter().map(Route::new));
            let xml = sitemap_xml(&base_url, TOOLS, &extra)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, xml)?;
                    info!(path = %path.display(), "Sitemap written");
                }
                None => writeln!(io::stdout(), "{xml}")?,
            }
            Ok(Outcome::Success)
        }

        Commands::Config { action } => {
            config_command(action, config, config_path)?;
            Ok(Outcome::Success)
        }

        Commands::ImageConvert {
            batch,
            to,
            quality,
            max_width,
            max_height,
            grayscale,
        } => {
            let options = ImageConvertOptions {
                target: to.target(quality.unwrap_or(config.jpeg_quality)),
                max_width,
                max_height,
                grayscale,
            };
            run_tool(slug, &ImageConvert, options, &batch, config, cancel).await
        }

        Commands::RemoveBackground {
            batch,
            tolerance,
            feather,
        } => {
            let options = RemoveBackgroundOptions { tolerance, feather };
            run_tool(slug, &RemoveBackground, options, &batch, config, cancel).await
        }

        Commands::ImagesToPdf {
            batch,
            page_size,
            match_image,
            output_name,
        } => {
            let options = ImagesToPdfOptions {
                page_size: page_size.into(),
                placement: if match_image {
                    ImagePlacement::MatchImage
                } else {
                    ImagePlacement::FitPage
                },
                output_name,
            };
            run_tool(slug, &ImagesToPdf, options, &batch, config, cancel).await
        }

        Commands::MergePdf { batch, output_name } => {
            let options = MergePdfOptions { output_name };
            run_tool(slug, &MergePdf, options, &batch, config, cancel).await
        }

        Commands::SplitPdf {
            batch,
            ranges,
            extract,
        } => {
            let mode = match (ranges, extract) {
                (Some(ranges), _) => SplitMode::Ranges(ranges),
                (None, Some(pages)) => SplitMode::Extract(pages),
                (None, None) => SplitMode::EveryPage,
            };
            run_tool(slug, &SplitPdf, SplitPdfOptions { mode }, &batch, config, cancel).await
        }

        Commands::RotatePdf {
            batch,
            degrees,
            pages,
        } => {
            let options = RotatePdfOptions { degrees, pages };
            run_tool(slug, &RotatePdf, options, &batch, config, cancel).await
        }

        Commands::TextToPdf { batch, layout } => {
            let options = TextToPdfOptions {
                page_size: layout.page_size.into(),
                font_size_pt: layout.font_size,
            };
            run_tool(slug, &TextToPdf, options, &batch, config, cancel).await
        }

        Commands::DocxToPdf { batch, layout } => {
            let options = DocxToPdfOptions {
                page_size: layout.page_size.into(),
                font_size_pt: layout.font_size,
            };
            run_tool(slug, &DocxToPdf, options, &batch, config, cancel).await
        }

        Commands::Zip {
            batch,
            output_name,
            level,
        } => {
            let options = ZipPackOptions { output_name, level };
            run_tool(slug, &ZipPack, options, &batch, config, cancel).await
        }

        Commands::Unzip {
            batch,
            prefix_archive_name,
        } => {
            let options = ZipUnpackOptions {
                prefix_archive_name,
            };
            run_tool(slug, &ZipUnpack, options, &batch, config, cancel).await
        }

        Commands::Transcode {
            batch,
            to,
            bitrate,
            trim_start,
            trim_end,
            ffmpeg,
        } => {
            let adapter = Transcode::new(ffmpeg.or_else(|| config.ffmpeg_path.clone()));
            let options = TranscodeOptions {
                target: to.into(),
                audio_bitrate_kbps: bitrate,
                trim_start,
                trim_end,
            };
            run_tool(slug, &adapter, options, &batch, config, cancel).await
        }

        Commands::RemoteDocxToPdf { batch, endpoint } => {
            let endpoint = endpoint
                .or_else(|| config.remote_endpoint.clone())
                .ok_or_else(|| {
                    FilewerkError::Validation(
                        "no conversion service configured; pass --endpoint or set remote_endpoint"
                            .into(),
                    )
                })?;
            let adapter =
                RemoteConvert::new(&endpoint, config.timeout_for(TimeoutClass::Remote))?;
            run_tool(
                slug,
                &adapter,
                RemoteConvertOptions::default(),
                &batch,
                config,
                cancel,
            )
            .await
        }
    }
}

fn config_command(action: ConfigAction, config: &AppConfig, config_path: &Path) -> Result<()> {
    let mut out = io::stdout();
    match action {
        ConfigAction::Show => writeln!(out, "{}", serde_json::to_string_pretty(config)?)?,
        ConfigAction::Path => writeln!(out, "{}", config_path.display())?,
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                return Err(FilewerkError::Validation(format!(
                    "{} already exists; use --force to replace it",
                    config_path.display()
                )));
            }
            config::persist_config(config_path, &AppConfig::default())?;
            writeln!(out, "wrote {}", config_path.display())?;
        }
    }
    Ok(())
}

/// Intake, run, render, deliver.
///
/// Returns success only when every file was accepted, converted and saved.
async fn run_tool<A>(
    slug: Option<&'static str>,
    adapter: &A,
    options: A::Options,
    batch: &BatchArgs,
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<Outcome>
where
    A: TransformAdapter,
{
    let tool = slug
        .and_then(catalog::find)
        .ok_or_else(|| FilewerkError::Validation(format!("{} is not a registered tool", adapter.name())))?;

    let mut config = config.clone();
    batch.apply(&mut config);

    let mut state = BatchState::new(options);
    let mut intake = FileIntake::new(tool.accept_list());
    if let Some(limit) = config.max_file_bytes {
        intake = intake.with_max_file_size(limit);
    }
    let intake = intake.add_paths(&mut state, &batch.files);
    render::render_rejections(&mut io::stderr(), &intake.rejected)?;

    if state.is_empty() {
        render::render_view(&mut io::stdout(), &ViewState::Empty, |_| None)?;
        return Ok(Outcome::PartialFailure);
    }

    let total = state.len();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        let mut finished = 0;
        while let Some(event) = events_rx.recv().await {
            if matches!(event, BatchEvent::JobFinished(_)) {
                finished += 1;
            }
            if let Some(line) = render::event_line(&event, total, finished) {
                let _ = writeln!(io::stderr(), "{line}");
            }
        }
    });

    let runner = BatchRunner::new(RunnerConfig::from(&config)).with_events(events_tx);
    let outcome = runner.run(&mut state, adapter, cancel).await;
    // Closes the event channel so the printer drains and exits.
    drop(runner);
    if let Err(err) = printer.await {
        warn!(error = %err, "Progress printer stopped early");
    }
    let report = outcome?;

    let mut out = io::stdout();
    let view = project(&state);
    render::render_view(&mut out, &view, |id| {
        state.get(id).map(|job| job.input.display_name())
    })?;
    render::render_summary(&mut out, &report)?;

    // Finished results are kept even when the batch was cut short.
    let deliverer = Deliverer::new(DirectorySink::create(&config.output_dir)?)
        .with_min_interval(config.delivery_interval());
    let delivery = deliverer.deliver_all(state.jobs()).await;
    render::render_delivery(&mut out, &delivery)?;

    if report.is_clean() && delivery.is_complete() && !intake.has_rejections() {
        Ok(Outcome::Success)
    } else {
        Ok(Outcome::PartialFailure)
    }
}
