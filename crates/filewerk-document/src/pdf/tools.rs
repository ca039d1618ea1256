// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF tool adapters: merge, split/extract, rotate, images to PDF, text to PDF.

use async_trait::async_trait;
use filewerk_core::adapter::run_blocking;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{AdapterMode, Artifact, FileFormat, JobInput, TransformAdapter, TransformContext};
use tracing::{info, instrument};

use super::pages::{check_page_syntax, parse_page_groups, parse_page_selection};
use super::reader::{PdfReader, merge_documents};
use super::writer::{ImagePlacement, PageSize, PdfWriter};

/// Prefix an adapter error with the file it came from.
pub(crate) fn in_file(err: FilewerkError, name: &str) -> FilewerkError {
    match err {
        FilewerkError::PdfError(detail) => FilewerkError::PdfError(format!("{name}: {detail}")),
        FilewerkError::ImageError(detail) => FilewerkError::ImageError(format!("{name}: {detail}")),
        other => other,
    }
}

fn require_pdf_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FilewerkError::Validation("output name must not be empty".into()));
    }
    Ok(())
}

// -- Merge ----------------------------------------------------------------------

/// Concatenate every input PDF, in list order, into one document.
pub struct MergePdf;

#[derive(Debug, Clone)]
pub struct MergePdfOptions {
    pub output_name: String,
}

impl Default for MergePdfOptions {
    fn default() -> Self {
        Self {
            output_name: "merged.pdf".into(),
        }
    }
}

#[async_trait]
impl TransformAdapter for MergePdf {
    type Options = MergePdfOptions;

    fn name(&self) -> &'static str {
        "merge-pdf"
    }

    fn mode(&self) -> AdapterMode {
        AdapterMode::Combine
    }

    fn validate(&self, options: &MergePdfOptions) -> Result<()> {
        require_pdf_name(&options.output_name)
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, files = input.files().len()))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &MergePdfOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let files = input.files().to_vec();
        let output_name = options.output_name.clone();
        let ctx = ctx.clone();

        run_blocking(move || {
            let total = files.len() as f32 + 1.0;
            let mut readers = Vec::with_capacity(files.len());
            for (index, file) in files.iter().enumerate() {
                ctx.check_cancelled()?;
                let reader = PdfReader::from_bytes(file.bytes())
                    .map_err(|err| in_file(err, file.name()))?
                    .with_name(file.name());
                readers.push(reader);
                ctx.progress.report((index + 1) as f32 / total);
            }

            let merged = merge_documents(&readers)?;
            info!(files = readers.len(), bytes = merged.len(), "PDFs merged");
            Ok(vec![Artifact::new(output_name, merged, FileFormat::Pdf)])
        })
        .await
    }
}

// -- Split / extract ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// One single-page PDF per page.
    #[default]
    EveryPage,
    /// One PDF per comma-separated group, e.g. `"1-3,4,5-9"`.
    Ranges(String),
    /// One PDF holding the selected pages, e.g. `"1,3,5-7"`.
    Extract(String),
}

#[derive(Debug, Clone, Default)]
pub struct SplitPdfOptions {
    pub mode: SplitMode,
}

/// Split a PDF into several, or pull selected pages out of it.
pub struct SplitPdf;

#[async_trait]
impl TransformAdapter for SplitPdf {
    type Options = SplitPdfOptions;

    fn name(&self) -> &'static str {
        "split-pdf"
    }

    fn validate(&self, options: &SplitPdfOptions) -> Result<()> {
        match &options.mode {
            SplitMode::EveryPage => Ok(()),
            SplitMode::Ranges(ranges) | SplitMode::Extract(ranges) => check_page_syntax(ranges),
        }
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, mode = ?options.mode))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &SplitPdfOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?.clone();
        let mode = options.mode.clone();

        run_blocking(move || {
            let reader = PdfReader::from_bytes(file.bytes()).map_err(|err| in_file(err, file.name()))?;
            let stem = file.stem();
            let page_count = reader.page_count();

            let artifacts = match mode {
                SplitMode::EveryPage => {
                    let width = page_count.to_string().len();
                    reader
                        .split_every_page()?
                        .into_iter()
                        .enumerate()
                        .map(|(index, bytes)| {
                            Artifact::new(
                                format!("{stem}-page-{:0width$}.pdf", index + 1),
                                bytes,
                                FileFormat::Pdf,
                            )
                        })
                        .collect()
                }
                SplitMode::Ranges(ranges) => parse_page_groups(&ranges, page_count)?
                    .into_iter()
                    .map(|group| {
                        let bytes = reader.extract_pages(&group)?;
                        Ok(Artifact::new(
                            format!("{stem}-pages-{}.pdf", group_label(&group)),
                            bytes,
                            FileFormat::Pdf,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?,
                SplitMode::Extract(selection) => {
                    let pages = parse_page_selection(&selection, page_count)?;
                    let bytes = reader.extract_pages(&pages)?;
                    vec![Artifact::new(format!("{stem}-extract.pdf"), bytes, FileFormat::Pdf)]
                }
            };

            info!(outputs = artifacts.len(), "PDF split");
            Ok(artifacts)
        })
        .await
    }
}

/// 1-based label for a contiguous group: "4" or "1-3".
fn group_label(group: &[u32]) -> String {
    match (group.first(), group.last()) {
        (Some(first), Some(last)) if first != last => format!("{}-{}", first + 1, last + 1),
        (Some(only), _) => (only + 1).to_string(),
        _ => String::new(),
    }
}

// -- Rotate ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RotatePdfOptions {
    /// Clockwise, a multiple of 90 (negative turns anticlockwise).
    pub degrees: i32,
    /// Pages to rotate (`"1,3-4"`); `None` rotates all of them.
    pub pages: Option<String>,
}

impl Default for RotatePdfOptions {
    fn default() -> Self {
        Self {
            degrees: 90,
            pages: None,
        }
    }
}

pub struct RotatePdf;

#[async_trait]
impl TransformAdapter for RotatePdf {
    type Options = RotatePdfOptions;

    fn name(&self) -> &'static str {
        "rotate-pdf"
    }

    fn validate(&self, options: &RotatePdfOptions) -> Result<()> {
        if options.degrees % 90 != 0 {
            return Err(FilewerkError::Validation(format!(
                "rotation must be a multiple of 90, got {}",
                options.degrees
            )));
        }
        match &options.pages {
            Some(pages) => check_page_syntax(pages),
            None => Ok(()),
        }
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, degrees = options.degrees))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &RotatePdfOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?.clone();
        let options = options.clone();

        run_blocking(move || {
            let reader = PdfReader::from_bytes(file.bytes()).map_err(|err| in_file(err, file.name()))?;
            let selection = options
                .pages
                .as_deref()
                .map(|pages| parse_page_selection(pages, reader.page_count()))
                .transpose()?;

            let bytes = reader.rotate_pages(selection.as_deref(), options.degrees)?;
            Ok(vec![Artifact::new(
                format!("{}-rotated.pdf", file.stem()),
                bytes,
                FileFormat::Pdf,
            )])
        })
        .await
    }
}

// -- Images to PDF --------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ImagesToPdfOptions {
    pub page_size: PageSize,
    pub placement: ImagePlacement,
    pub output_name: String,
}

impl Default for ImagesToPdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            placement: ImagePlacement::FitPage,
            output_name: "images.pdf".into(),
        }
    }
}

/// One page per image, in list order.
pub struct ImagesToPdf;

#[async_trait]
impl TransformAdapter for ImagesToPdf {
    type Options = ImagesToPdfOptions;

    fn name(&self) -> &'static str {
        "images-to-pdf"
    }

    fn mode(&self) -> AdapterMode {
        AdapterMode::Combine
    }

    fn validate(&self, options: &ImagesToPdfOptions) -> Result<()> {
        require_pdf_name(&options.output_name)
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, files = input.files().len()))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &ImagesToPdfOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let files = input.files().to_vec();
        let options = options.clone();
        let ctx = ctx.clone();

        run_blocking(move || {
            let total = files.len() as f32 + 1.0;
            let mut images = Vec::with_capacity(files.len());
            for (index, file) in files.iter().enumerate() {
                ctx.check_cancelled()?;
                let image = image::load_from_memory(file.bytes()).map_err(|err| {
                    FilewerkError::ImageError(format!("{}: failed to decode image: {}", file.name(), err))
                })?;
                images.push(image);
                ctx.progress.report((index + 1) as f32 / total);
            }

            let bytes = PdfWriter::new(options.page_size).create_from_images(&images, options.placement)?;
            Ok(vec![Artifact::new(options.output_name, bytes, FileFormat::Pdf)])
        })
        .await
    }
}

// -- Text to PDF ----------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TextToPdfOptions {
    pub page_size: PageSize,
    pub font_size_pt: f32,
}

impl Default for TextToPdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            font_size_pt: 11.0,
        }
    }
}

/// Plain text file to a paginated PDF.
pub struct TextToPdf;

#[async_trait]
impl TransformAdapter for TextToPdf {
    type Options = TextToPdfOptions;

    fn name(&self) -> &'static str {
        "text-to-pdf"
    }

    fn validate(&self, options: &TextToPdfOptions) -> Result<()> {
        if !(6.0..=72.0).contains(&options.font_size_pt) {
            return Err(FilewerkError::Validation(format!(
                "font size must be between 6 and 72 pt, got {}",
                options.font_size_pt
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &TextToPdfOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?.clone();
        let options = options.clone();

        run_blocking(move || {
            let raw = String::from_utf8_lossy(file.bytes());
            let text = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
            let bytes = PdfWriter::new(options.page_size)
                .with_title(file.stem())
                .create_from_text(text, options.font_size_pt)?;
            Ok(vec![Artifact::new(
                format!("{}.pdf", file.stem()),
                bytes,
                FileFormat::Pdf,
            )])
        })
        .await
    }
}
