// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image format conversion tool.

use async_trait::async_trait;
use filewerk_core::adapter::run_blocking;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{Artifact, JobInput, TransformAdapter, TransformContext};
use tracing::{debug, instrument};

use super::processor::{ImageProcessor, ImageTarget};
use crate::pdf::tools::in_file;

#[derive(Debug, Clone)]
pub struct ImageConvertOptions {
    pub target: ImageTarget,
    /// Shrink to fit within this box; either bound may be left open.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub grayscale: bool,
}

impl Default for ImageConvertOptions {
    fn default() -> Self {
        Self {
            target: ImageTarget::Png,
            max_width: None,
            max_height: None,
            grayscale: false,
        }
    }
}

/// Decode any supported image and re-encode it in the target format.
pub struct ImageConvert;

#[async_trait]
impl TransformAdapter for ImageConvert {
    type Options = ImageConvertOptions;

    fn name(&self) -> &'static str {
        "image-convert"
    }

    fn validate(&self, options: &ImageConvertOptions) -> Result<()> {
        if let ImageTarget::Jpeg { quality } = options.target
            && !(1..=100).contains(&quality)
        {
            return Err(FilewerkError::Validation(format!(
                "JPEG quality must be between 1 and 100, got {quality}"
            )));
        }
        if options.max_width == Some(0) || options.max_height == Some(0) {
            return Err(FilewerkError::Validation(
                "maximum width and height must be at least 1 pixel".into(),
            ));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, target = ?options.target))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &ImageConvertOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?.clone();
        let options = options.clone();
        let ctx = ctx.clone();

        run_blocking(move || {
            let mut processor =
                ImageProcessor::from_bytes(file.bytes()).map_err(|err| in_file(err, file.name()))?;
            ctx.progress.report(0.3);

            if options.max_width.is_some() || options.max_height.is_some() {
                processor = processor.resize_to_fit(
                    options.max_width.unwrap_or(u32::MAX),
                    options.max_height.unwrap_or(u32::MAX),
                );
            }
            if options.grayscale {
                processor = processor.grayscale();
            }

            ctx.check_cancelled()?;
            let bytes = processor.encode(options.target)?;
            let format = options.target.format();
            debug!(out_bytes = bytes.len(), "Image converted");

            Ok(vec![Artifact::new(
                format!("{}.{}", file.stem(), format.extension()),
                bytes,
                format,
            )])
        })
        .await
    }
}
