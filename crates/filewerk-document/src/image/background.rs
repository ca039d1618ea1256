// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background removal.
//
// The background is taken to be the region connected to the image border
// whose colour is close to the dominant border colour. Pixels in it become
// transparent; regions of the same colour enclosed by the subject are kept.

use std::collections::HashSet;

use async_trait::async_trait;
use filewerk_core::adapter::run_blocking;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{Artifact, FileFormat, JobInput, TransformAdapter, TransformContext};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, info, instrument};

use super::processor::{ImageProcessor, ImageTarget};
use crate::pdf::tools::in_file;

#[derive(Debug, Clone)]
pub struct RemoveBackgroundOptions {
    /// Maximum RGB distance from the border colour still counted as background.
    pub tolerance: u8,
    /// Gaussian sigma applied to the alpha edge; 0 gives a hard edge.
    pub feather: f32,
}

impl Default for RemoveBackgroundOptions {
    fn default() -> Self {
        Self {
            tolerance: 40,
            feather: 1.0,
        }
    }
}

pub struct RemoveBackground;

#[async_trait]
impl TransformAdapter for RemoveBackground {
    type Options = RemoveBackgroundOptions;

    fn name(&self) -> &'static str {
        "remove-background"
    }

    fn validate(&self, options: &RemoveBackgroundOptions) -> Result<()> {
        if !(0.0..=20.0).contains(&options.feather) {
            return Err(FilewerkError::Validation(format!(
                "feather must be between 0 and 20, got {}",
                options.feather
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, tolerance = options.tolerance))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &RemoveBackgroundOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?.clone();
        let options = options.clone();
        let ctx = ctx.clone();

        run_blocking(move || {
            let decoded = ImageProcessor::from_bytes(file.bytes())
                .map_err(|err| in_file(err, file.name()))?
                .into_dynamic();
            ctx.progress.report(0.2);

            let cut_out = remove_background(&decoded, &options)?;
            ctx.progress.report(0.8);
            ctx.check_cancelled()?;

            let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(cut_out))
                .encode(ImageTarget::Png)?;
            Ok(vec![Artifact::new(
                format!("{}-no-bg.png", file.stem()),
                bytes,
                FileFormat::Png,
            )])
        })
        .await
    }
}

/// Make the border-connected background transparent.
pub fn remove_background(image: &DynamicImage, options: &RemoveBackgroundOptions) -> Result<RgbaImage> {
    let mut rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(FilewerkError::ImageError("image has no pixels".into()));
    }

    let border = border_colour(&rgba);
    let tolerance = options.tolerance as f32;

    // 255 where the pixel could be background.
    let candidates = GrayImage::from_fn(width, height, |x, y| {
        let pixel = rgba.get_pixel(x, y);
        if pixel[3] == 0 || colour_distance(pixel, border) <= tolerance {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    let labels = connected_components(&candidates, Connectivity::Eight, Luma([0u8]));
    let background_labels: HashSet<u32> = border_coords(width, height)
        .map(|(x, y)| labels.get_pixel(x, y)[0])
        .filter(|&label| label != 0)
        .collect();

    let mut alpha = GrayImage::from_fn(width, height, |x, y| {
        if background_labels.contains(&labels.get_pixel(x, y)[0]) {
            Luma([0])
        } else {
            Luma([255])
        }
    });

    let kept = alpha.pixels().filter(|p| p[0] == 255).count();
    if kept == 0 {
        return Err(FilewerkError::ImageError(
            "no foreground found: the whole image matches the background colour".into(),
        ));
    }

    if options.feather > 0.0 {
        alpha = gaussian_blur_f32(&alpha, options.feather);
    }

    for (pixel, mask) in rgba.pixels_mut().zip(alpha.pixels()) {
        pixel[3] = pixel[3].min(mask[0]);
    }

    info!(
        width,
        height,
        kept_ratio = kept as f32 / (width * height) as f32,
        "Background removed"
    );
    Ok(rgba)
}

/// Per-channel median of the outermost ring of pixels.
fn border_colour(image: &RgbaImage) -> Rgba<u8> {
    let (width, height) = image.dimensions();
    let mut channels: [Vec<u8>; 3] = Default::default();
    for (x, y) in border_coords(width, height) {
        let pixel = image.get_pixel(x, y);
        for (channel, values) in channels.iter_mut().enumerate() {
            values.push(pixel[channel]);
        }
    }

    let median = |values: &mut Vec<u8>| {
        values.sort_unstable();
        values.get(values.len() / 2).copied().unwrap_or(255)
    };
    let [mut r, mut g, mut b] = channels;
    let colour = Rgba([median(&mut r), median(&mut g), median(&mut b), 255]);
    debug!(?colour, "Estimated background colour");
    colour
}

fn border_coords(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let top_bottom = (0..width).flat_map(move |x| [(x, 0), (x, height - 1)]);
    let sides = (0..height).flat_map(move |y| [(0, y), (width - 1, y)]);
    top_bottom.chain(sides)
}

fn colour_distance(a: &Rgba<u8>, b: Rgba<u8>) -> f32 {
    let d = |i: usize| a[i] as f32 - b[i] as f32;
    (d(0) * d(0) + d(1) * d(1) + d(2) * d(2)).sqrt()
}
