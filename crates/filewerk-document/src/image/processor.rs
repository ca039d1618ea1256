// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, fit-within resize, grayscale, and encode to any of
// the output formats the image tools offer. Operates on in-memory images using
// the `image` crate.

use filewerk_core::FileFormat;
use filewerk_core::error::FilewerkError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::{debug, info, instrument};

/// Largest edge an ICO entry may have.
const ICO_MAX_EDGE: u32 = 256;

/// Output encodings offered by the image tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    Png,
    /// Lossy, no alpha; `quality` is 1-100.
    Jpeg { quality: u8 },
    /// Lossless WebP (the only WebP encoder the `image` crate ships).
    WebP,
    Gif,
    Bmp,
    Tiff,
    Ico,
}

impl ImageTarget {
    pub fn format(&self) -> FileFormat {
        match self {
            Self::Png => FileFormat::Png,
            Self::Jpeg { .. } => FileFormat::Jpeg,
            Self::WebP => FileFormat::WebP,
            Self::Gif => FileFormat::Gif,
            Self::Bmp => FileFormat::Bmp,
            Self::Tiff => FileFormat::Tiff,
            Self::Ico => FileFormat::Ico,
        }
    }
}

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`,
/// enabling method chaining.
///
/// ```ignore
/// let webp = ImageProcessor::from_bytes(&bytes)?
///     .resize_to_fit(1200, 1200)
///     .encode(ImageTarget::WebP)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, FilewerkError> {
        let img = image::load_from_memory(data).map_err(|err| {
            FilewerkError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Shrink the image to fit within `max_width` x `max_height`, preserving
    /// aspect ratio. Images already inside the box are left untouched.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn resize_to_fit(self, max_width: u32, max_height: u32) -> Self {
        if self.image.width() <= max_width && self.image.height() <= max_height {
            return self;
        }
        info!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            max_width,
            max_height,
            "Resizing image"
        );
        let resized = self.image.resize(max_width, max_height, FilterType::Lanczos3);
        debug!(
            new_w = resized.width(),
            new_h = resized.height(),
            "Resize complete"
        );
        Self { image: resized }
    }

    /// Convert the image to grayscale, keeping any alpha channel.
    pub fn grayscale(self) -> Self {
        Self {
            image: self.image.grayscale(),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode to the target format.
    ///
    /// Pixel data is first normalised to 8 bits per channel for encoders that
    /// reject wider samples; JPEG additionally drops alpha by compositing onto
    /// white.
    #[instrument(skip(self), fields(target = ?target))]
    pub fn encode(&self, target: ImageTarget) -> Result<Vec<u8>, FilewerkError> {
        match target {
            ImageTarget::Png => encode_to_format(&self.image, ImageFormat::Png),
            ImageTarget::Jpeg { quality } => self.to_jpeg_bytes(quality),
            ImageTarget::WebP => encode_to_format(&self.rgba8(), ImageFormat::WebP),
            ImageTarget::Gif => encode_to_format(&self.rgba8(), ImageFormat::Gif),
            ImageTarget::Bmp => encode_to_format(&self.rgba8(), ImageFormat::Bmp),
            ImageTarget::Tiff => encode_to_format(&self.rgba8(), ImageFormat::Tiff),
            ImageTarget::Ico => {
                let icon = if self.image.width() > ICO_MAX_EDGE || self.image.height() > ICO_MAX_EDGE {
                    self.image.thumbnail(ICO_MAX_EDGE, ICO_MAX_EDGE)
                } else {
                    self.image.clone()
                };
                encode_to_format(&DynamicImage::ImageRgba8(icon.to_rgba8()), ImageFormat::Ico)
            }
        }
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, FilewerkError> {
        let mut buffer = Vec::new();
        let rgb = flatten_onto_white(&self.image);
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder).map_err(|err| {
            FilewerkError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    fn rgba8(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.image.to_rgba8())
    }
}

/// Composite any alpha channel onto white, producing opaque RGB.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
pub(crate) fn encode_to_format(
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<Vec<u8>, FilewerkError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        FilewerkError::ImageError(format!("{:?} encoding failed: {}", format, err))
    })?;
    Ok(buffer)
}
