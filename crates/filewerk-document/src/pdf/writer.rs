// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: create new PDF documents from text or images using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use filewerk_core::error::FilewerkError;
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::image::processor::flatten_onto_white;

/// Page sizes offered by the text and image tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PageSize {
    /// Width and height in millimetres, portrait.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
        }
    }
}

/// How each image is placed when building a PDF from images.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ImagePlacement {
    /// Fixed page size; the image is centred and scaled down to fit the margins.
    #[default]
    FitPage,
    /// Each page takes the image's own size at `IMAGE_DPI`, no margins.
    MatchImage,
}

/// Resolution used to turn image pixels into physical size.
const IMAGE_DPI: f32 = 150.0;

const IMAGE_MARGIN_MM: f32 = 15.0;

const MM_PER_PT: f32 = 25.4 / 72.0;

/// Creates new PDF documents from text content or raster images.
pub struct PdfWriter {
    page_size: PageSize,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfWriter {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            title: None,
        }
    }

    /// Create a new writer defaulting to A4.
    pub fn a4() -> Self {
        Self::new(PageSize::A4)
    }

    /// Set a title for the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.page_size.dimensions_mm();
        (Mm(w_mm), Mm(h_mm))
    }

    // -- Text to PDF ----------------------------------------------------------

    /// Create a PDF from plain text content.
    ///
    /// The text is laid out in a simple top-to-bottom flow using the built-in
    /// Helvetica font. Long lines are wrapped at an estimated character width
    /// and pages break automatically.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn create_from_text(&self, text: &str, font_size_pt: f32) -> Result<Vec<u8>, FilewerkError> {
        if !(6.0..=72.0).contains(&font_size_pt) {
            return Err(FilewerkError::Validation(format!(
                "font size must be between 6 and 72 pt, got {}",
                font_size_pt
            )));
        }

        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Filewerk Document");

        info!(page_size = ?self.page_size, title, "Creating text PDF");

        let line_height_pt: f32 = font_size_pt * 1.3;
        let margin_mm: f32 = 20.0;
        let margin_pt: f32 = Mm(margin_mm).into_pt().0;
        let usable_width_mm = page_w.0 - 2.0 * margin_mm;

        // Average Helvetica glyph width is roughly 0.50 * font_size in pt,
        // converted to mm (1pt = 0.3528mm).
        let avg_char_width_mm: f32 = 0.50 * font_size_pt * 0.3528;
        let max_chars_per_line = ((usable_width_mm / avg_char_width_mm) as usize).max(1);

        let wrapped_lines = wrap_text(text, max_chars_per_line);
        let page_h_pt = page_h.into_pt().0;
        let usable_height_pt = page_h_pt - 2.0 * margin_pt;
        let lines_per_page = ((usable_height_pt / line_height_pt) as usize).max(1);

        let mut doc = PdfDocument::new(title);
        let mut pages: Vec<PdfPage> = wrapped_lines
            .chunks(lines_per_page)
            .map(|chunk| {
                let mut ops: Vec<Op> = Vec::new();
                for (line_idx, line) in chunk.iter().enumerate() {
                    if line.is_empty() {
                        continue;
                    }
                    let y_pt = page_h_pt - margin_pt - (line_idx as f32 * line_height_pt);

                    ops.push(Op::StartTextSection);
                    ops.push(Op::SetTextCursor {
                        pos: Point {
                            x: Pt(margin_pt),
                            y: Pt(y_pt),
                        },
                    });
                    ops.push(Op::SetFontSizeBuiltinFont {
                        size: Pt(font_size_pt),
                        font: BuiltinFont::Helvetica,
                    });
                    ops.push(Op::WriteTextBuiltinFont {
                        items: vec![TextItem::Text(line.clone())],
                        font: BuiltinFont::Helvetica,
                    });
                    ops.push(Op::EndTextSection);
                }
                PdfPage::new(page_w, page_h, ops)
            })
            .collect();

        // Empty input still produces a (blank) one-page document.
        if pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        doc.with_pages(pages);

        debug!(
            total_lines = wrapped_lines.len(),
            pages = doc.pages.len(),
            "Text layout complete"
        );

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
    }

    // -- Images to PDF --------------------------------------------------------

    /// Create a PDF with one page per image, in the order given.
    #[instrument(skip(self, images), fields(images = images.len()))]
    pub fn create_from_images(
        &self,
        images: &[DynamicImage],
        placement: ImagePlacement,
    ) -> Result<Vec<u8>, FilewerkError> {
        if images.is_empty() {
            return Err(FilewerkError::Validation("no images to place".to_string()));
        }

        let title = self.title.as_deref().unwrap_or("Filewerk Images");
        info!(page_size = ?self.page_size, ?placement, title, "Creating image PDF");

        let mut doc = PdfDocument::new(title);
        let mut pages = Vec::with_capacity(images.len());

        for image in images {
            let rgb = flatten_onto_white(image);
            let (img_width, img_height) = rgb.dimensions();
            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: img_width as usize,
                height: img_height as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
            let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;

            let (page_w, page_h, x_offset, y_offset, scale) = match placement {
                ImagePlacement::MatchImage => (
                    Mm(img_w_pt * MM_PER_PT),
                    Mm(img_h_pt * MM_PER_PT),
                    0.0,
                    0.0,
                    1.0,
                ),
                ImagePlacement::FitPage => {
                    let (page_w, page_h) = self.page_dimensions();
                    let usable_w_pt = Mm(page_w.0 - 2.0 * IMAGE_MARGIN_MM).into_pt().0;
                    let usable_h_pt = Mm(page_h.0 - 2.0 * IMAGE_MARGIN_MM).into_pt().0;

                    // Scale to fit while preserving aspect ratio; never upscale.
                    let scale = (usable_w_pt / img_w_pt).min(usable_h_pt / img_h_pt).min(1.0);

                    let margin_pt = Mm(IMAGE_MARGIN_MM).into_pt().0;
                    let x_offset = margin_pt + (usable_w_pt - img_w_pt * scale) / 2.0;
                    let y_offset = margin_pt + (usable_h_pt - img_h_pt * scale) / 2.0;
                    (page_w, page_h, x_offset, y_offset, scale)
                }
            };

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(x_offset)),
                    translate_y: Some(Pt(y_offset)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            }];

            debug!(img_width, img_height, scale, "Image placed on page");
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
    }
}

// -- Text wrapping helper -----------------------------------------------------

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then performs simple word-wrap within each
/// paragraph. Words longer than `max_width` are force-broken on character
/// boundaries.
pub(crate) fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.lines() {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current_line = String::with_capacity(max_width);
        let mut current_len = 0usize;

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    if chunks.peek().is_some() {
                        result.push(chunk.iter().collect());
                    } else {
                        current_line = chunk.iter().collect();
                        current_len = chunk.len();
                    }
                }
            } else if current_line.is_empty() {
                current_line.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::replace(&mut current_line, word.to_string()));
                current_len = word_len;
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    result
}
