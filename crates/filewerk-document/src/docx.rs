// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DOCX to PDF, text only.
//
// A DOCX file is a ZIP archive; the body lives in `word/document.xml`. The
// paragraphs are pulled out with quick-xml and laid out with the plain-text
// PDF writer. Styling, tables and embedded images are not reproduced.

use std::io::{Cursor, Read};

use async_trait::async_trait;
use filewerk_core::adapter::run_blocking;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{Artifact, FileFormat, JobInput, TransformAdapter, TransformContext};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, instrument};
use zip::ZipArchive;

use crate::pdf::writer::{PageSize, PdfWriter};

const BODY_PART: &str = "word/document.xml";

/// Refuse document bodies larger than this once inflated.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DocxToPdfOptions {
    pub page_size: PageSize,
    pub font_size_pt: f32,
}

impl Default for DocxToPdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            font_size_pt: 11.0,
        }
    }
}

pub struct DocxToPdf;

#[async_trait]
impl TransformAdapter for DocxToPdf {
    type Options = DocxToPdfOptions;

    fn name(&self) -> &'static str {
        "docx-to-pdf"
    }

    fn validate(&self, options: &DocxToPdfOptions) -> Result<()> {
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
        options: &DocxToPdfOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?.clone();
        let options = options.clone();
        let ctx = ctx.clone();

        run_blocking(move || {
            let xml = read_body_part(file.bytes())
                .map_err(|err| FilewerkError::DocumentError(format!("{}: {}", file.name(), err)))?;
            ctx.progress.report(0.3);

            let text = extract_text(&xml)
                .map_err(|err| FilewerkError::DocumentError(format!("{}: {}", file.name(), err)))?;
            debug!(chars = text.chars().count(), "DOCX text extracted");
            ctx.check_cancelled()?;

            let bytes = PdfWriter::new(options.page_size)
                .with_title(file.stem())
                .create_from_text(&text, options.font_size_pt)?;
            Ok(vec![Artifact::new(
                format!("{}.pdf", file.stem()),
                bytes,
                FileFormat::Pdf,
            )])
        })
        .await
    }
}

/// Inflate `word/document.xml` out of the DOCX archive.
fn read_body_part(docx: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(docx)).map_err(|err| format!("not a DOCX file ({err})"))?;
    let entry = archive
        .by_name(BODY_PART)
        .map_err(|_| format!("not a DOCX file (no {BODY_PART})"))?;

    let mut xml = String::new();
    entry
        .take(MAX_BODY_BYTES + 1)
        .read_to_string(&mut xml)
        .map_err(|err| format!("cannot read {BODY_PART}: {err}"))?;
    if xml.len() as u64 > MAX_BODY_BYTES {
        return Err(format!("{BODY_PART} is larger than {MAX_BODY_BYTES} bytes"));
    }
    Ok(xml)
}

/// Paragraph text of a WordprocessingML body, one line per paragraph.
///
/// Only `w:t` runs are kept; `w:tab` becomes a tab and `w:br`/`w:cr` a line
/// break. Deleted text (`w:delText`) and field instructions are skipped.
pub fn extract_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_run_text => {
                let run = e
                    .unescape()
                    .map_err(|err| format!("bad text at byte {}: {}", reader.buffer_position(), err))?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(format!(
                    "malformed XML at byte {}: {}",
                    reader.buffer_position(),
                    err
                ));
            }
        }
    }

    let trimmed_len = text.trim_end().len();
    text.truncate(trimmed_len);
    Ok(text)
}
