// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// filewerk-document: the conversion tools behind Filewerk.
//
// Each tool implements `filewerk_core::TransformAdapter`: PDF operations
// (merge, split, rotate, images/text to PDF), image conversion and background
// removal, ZIP packing, DOCX to PDF, ffmpeg transcoding, and conversion
// through a remote HTTP service.

pub mod archive;
pub mod docx;
pub mod image;
pub mod media;
pub mod pdf;
pub mod remote;

// Re-export the tools so callers can use `filewerk_document::MergePdf` etc.
pub use archive::{ZipPack, ZipPackOptions, ZipUnpack, ZipUnpackOptions};
pub use docx::{DocxToPdf, DocxToPdfOptions};
pub use image::{
    ImageConvert, ImageConvertOptions, ImageProcessor, ImageTarget, RemoveBackground,
    RemoveBackgroundOptions,
};
pub use media::{MediaTarget, Transcode, TranscodeOptions};
pub use pdf::{
    ImagePlacement, ImagesToPdf, ImagesToPdfOptions, MergePdf, MergePdfOptions, PageSize,
    PdfReader, PdfWriter, RotatePdf, RotatePdfOptions, SplitMode, SplitPdf, SplitPdfOptions,
    TextToPdf, TextToPdfOptions,
};
pub use remote::{RemoteConvert, RemoteConvertOptions};
