// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: reading, merging, splitting, rotating, and creating PDFs, plus
// the tool adapters built on them.

pub mod pages;
pub mod reader;
pub mod tools;
pub mod writer;

pub use pages::{check_page_syntax, parse_page_groups, parse_page_selection};
pub use reader::{PdfReader, merge_documents};
pub use tools::{
    ImagesToPdf, ImagesToPdfOptions, MergePdf, MergePdfOptions, RotatePdf, RotatePdfOptions,
    SplitMode, SplitPdf, SplitPdfOptions, TextToPdf, TextToPdfOptions,
};
pub use writer::{ImagePlacement, PageSize, PdfWriter};
