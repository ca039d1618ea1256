// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: decoding, resizing and encoding, plus the format conversion
// and background removal tools.

pub mod background;
pub mod convert;
pub mod processor;

pub use background::{RemoveBackground, RemoveBackgroundOptions};
pub use convert::{ImageConvert, ImageConvertOptions};
pub use processor::{ImageProcessor, ImageTarget};
