// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The tool registry: every conversion Filewerk offers, with the file types it
// accepts and the metadata used for its public page.

use filewerk_batch::AcceptList;
use serde::Serialize;

/// How often a page is expected to change, as understood by sitemap readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// One entry in the registry.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Stable identifier; also the CLI subcommand and the page path.
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub mime_types: &'static [&'static str],
    pub extensions: &'static [&'static str],
    /// Sitemap priority, 0.0 to 1.0.
    pub priority: f32,
    pub changefreq: ChangeFreq,
}

/// Title, description and canonical link for a tool page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeoMeta {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
}

impl Tool {
    pub fn accept_list(&self) -> AcceptList {
        AcceptList::new(self.mime_types, self.extensions)
    }

    pub fn path(&self) -> String {
        format!("/{}", self.slug)
    }

    pub fn seo(&self, base_url: &str) -> SeoMeta {
        SeoMeta {
            title: format!("{} | Filewerk", self.title),
            description: self.description.to_string(),
            canonical_url: join_url(base_url, &self.path()),
        }
    }
}

/// Join a site base URL and a route path with exactly one slash between them.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim().trim_start_matches('/');
    if path.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{path}")
    }
}

const IMAGE_MIMES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/x-icon",
];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff", "ico"];

const PDF_MIMES: &[&str] = &["application/pdf"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];

const DOCX_MIMES: &[&str] = &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"];
const DOCX_EXTENSIONS: &[&str] = &["docx"];

/// Every tool, in the order they are listed.
pub const TOOLS: &[Tool] = &[
    Tool {
        slug: "image-convert",
        title: "Convert images",
        description: "Convert images between PNG, JPEG, WebP, GIF, BMP, TIFF and ICO, optionally resizing them.",
        mime_types: IMAGE_MIMES,
        extensions: IMAGE_EXTENSIONS,
        priority: 0.9,
        changefreq: ChangeFreq::Weekly,
    },
    Tool {
        slug: "remove-background",
        title: "Remove image background",
        description: "Make the plain background of a photo or logo transparent and save it as PNG.",
        mime_types: &["image/png", "image/jpeg", "image/webp"],
        extensions: &["png", "jpg", "jpeg", "webp"],
        priority: 0.8,
        changefreq: ChangeFreq::Monthly,
    },
    Tool {
        slug: "images-to-pdf",
        title: "Images to PDF",
        description: "Combine images into one PDF, one page per image, in the order you choose.",
        mime_types: IMAGE_MIMES,
        extensions: IMAGE_EXTENSIONS,
        priority: 0.8,
        changefreq: ChangeFreq::Monthly,
    },
    Tool {
        slug: "merge-pdf",
        title: "Merge PDF files",
        description: "Join several PDF files into one document, keeping the order you choose.",
        mime_types: PDF_MIMES,
        extensions: PDF_EXTENSIONS,
        priority: 0.9,
        changefreq: ChangeFreq::Weekly,
    },
    Tool {
        slug: "split-pdf",
        title: "Split PDF",
        description: "Split a PDF into single pages or page ranges, or extract selected pages.",
        mime_types: PDF_MIMES,
        extensions: PDF_EXTENSIONS,
        priority: 0.8,
        changefreq: ChangeFreq::Monthly,
    },
    Tool {
        slug: "rotate-pdf",
        title: "Rotate PDF pages",
        description: "Rotate all or some pages of a PDF by a quarter, half or three-quarter turn.",
        mime_types: PDF_MIMES,
        extensions: PDF_EXTENSIONS,
        priority: 0.7,
        changefreq: ChangeFreq::Monthly,
    },
    Tool {
        slug: "text-to-pdf",
        title: "Text to PDF",
        description: "Typeset plain text files as paginated PDF documents.",
        mime_types: &["text/plain", "text/markdown"],
        extensions: &["txt", "text", "md"],
        priority: 0.6,
        changefreq: ChangeFreq::Yearly,
    },
    Tool {
        slug: "docx-to-pdf",
        title: "Word to PDF",
        description: "Turn the text of Word (.docx) documents into PDF, entirely on your machine.",
        mime_types: DOCX_MIMES,
        extensions: DOCX_EXTENSIONS,
        priority: 0.8,
        changefreq: ChangeFreq::Monthly,
    },
    Tool {
        slug: "zip",
        title: "Create ZIP archive",
        description: "Pack any files into a single ZIP archive.",
        mime_types: &["*/*"],
        extensions: &[],
        priority: 0.6,
        changefreq: ChangeFreq::Yearly,
    },
    Tool {
        slug: "unzip",
        title: "Extract ZIP archive",
        description: "Extract every file from one or more ZIP archives.",
        mime_types: &["application/zip", "application/x-zip-compressed"],
        extensions: &["zip"],
        priority: 0.6,
        changefreq: ChangeFreq::Yearly,
    },
    Tool {
        slug: "transcode",
        title: "Convert audio and video",
        description: "Convert audio and video between MP3, WAV, OGG, FLAC, M4A, MP4, WebM, MKV and MOV with ffmpeg.",
        mime_types: &["audio/*", "video/*"],
        extensions: &["mp3", "wav", "ogg", "flac", "m4a", "mp4", "webm", "mkv", "mov", "avi"],
        priority: 0.8,
        changefreq: ChangeFreq::Monthly,
    },
    Tool {
        slug: "remote-docx-to-pdf",
        title: "Word to PDF (high fidelity)",
        description: "Convert Word documents to PDF with full layout through a conversion service you configure.",
        mime_types: DOCX_MIMES,
        extensions: DOCX_EXTENSIONS,
        priority: 0.5,
        changefreq: ChangeFreq::Monthly,
    },
];

/// Look a tool up by slug.
pub fn find(slug: &str) -> Option<&'static Tool> {
    TOOLS.iter().find(|tool| tool.slug == slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filewerk_core::SourceFile;
    use std::collections::HashSet;

    #[test]
    fn slugs_are_unique_and_url_safe() {
        let mut seen = HashSet::new();
        for tool in TOOLS {
            assert!(seen.insert(tool.slug), "duplicate slug {}", tool.slug);
            assert!(
                tool.slug.chars().all(|c| c.is_ascii_lowercase() || c == '-'),
                "{} is not a plain slug",
                tool.slug
            );
            assert!((0.0..=1.0).contains(&tool.priority));
        }
    }

    #[test]
    fn every_tool_accepts_something() {
        for tool in TOOLS {
            assert!(
                !tool.mime_types.is_empty() || !tool.extensions.is_empty(),
                "{} accepts nothing",
                tool.slug
            );
        }
    }

    #[test]
    fn accept_lists_match_the_tool() {
        let merge = find("merge-pdf").expect("merge-pdf");
        let pdf = SourceFile::new("a.pdf", b"%PDF".to_vec(), None);
        let png = SourceFile::new("a.png", b"png".to_vec(), Some("image/png".into()));
        assert!(merge.accept_list().accepts(&pdf));
        assert!(!merge.accept_list().accepts(&png));

        let transcode = find("transcode").expect("transcode");
        let clip = SourceFile::new("clip", b"data".to_vec(), Some("video/quicktime".into()));
        assert!(transcode.accept_list().accepts(&clip));
    }

    #[test]
    fn seo_meta_uses_a_canonical_url() {
        let meta = find("split-pdf").expect("split-pdf").seo("https://files.example.org/");
        assert_eq!(meta.title, "Split PDF | Filewerk");
        assert_eq!(meta.canonical_url, "https://files.example.org/split-pdf");
    }

    #[test]
    fn join_url_normalises_slashes() {
        assert_eq!(join_url("https://a.example", "/"), "https://a.example/");
        assert_eq!(join_url("https://a.example//", "//about"), "https://a.example/about");
        assert_eq!(join_url("https://a.example", "tools/zip"), "https://a.example/tools/zip");
    }

    #[test]
    fn unknown_slug_is_none() {
        assert!(find("print").is_none());
    }
}
