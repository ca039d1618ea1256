// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line definitions.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use filewerk_core::{AppConfig, FailurePolicy};
use filewerk_document::{ImageTarget, MediaTarget, PageSize};

#[derive(Parser, Debug)]
#[command(
    name = "filewerk",
    version,
    about = "Filewerk - batch file conversion on your own machine",
    long_about = "Filewerk converts images, PDFs, archives, Word documents, and audio/video in batches.\n\n\
    Every file in a batch is converted on its own: one broken file is reported and the rest carry on.\n\
    Results are written to the output directory without overwriting anything already there.",
    after_help = "Examples:\n  \
    filewerk image-convert --to webp photos/*.jpg\n  \
    filewerk merge-pdf intro.pdf body.pdf appendix.pdf -o out\n  \
    filewerk split-pdf --ranges 1-3,4-9 report.pdf\n  \
    filewerk transcode --to mp3 -j 2 talk.mp4 interview.mov\n  \
    filewerk sitemap --base-url https://files.example.org > sitemap.xml"
)]
pub struct Cli {
    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, env = "FILEWERK_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the available tools
    Tools {
        /// Print the registry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a sitemaps.org XML document for the tool pages
    Sitemap {
        /// Public base URL; defaults to `site_base_url` from the config
        #[arg(long, env = "FILEWERK_SITE_BASE_URL", value_name = "URL")]
        base_url: Option<String>,
        /// Extra page to list besides the home page and tools (repeatable)
        #[arg(long = "route", value_name = "PATH")]
        routes: Vec<String>,
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show or initialise the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Convert images to another format
    ImageConvert {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, value_enum, default_value_t = ImageFormatArg::Png)]
        to: ImageFormatArg,
        /// JPEG quality 1-100; defaults to `jpeg_quality` from the config
        #[arg(long)]
        quality: Option<u8>,
        #[arg(long, value_name = "PX")]
        max_width: Option<u32>,
        #[arg(long, value_name = "PX")]
        max_height: Option<u32>,
        #[arg(long)]
        grayscale: bool,
    },
    /// Make a plain image background transparent
    RemoveBackground {
        #[command(flatten)]
        batch: BatchArgs,
        /// Colour distance still counted as background
        #[arg(long, default_value_t = 40)]
        tolerance: u8,
        /// Edge softening; 0 for a hard edge
        #[arg(long, default_value_t = 1.0)]
        feather: f32,
    },
    /// Combine images into one PDF, one page per image
    ImagesToPdf {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, value_enum, default_value_t = PageSizeArg::A4)]
        page_size: PageSizeArg,
        /// Size each page to its image instead of fitting it on the page
        #[arg(long)]
        match_image: bool,
        #[arg(long, default_value = "images.pdf")]
        output_name: String,
    },
    /// Join PDFs into one, in the order given
    MergePdf {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, default_value = "merged.pdf")]
        output_name: String,
    },
    /// Split PDFs into pages or page ranges
    #[command(long_about = "Split each PDF into single pages (the default), into the comma-separated \
        ranges given with --ranges, or extract the selected pages into one PDF with --extract.\n\n\
        Examples:\n  \
        filewerk split-pdf report.pdf\n  \
        filewerk split-pdf --ranges 1-3,4,5-9 report.pdf\n  \
        filewerk split-pdf --extract 1,3,5-7 report.pdf")]
    SplitPdf {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, value_name = "RANGES", conflicts_with = "extract")]
        ranges: Option<String>,
        #[arg(long, value_name = "PAGES")]
        extract: Option<String>,
    },
    /// Rotate PDF pages
    RotatePdf {
        #[command(flatten)]
        batch: BatchArgs,
        /// Clockwise, a multiple of 90
        #[arg(long, default_value_t = 90, allow_negative_numbers = true)]
        degrees: i32,
        /// Pages to rotate, e.g. "1,3-4"; all pages if omitted
        #[arg(long)]
        pages: Option<String>,
    },
    /// Typeset plain text files as PDF
    TextToPdf {
        #[command(flatten)]
        batch: BatchArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Convert the text of Word documents to PDF, locally
    DocxToPdf {
        #[command(flatten)]
        batch: BatchArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Pack files into one ZIP archive
    Zip {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, default_value = "archive.zip")]
        output_name: String,
        /// Deflate level 1-9; 0 stores files uncompressed
        #[arg(long, default_value_t = 6)]
        level: u8,
    },
    /// Extract ZIP archives
    Unzip {
        #[command(flatten)]
        batch: BatchArgs,
        /// Prefix each extracted file with its archive's name
        #[arg(long)]
        prefix_archive_name: bool,
    },
    /// Convert audio and video with ffmpeg
    Transcode {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, value_enum)]
        to: MediaFormatArg,
        /// Audio bitrate for lossy codecs
        #[arg(long, default_value_t = 192, value_name = "KBPS")]
        bitrate: u32,
        /// Start of the span to keep, in seconds
        #[arg(long, value_name = "SECS")]
        trim_start: Option<f64>,
        /// End of the span to keep, in seconds
        #[arg(long, value_name = "SECS")]
        trim_end: Option<f64>,
        /// ffmpeg binary; defaults to `ffmpeg_path` from the config, then PATH
        #[arg(long, env = "FILEWERK_FFMPEG", value_name = "PATH")]
        ffmpeg: Option<PathBuf>,
    },
    /// Convert Word documents to PDF through a remote conversion service
    RemoteDocxToPdf {
        #[command(flatten)]
        batch: BatchArgs,
        /// Service URL; defaults to `remote_endpoint` from the config
        #[arg(long, env = "FILEWERK_REMOTE_ENDPOINT", value_name = "URL")]
        endpoint: Option<String>,
    },
}

impl Commands {
    /// The registry slug of a tool command.
    pub fn tool_slug(&self) -> Option<&'static str> {
        let slug = match self {
            Self::Tools { .. } | Self::Sitemap { .. } | Self::Config { .. } => return None,
            Self::ImageConvert { .. } => "image-convert",
            Self::RemoveBackground { .. } => "remove-background",
            Self::ImagesToPdf { .. } => "images-to-pdf",
            Self::MergePdf { .. } => "merge-pdf",
            Self::SplitPdf { .. } => "split-pdf",
            Self::RotatePdf { .. } => "rotate-pdf",
            Self::TextToPdf { .. } => "text-to-pdf",
            Self::DocxToPdf { .. } => "docx-to-pdf",
            Self::Zip { .. } => "zip",
            Self::Unzip { .. } => "unzip",
            Self::Transcode { .. } => "transcode",
            Self::RemoteDocxToPdf { .. } => "remote-docx-to-pdf",
        };
        Some(slug)
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
    /// Print where the configuration file is
    Path,
    /// Write the default configuration
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments shared by every tool.
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Input files, in the order they should be processed
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Where to write results
    #[arg(short, long, env = "FILEWERK_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Files converted at once
    #[arg(short = 'j', long, env = "FILEWERK_CONCURRENCY", value_name = "N")]
    pub concurrency: Option<usize>,

    /// Stop starting new files after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Minimum gap between saved results
    #[arg(long, value_name = "MS")]
    pub delivery_interval_ms: Option<u64>,

    /// Skip input files larger than this many bytes
    #[arg(long, env = "FILEWERK_MAX_FILE_SIZE", value_name = "BYTES")]
    pub max_file_size: Option<u64>,
}

impl BatchArgs {
    /// Overlay these flags on the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.max(1);
        }
        if self.fail_fast {
            config.failure_policy = FailurePolicy::FailFast;
        }
        if let Some(interval) = self.delivery_interval_ms {
            config.delivery_interval_ms = interval;
        }
        if let Some(limit) = self.max_file_size {
            config.max_file_bytes = Some(limit);
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    #[arg(long, value_enum, default_value_t = PageSizeArg::A4)]
    pub page_size: PageSizeArg,
    #[arg(long, default_value_t = 11.0, value_name = "PT")]
    pub font_size: f32,
}

// -- Value enums --------------------------------------------------------------

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
    Webp,
    Gif,
    Bmp,
    #[value(alias = "tif")]
    Tiff,
    Ico,
}

impl ImageFormatArg {
    pub fn target(self, jpeg_quality: u8) -> ImageTarget {
        match self {
            Self::Png => ImageTarget::Png,
            Self::Jpeg => ImageTarget::Jpeg {
                quality: jpeg_quality,
            },
            Self::Webp => ImageTarget::WebP,
            Self::Gif => ImageTarget::Gif,
            Self::Bmp => ImageTarget::Bmp,
            Self::Tiff => ImageTarget::Tiff,
            Self::Ico => ImageTarget::Ico,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSizeArg {
    A4,
    Letter,
    Legal,
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Legal => PageSize::Legal,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormatArg {
    Mp3,
    Wav,
    Ogg,
    Flac,
    M4a,
    Mp4,
    Webm,
    Mkv,
    Mov,
}

impl From<MediaFormatArg> for MediaTarget {
    fn from(arg: MediaFormatArg) -> Self {
        match arg {
            MediaFormatArg::Mp3 => MediaTarget::Mp3,
            MediaFormatArg::Wav => MediaTarget::Wav,
            MediaFormatArg::Ogg => MediaTarget::Ogg,
            MediaFormatArg::Flac => MediaTarget::Flac,
            MediaFormatArg::M4a => MediaTarget::M4a,
            MediaFormatArg::Mp4 => MediaTarget::Mp4,
            MediaFormatArg::Webm => MediaTarget::WebM,
            MediaFormatArg::Mkv => MediaTarget::Mkv,
            MediaFormatArg::Mov => MediaTarget::Mov,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_tool_command_is_in_the_registry() {
        let tool_commands: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|cmd| cmd.get_name().to_string())
            .filter(|name| !matches!(name.as_str(), "tools" | "sitemap" | "config" | "help"))
            .collect();
        assert_eq!(tool_commands.len(), catalog::TOOLS.len());
        for name in tool_commands {
            assert!(catalog::find(&name).is_some(), "{name} is not registered");
        }
    }

    #[test]
    fn batch_flags_override_config() {
        let cli = parse(&[
            "filewerk", "merge-pdf", "-o", "out", "-j", "4", "--fail-fast", "b.pdf", "a.pdf",
        ]);
        assert_eq!(cli.command.tool_slug(), Some("merge-pdf"));
        let Commands::MergePdf { batch, output_name } = cli.command else {
            panic!("expected merge-pdf");
        };
        assert_eq!(batch.files, [PathBuf::from("b.pdf"), PathBuf::from("a.pdf")]);
        assert_eq!(output_name, "merged.pdf");

        let mut config = AppConfig::default();
        batch.apply(&mut config);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.delivery_interval_ms, 100);
    }

    #[test]
    fn tools_need_at_least_one_file() {
        assert!(Cli::try_parse_from(["filewerk", "zip"]).is_err());
    }

    #[test]
    fn split_modes_are_exclusive() {
        assert!(
            Cli::try_parse_from(["filewerk", "split-pdf", "--ranges", "1-2", "--extract", "3", "a.pdf"])
                .is_err()
        );
    }

    #[test]
    fn negative_rotation_parses() {
        let cli = parse(&["filewerk", "rotate-pdf", "--degrees", "-90", "a.pdf"]);
        let Commands::RotatePdf { degrees, pages, .. } = cli.command else {
            panic!("expected rotate-pdf");
        };
        assert_eq!(degrees, -90);
        assert!(pages.is_none());
    }

    #[test]
    fn image_format_aliases() {
        let cli = parse(&["filewerk", "image-convert", "--to", "jpg", "a.png"]);
        let Commands::ImageConvert { to, .. } = cli.command else {
            panic!("expected image-convert");
        };
        assert_eq!(to.target(75), ImageTarget::Jpeg { quality: 75 });
    }
}
