// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audio/video transcoding through an ffmpeg subprocess.
//
// The input is written into a private temporary directory, ffmpeg converts it
// there, and the output is read back. The ffmpeg binary is located and probed
// once per adapter and shared by every job.

pub mod ffmpeg;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{
    Artifact, FileFormat, JobInput, SharedResource, TimeoutClass, TransformAdapter,
    TransformContext,
};
use tracing::{info, instrument};

pub use ffmpeg::FfmpegEngine;

/// Output containers and the codecs used for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTarget {
    Mp3,
    Wav,
    Ogg,
    Flac,
    M4a,
    Mp4,
    WebM,
    Mkv,
    Mov,
}

impl MediaTarget {
    pub fn format(&self) -> FileFormat {
        match self {
            Self::Mp3 => FileFormat::Mp3,
            Self::Wav => FileFormat::Wav,
            Self::Ogg => FileFormat::Ogg,
            Self::Flac => FileFormat::Flac,
            Self::M4a => FileFormat::M4a,
            Self::Mp4 => FileFormat::Mp4,
            Self::WebM => FileFormat::WebM,
            Self::Mkv => FileFormat::Mkv,
            Self::Mov => FileFormat::Mov,
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Wav | Self::Ogg | Self::Flac | Self::M4a)
    }

    fn codec_args(&self, bitrate_kbps: u32) -> Vec<String> {
        let bitrate = format!("{bitrate_kbps}k");
        let args: Vec<&str> = match self {
            Self::Mp3 => vec!["-vn", "-c:a", "libmp3lame", "-b:a", bitrate.as_str()],
            Self::Wav => vec!["-vn", "-c:a", "pcm_s16le"],
            Self::Ogg => vec!["-vn", "-c:a", "libvorbis", "-b:a", bitrate.as_str()],
            Self::Flac => vec!["-vn", "-c:a", "flac"],
            Self::M4a => vec!["-vn", "-c:a", "aac", "-b:a", bitrate.as_str()],
            Self::Mp4 | Self::Mkv | Self::Mov => vec![
                "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p",
                "-c:a", "aac", "-b:a", bitrate.as_str(),
            ],
            Self::WebM => vec![
                "-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "32", "-row-mt", "1", "-c:a",
                "libopus", "-b:a", bitrate.as_str(),
            ],
        };
        args.into_iter().map(str::to_owned).collect()
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    pub target: MediaTarget,
    /// Audio bitrate for lossy codecs.
    pub audio_bitrate_kbps: u32,
    /// Keep only this span of the input, in seconds.
    pub trim_start: Option<f64>,
    pub trim_end: Option<f64>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            target: MediaTarget::Mp3,
            audio_bitrate_kbps: 192,
            trim_start: None,
            trim_end: None,
        }
    }
}

impl TranscodeOptions {
    /// Length of the trimmed span, when it is known without probing the input.
    fn trimmed_secs(&self) -> Option<f64> {
        self.trim_end.map(|end| end - self.trim_start.unwrap_or(0.0))
    }
}

/// Build the ffmpeg argument list for one conversion.
pub fn build_args(input: &Path, output: &Path, options: &TranscodeOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner", "-nostdin", "-y", "-nostats", "-progress", "pipe:1", "-loglevel", "info",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    if let Some(start) = options.trim_start {
        args.push("-ss".into());
        args.push(format!("{start:.3}").into());
    }
    args.push("-i".into());
    args.push(input.as_os_str().to_owned());
    if let Some(span) = options.trimmed_secs() {
        args.push("-t".into());
        args.push(format!("{span:.3}").into());
    }
    args.extend(options.target.codec_args(options.audio_bitrate_kbps).into_iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

/// Convert audio or video with ffmpeg.
pub struct Transcode {
    ffmpeg_path: Option<PathBuf>,
    engine: SharedResource<FfmpegEngine>,
}

impl Transcode {
    /// `ffmpeg_path` overrides the `PATH` lookup.
    pub fn new(ffmpeg_path: Option<PathBuf>) -> Self {
        Self {
            ffmpeg_path,
            engine: SharedResource::new("ffmpeg"),
        }
    }

    /// The probed engine, initialising it on first use.
    pub async fn engine(&self) -> Result<Arc<FfmpegEngine>> {
        let configured = self.ffmpeg_path.clone();
        self.engine
            .get_or_init(|| async move { FfmpegEngine::probe(configured.as_deref()).await })
            .await
    }
}

#[async_trait]
impl TransformAdapter for Transcode {
    type Options = TranscodeOptions;

    fn name(&self) -> &'static str {
        "transcode"
    }

    fn timeout_class(&self) -> TimeoutClass {
        TimeoutClass::Long
    }

    fn validate(&self, options: &TranscodeOptions) -> Result<()> {
        if !(8..=512).contains(&options.audio_bitrate_kbps) {
            return Err(FilewerkError::Validation(format!(
                "audio bitrate must be 8-512 kbps, got {}",
                options.audio_bitrate_kbps
            )));
        }
        for bound in [options.trim_start, options.trim_end].into_iter().flatten() {
            if !bound.is_finite() || bound < 0.0 {
                return Err(FilewerkError::Validation(format!(
                    "trim times must be zero or more seconds, got {bound}"
                )));
            }
        }
        if let (Some(start), Some(end)) = (options.trim_start, options.trim_end)
            && end <= start
        {
            return Err(FilewerkError::Validation(format!(
                "trim end ({end}s) must come after trim start ({start}s)"
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, target = ?options.target))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &TranscodeOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?;
        let engine = self.engine().await?;
        ctx.check_cancelled()?;

        let workdir = tempfile::tempdir()?;
        let input_ext = file.format().map_or("bin", |format| format.extension());
        let input_path = workdir.path().join(format!("input.{input_ext}"));
        let output_format = options.target.format();
        let output_path = workdir.path().join(format!("output.{}", output_format.extension()));

        tokio::fs::write(&input_path, file.bytes()).await?;

        let args = build_args(&input_path, &output_path, options);
        engine
            .run(&args, options.trimmed_secs(), options.trim_start.unwrap_or(0.0), ctx)
            .await?;

        let bytes = tokio::fs::read(&output_path).await?;
        info!(in_bytes = file.size(), out_bytes = bytes.len(), "Transcode complete");

        Ok(vec![Artifact::new(
            format!("{}.{}", file.stem(), output_format.extension()),
            bytes,
            output_format,
        )])
    }
}
