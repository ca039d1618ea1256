// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The ffmpeg subprocess: locating and probing the binary, building argument
// lists, and driving a conversion while reading its progress stream.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use filewerk_core::TransformContext;
use filewerk_core::error::{FilewerkError, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Lines of ffmpeg's log kept for error messages.
const LOG_TAIL_LINES: usize = 12;

/// A located, working ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
    version: String,
}

impl FfmpegEngine {
    /// Find ffmpeg (the configured path, else `PATH`) and check it runs.
    #[instrument]
    pub async fn probe(configured: Option<&Path>) -> Result<Self> {
        let binary = match configured {
            Some(path) => path.to_path_buf(),
            None => find_on_path("ffmpeg").ok_or_else(|| {
                FilewerkError::TranscodeError("ffmpeg was not found on PATH".into())
            })?,
        };

        let output = Command::new(&binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                FilewerkError::TranscodeError(format!("cannot run {}: {}", binary.display(), err))
            })?;

        if !output.status.success() {
            return Err(FilewerkError::TranscodeError(format!(
                "{} -version exited with {}",
                binary.display(),
                output.status
            )));
        }

        let version = parse_version(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            FilewerkError::TranscodeError(format!("{} does not look like ffmpeg", binary.display()))
        })?;

        info!(binary = %binary.display(), %version, "ffmpeg located");
        Ok(Self { binary, version })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run ffmpeg with `args` to completion.
    ///
    /// Progress is reported against `expected_secs`, or else against the
    /// input duration ffmpeg logs less the `skipped_secs` seeked past before
    /// encoding. Cancelling the context kills the child.
    pub async fn run(
        &self,
        args: &[OsString],
        expected_secs: Option<f64>,
        skipped_secs: f64,
        ctx: &TransformContext,
    ) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| FilewerkError::TranscodeError(format!("failed to start ffmpeg: {err}")))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(FilewerkError::TranscodeError("ffmpeg pipes unavailable".into()));
        };
        let mut progress_lines = LossyLines::new(stdout);
        let mut log_lines = LossyLines::new(stderr);

        let mut total_secs = expected_secs;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(LOG_TAIL_LINES);
        let (mut progress_done, mut log_done) = (false, false);

        while !(progress_done && log_done) {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    warn!(job_id = %ctx.job_id, "Cancelling ffmpeg");
                    let _ = child.kill().await;
                    return Err(FilewerkError::Cancelled);
                }
                line = progress_lines.next_line(), if !progress_done => match line? {
                    Some(line) => {
                        if let (Some(done), Some(total)) = (parse_out_time_secs(&line), total_secs) {
                            ctx.progress.report(progress_fraction(done, total));
                        }
                    }
                    None => progress_done = true,
                },
                line = log_lines.next_line(), if !log_done => match line? {
                    Some(line) => {
                        if total_secs.is_none() {
                            total_secs =
                                progress_total(expected_secs, parse_duration_line(&line), skipped_secs);
                        }
                        if tail.len() == LOG_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    None => log_done = true,
                },
            }
        }

        let status = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(FilewerkError::Cancelled);
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            let log: Vec<String> = tail.into_iter().collect();
            return Err(FilewerkError::TranscodeError(format!(
                "ffmpeg exited with {}: {}",
                status,
                log.join(" | ")
            )));
        }

        debug!(job_id = %ctx.job_id, "ffmpeg finished");
        ctx.progress.report(1.0);
        Ok(())
    }
}

/// Line reader for child output in whatever encoding it happens to use.
///
/// Invalid UTF-8 (metadata in a legacy charset, say) is replaced rather than
/// failing the read. Bytes read before a `select!` branch is dropped stay in
/// the buffer and are returned with the rest of their line on the next call.
struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\r', '\n'])
            .to_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// Seconds of output to expect: the known span, else the logged input
/// duration minus whatever was seeked past.
fn progress_total(expected: Option<f64>, logged: Option<f64>, skipped: f64) -> Option<f64> {
    expected.or_else(|| logged.map(|duration| (duration - skipped).max(0.0)))
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        [name.to_string(), format!("{name}.exe")]
            .into_iter()
            .map(|candidate| dir.join(candidate))
            .find(|candidate| candidate.is_file())
    })
}

/// `"ffmpeg version 6.1.1-3ubuntu5 Copyright..."` -> `"6.1.1-3ubuntu5"`.
fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .strip_prefix("ffmpeg version ")?
        .split_whitespace()
        .next()
        .map(str::to_owned)
}

/// Input duration from a log line like `  Duration: 00:01:02.50, start: ...`.
fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.split(',').next()?.trim();
    parse_timestamp(stamp)
}

/// `HH:MM:SS.frac` to seconds. `N/A` and malformed stamps give `None`.
fn parse_timestamp(stamp: &str) -> Option<f64> {
    let mut parts = stamp.splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Encoded position from a `-progress` line. ffmpeg reports it in
/// microseconds under both `out_time_us` and (misleadingly) `out_time_ms`.
fn parse_out_time_secs(line: &str) -> Option<f64> {
    let (key, value) = line.split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => {
            let micros: i64 = value.trim().parse().ok()?;
            Some(micros.max(0) as f64 / 1_000_000.0)
        }
        _ => None,
    }
}

fn progress_fraction(done_secs: f64, total_secs: f64) -> f32 {
    if total_secs <= 0.0 {
        return 0.0;
    }
    (done_secs / total_secs).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_from_banner() {
        let banner = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc";
        assert_eq!(parse_version(banner).as_deref(), Some("6.1.1-3ubuntu5"));
        assert_eq!(parse_version("ImageMagick 7"), None);
    }

    #[test]
    fn duration_from_log_line() {
        let line = "  Duration: 00:01:02.50, start: 0.000000, bitrate: 1411 kb/s";
        assert_eq!(parse_duration_line(line), Some(62.5));
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("Stream #0:0: Audio: pcm_s16le"), None);
    }

    #[test]
    fn out_time_in_either_key_is_microseconds() {
        assert_eq!(parse_out_time_secs("out_time_us=2500000"), Some(2.5));
        assert_eq!(parse_out_time_secs("out_time_ms=1000000"), Some(1.0));
        assert_eq!(parse_out_time_secs("out_time_us=-9223372036854775807"), Some(0.0));
        assert_eq!(parse_out_time_secs("progress=continue"), None);
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(progress_fraction(5.0, 10.0), 0.5);
        assert_eq!(progress_fraction(12.0, 10.0), 1.0);
        assert_eq!(progress_fraction(1.0, 0.0), 0.0);
    }

    #[test]
    fn logged_duration_excludes_the_seeked_start() {
        assert_eq!(progress_total(None, Some(60.0), 15.0), Some(45.0));
        assert_eq!(progress_total(None, Some(60.0), 0.0), Some(60.0));
        assert_eq!(progress_total(Some(10.0), Some(60.0), 15.0), Some(10.0));
        assert_eq!(progress_total(None, Some(5.0), 15.0), Some(0.0));
        assert_eq!(progress_total(None, None, 15.0), None);
    }

    #[tokio::test]
    async fn lines_survive_invalid_utf8() {
        let bytes: &[u8] = b"title=Caf\xe9\r\nout_time_us=1000000\nlast";
        let mut lines = LossyLines::new(bytes);
        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some("title=Caf\u{FFFD}"));
        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some("out_time_us=1000000"));
        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some("last"));
        assert_eq!(lines.next_line().await.expect("read"), None);
    }

    /// A shell script standing in for ffmpeg: answers `-version`, logs a
    /// 4 second input with a Latin-1 title, then reports 1 second encoded
    /// and exits with `status`.
    #[cfg(unix)]
    fn stand_in_ffmpeg(dir: &Path, status: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"-version\" ]; then echo 'ffmpeg version 6.1-test Copyright'; exit 0; fi\n\
             printf '  Duration: 00:00:04.00, start: 0.000000\\n' >&2\n\
             printf '    title           : Caf\\351 del Mar\\n' >&2\n\
             sleep 1\n\
             printf 'out_time_us=1000000\\nprogress=continue\\n'\n\
             exit {status}\n"
        );
        let path = dir.join("ffmpeg");
        std::fs::write(&path, script).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[cfg(unix)]
    fn recording_context() -> (
        TransformContext,
        tokio::sync::mpsc::UnboundedReceiver<filewerk_core::adapter::ProgressUpdate>,
    ) {
        let id = filewerk_core::JobId::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = TransformContext {
            progress: filewerk_core::ProgressReporter::new(id, tx),
            ..TransformContext::detached(id)
        };
        (ctx, rx)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn latin1_log_output_does_not_fail_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = FfmpegEngine::probe(Some(&stand_in_ffmpeg(dir.path(), 0)))
            .await
            .expect("locate ffmpeg");
        assert_eq!(engine.version(), "6.1-test");

        let (ctx, mut progress) = recording_context();
        engine.run(&[], None, 2.0, &ctx).await.expect("run");
        drop(ctx);

        let mut reported = Vec::new();
        while let Some((_, fraction)) = progress.recv().await {
            reported.push(fraction);
        }
        // 1 s encoded of the 2 s left after seeking past the first 2 s.
        assert_eq!(reported, [0.5, 1.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_message_keeps_undecodable_log_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = FfmpegEngine::probe(Some(&stand_in_ffmpeg(dir.path(), 1)))
            .await
            .expect("locate ffmpeg");

        let err = engine
            .run(&[], None, 0.0, &TransformContext::detached(filewerk_core::JobId::new()))
            .await
            .expect_err("non-zero exit");
        let FilewerkError::TranscodeError(message) = err else {
            panic!("expected a transcode error, got {err:?}");
        };
        assert!(message.contains("Caf\u{FFFD} del Mar"));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_probe() {
        let result = FfmpegEngine::probe(Some(Path::new("/nonexistent/ffmpeg"))).await;
        assert!(matches!(result, Err(FilewerkError::TranscodeError(_))));
    }
}
