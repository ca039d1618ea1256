// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: files, jobs, and the per-session batch state.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FilewerkError, JobError, Result};
use crate::integrity::hash_bytes;

/// Unique identifier for a job, assigned at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File formats Filewerk knows how to name, accept, and produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    Pdf,
    Png,
    Jpeg,
    WebP,
    Gif,
    Bmp,
    Tiff,
    Ico,
    PlainText,
    Docx,
    Zip,
    Mp3,
    Wav,
    Ogg,
    Flac,
    M4a,
    Mp4,
    WebM,
    Mkv,
    Mov,
    Avi,
}

impl FileFormat {
    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Ico => "image/x-icon",
            Self::PlainText => "text/plain",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Zip => "application/zip",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
            Self::Mp4 => "video/mp4",
            Self::WebM => "video/webm",
            Self::Mkv => "video/x-matroska",
            Self::Mov => "video/quicktime",
            Self::Avi => "video/x-msvideo",
        }
    }

    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Ico => "ico",
            Self::PlainText => "txt",
            Self::Docx => "docx",
            Self::Zip => "zip",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::M4a => "m4a",
            Self::Mp4 => "mp4",
            Self::WebM => "webm",
            Self::Mkv => "mkv",
            Self::Mov => "mov",
            Self::Avi => "avi",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jfif" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "ico" => Some(Self::Ico),
            "txt" | "text" => Some(Self::PlainText),
            "docx" => Some(Self::Docx),
            "zip" => Some(Self::Zip),
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "ogg" | "oga" => Some(Self::Ogg),
            "flac" => Some(Self::Flac),
            "m4a" | "aac" => Some(Self::M4a),
            "mp4" | "m4v" => Some(Self::Mp4),
            "webm" => Some(Self::WebM),
            "mkv" => Some(Self::Mkv),
            "mov" => Some(Self::Mov),
            "avi" => Some(Self::Avi),
            _ => None,
        }
    }

    /// Infer the format from a MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        [
            Self::Pdf,
            Self::Png,
            Self::Jpeg,
            Self::WebP,
            Self::Gif,
            Self::Bmp,
            Self::Tiff,
            Self::Ico,
            Self::PlainText,
            Self::Docx,
            Self::Zip,
            Self::Mp3,
            Self::Wav,
            Self::Ogg,
            Self::Flac,
            Self::M4a,
            Self::Mp4,
            Self::WebM,
            Self::Mkv,
            Self::Mov,
            Self::Avi,
        ]
        .into_iter()
        .find(|format| format.mime_type().eq_ignore_ascii_case(essence))
    }

    /// Infer the format from a file name's extension.
    pub fn from_filename(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// A user-selected input file. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    name: String,
    #[serde(skip_serializing)]
    bytes: Arc<[u8]>,
    declared_type: Option<String>,
    /// SHA-256 of `bytes`, fixed at construction.
    digest: String,
}

impl SourceFile {
    /// Wrap in-memory bytes. `declared_type` is the MIME type reported by
    /// whatever produced the file, if any.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, declared_type: Option<String>) -> Self {
        let digest = hash_bytes(&bytes);
        Self {
            name: name.into(),
            bytes: Arc::from(bytes),
            declared_type,
            digest,
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FilewerkError::UnsupportedInput(format!("{} has no file name", path.display()))
            })?;
        let declared_type = FileFormat::from_filename(&name).map(|f| f.mime_type().to_string());
        Ok(Self::new(name, bytes, declared_type))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap shared handle to the payload, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Best-effort format: extension first, then the declared MIME type.
    pub fn format(&self) -> Option<FileFormat> {
        FileFormat::from_filename(&self.name)
            .or_else(|| self.declared_type().and_then(FileFormat::from_mime))
    }
}

/// One output payload produced by a transform adapter.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Suggested output file name.
    pub filename: String,
    #[serde(skip_serializing)]
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>, format: FileFormat) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            media_type: format.mime_type().to_string(),
        }
    }

    /// For payloads whose type is not one of the known formats.
    pub fn with_media_type(
        filename: impl Into<String>,
        bytes: Vec<u8>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            media_type: media_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// `name` with ` (n)` inserted before the extension: `photo (2).jpg`.
///
/// `n == 0` returns the name unchanged. Used wherever outputs must not
/// overwrite each other.
pub fn numbered_filename(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

/// What a job operates on.
#[derive(Debug, Clone, Serialize)]
pub enum JobInput {
    /// A single user file (per-file tools).
    File(SourceFile),
    /// An ordered list of files combined into one output (merge, pack).
    Bundle(Vec<SourceFile>),
}

impl JobInput {
    /// The single file of a per-file job.
    pub fn file(&self) -> Result<&SourceFile> {
        match self {
            Self::File(file) => Ok(file),
            Self::Bundle(files) => Err(FilewerkError::Validation(format!(
                "expected a single file, got a bundle of {}",
                files.len()
            ))),
        }
    }

    /// All files of the job, in order.
    pub fn files(&self) -> &[SourceFile] {
        match self {
            Self::File(file) => std::slice::from_ref(file),
            Self::Bundle(files) => files,
        }
    }

    /// Display name: the file name, or a summary for bundles.
    pub fn display_name(&self) -> String {
        match self {
            Self::File(file) => file.name().to_string(),
            Self::Bundle(files) => format!("{} files", files.len()),
        }
    }
}

/// Lifecycle states of a job. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

/// One input moving through the pipeline.
///
/// `result` is set only in `Succeeded` and `error` only in `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub input: JobInput,
    status: JobStatus,
    /// Sub-job progress (0.0..=1.0) reported by the adapter while running.
    progress: Option<f32>,
    result: Option<Vec<Artifact>>,
    error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            input,
            status: JobStatus::Pending,
            progress: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_file(file: SourceFile) -> Self {
        Self::new(JobInput::File(file))
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> Option<f32> {
        self.progress
    }

    pub fn result(&self) -> Option<&[Artifact]> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    /// Pending -> Running.
    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::Running)?;
        self.progress = Some(0.0);
        Ok(())
    }

    /// Running -> Succeeded, attaching the produced artifacts.
    pub fn succeed(&mut self, artifacts: Vec<Artifact>) -> Result<()> {
        self.transition(JobStatus::Succeeded)?;
        self.progress = None;
        self.result = Some(artifacts);
        Ok(())
    }

    /// Running -> Failed, attaching the structured error.
    pub fn fail(&mut self, error: JobError) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.progress = None;
        self.error = Some(error);
        Ok(())
    }

    /// Record adapter progress. Ignored unless running; never moves backwards.
    pub fn report_progress(&mut self, fraction: f32) {
        if self.status != JobStatus::Running || !fraction.is_finite() {
            return;
        }
        let clamped = fraction.clamp(0.0, 1.0);
        let current = self.progress.unwrap_or(0.0);
        self.progress = Some(current.max(clamped));
    }

    fn transition(&mut self, to: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(FilewerkError::InvalidTransition {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// All jobs plus the tool options for one session on one tool.
///
/// Job order is the user's upload order unless reordered with
/// [`BatchState::move_job`]; for combining tools it is the output order.
#[derive(Debug, Clone)]
pub struct BatchState<O> {
    jobs: Vec<Job>,
    options: O,
}

impl<O> BatchState<O> {
    pub fn new(options: O) -> Self {
        Self {
            jobs: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &O {
        &self.options
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// The options and the jobs, borrowed separately so jobs can be updated
    /// while adapters still hold the options.
    pub fn split_mut(&mut self) -> (&O, &mut [Job]) {
        (&self.options, &mut self.jobs)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    /// Append a job, returning its id.
    pub fn push(&mut self, job: Job) -> JobId {
        let id = job.id;
        self.jobs.push(job);
        id
    }

    /// Ids of pending jobs, in list order.
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|job| job.status() == JobStatus::Pending)
            .map(|job| job.id)
            .collect()
    }

    /// Remove a job. Only pending jobs can be removed.
    pub fn remove(&mut self, id: JobId) -> Result<Job> {
        let index = self.index_of(id)?;
        let status = self.jobs[index].status();
        if status != JobStatus::Pending {
            return Err(FilewerkError::Validation(format!(
                "job {id} is {status:?} and cannot be removed"
            )));
        }
        Ok(self.jobs.remove(index))
    }

    /// Move a pending job to `to_index` (clamped to the list bounds).
    pub fn move_job(&mut self, id: JobId, to_index: usize) -> Result<()> {
        let from = self.index_of(id)?;
        if self.jobs[from].status() != JobStatus::Pending {
            return Err(FilewerkError::Validation(format!(
                "job {id} has already started and cannot be reordered"
            )));
        }
        let job = self.jobs.remove(from);
        let to = to_index.min(self.jobs.len());
        self.jobs.insert(to, job);
        Ok(())
    }

    /// Collapse every job, in order, into a single bundled job.
    ///
    /// All jobs must still be pending. Used by tools that combine many inputs
    /// into one output.
    pub fn bundle(&mut self) -> Result<JobId> {
        if self.jobs.is_empty() {
            return Err(FilewerkError::Validation("no files to combine".into()));
        }
        if let Some(started) = self.jobs.iter().find(|j| j.status() != JobStatus::Pending) {
            return Err(FilewerkError::Validation(format!(
                "job {} has already started; cannot bundle",
                started.id
            )));
        }

        let files: Vec<SourceFile> = self
            .jobs
            .drain(..)
            .flat_map(|job| match job.input {
                JobInput::File(file) => vec![file],
                JobInput::Bundle(files) => files,
            })
            .collect();

        Ok(self.push(Job::new(JobInput::Bundle(files))))
    }

    /// Start over: drop every job, keep the options.
    pub fn reset(&mut self) {
        self.jobs.clear();
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in &self.jobs {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Succeeded => counts.succeeded += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Overall progress in 0.0..=1.0: terminal jobs count fully, running jobs
    /// by their reported sub-progress.
    pub fn progress(&self) -> f32 {
        if self.jobs.is_empty() {
            return 0.0;
        }
        let done: f32 = self
            .jobs
            .iter()
            .map(|job| match job.status() {
                JobStatus::Succeeded | JobStatus::Failed => 1.0,
                JobStatus::Running => job.progress().unwrap_or(0.0),
                JobStatus::Pending => 0.0,
            })
            .sum();
        done / self.jobs.len() as f32
    }

    fn index_of(&self, id: JobId) -> Result<usize> {
        self.jobs
            .iter()
            .position(|job| job.id == id)
            .ok_or(FilewerkError::JobNotFound(id))
    }
}
