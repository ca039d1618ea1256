// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File intake: decide which user files a tool accepts and turn them into
// pending jobs.
//
// Every file gets a verdict. Accepted files become one job each, in the order
// given; rejected files are reported with a reason and never become jobs.

use std::path::Path;

use filewerk_core::{BatchState, FileFormat, FilewerkError, Job, JobId, SourceFile};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// MIME types and extensions a tool accepts.
///
/// MIME patterns may end in `/*` (`image/*`) or be `*/*`. A file is accepted
/// when either its declared MIME type or its extension matches. A list holding
/// `*/*` accepts every file, including ones with no declared type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptList {
    mime_types: Vec<String>,
    extensions: Vec<String>,
}

impl AcceptList {
    pub fn new<M, E>(mime_types: M, extensions: E) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            mime_types: mime_types
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            extensions: extensions
                .into_iter()
                .map(|e| normalise_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Accept anything.
    pub fn any() -> Self {
        Self::new(["*/*"], std::iter::empty::<&str>())
    }

    /// Accept exactly these formats, by MIME type and by extension.
    pub fn formats(formats: &[FileFormat]) -> Self {
        let mut extensions: Vec<&str> = formats.iter().map(|f| f.extension()).collect();
        // JPEG and TIFF files commonly carry either extension.
        if formats.contains(&FileFormat::Jpeg) {
            extensions.push("jpeg");
        }
        if formats.contains(&FileFormat::Tiff) {
            extensions.push("tif");
        }
        Self::new(formats.iter().map(|f| f.mime_type()), extensions)
    }

    pub fn mime_types(&self) -> &[String] {
        &self.mime_types
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `file` matches by declared MIME type or by extension.
    pub fn accepts(&self, file: &SourceFile) -> bool {
        if self.accepts_everything() {
            return true;
        }
        let by_mime = file
            .declared_type()
            .is_some_and(|declared| self.accepts_mime(declared));
        let by_extension = Path::new(file.name())
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.accepts_extension(ext));
        by_mime || by_extension
    }

    pub fn accepts_everything(&self) -> bool {
        self.mime_types.iter().any(|pattern| pattern == "*/*")
    }

    pub fn accepts_mime(&self, mime: &str) -> bool {
        // Drop parameters: "text/plain; charset=utf-8".
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if essence.is_empty() {
            return false;
        }
        self.mime_types.iter().any(|pattern| mime_matches(pattern, &essence))
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = normalise_extension(ext);
        self.extensions.iter().any(|accepted| *accepted == ext)
    }

    /// Human-readable summary for rejection messages: `PDF, .pdf`.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self.mime_types.clone();
        parts.extend(self.extensions.iter().map(|e| format!(".{e}")));
        if parts.is_empty() {
            "nothing".into()
        } else {
            parts.join(", ")
        }
    }
}

fn normalise_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn mime_matches(pattern: &str, mime: &str) -> bool {
    if pattern == "*/*" {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(top_level) => mime
            .split_once('/')
            .is_some_and(|(top, _)| top == top_level),
        None => pattern == mime,
    }
}

/// A file that did not become a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub name: String,
    pub reason: String,
}

impl Rejection {
    /// The rejection as an `InputRejected` error, for humanised reporting.
    pub fn to_error(&self) -> FilewerkError {
        FilewerkError::InputRejected {
            name: self.name.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Outcome of one intake call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    /// New job ids, in input order.
    pub accepted: Vec<JobId>,
    pub rejected: Vec<Rejection>,
}

impl IntakeReport {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Gatekeeper between user files and the batch.
#[derive(Debug, Clone)]
pub struct FileIntake {
    accept: AcceptList,
    max_file_bytes: Option<u64>,
}

impl FileIntake {
    pub fn new(accept: AcceptList) -> Self {
        Self {
            accept,
            max_file_bytes: None,
        }
    }

    /// Reject files larger than `bytes`.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_bytes = Some(bytes);
        self
    }

    pub fn accept_list(&self) -> &AcceptList {
        &self.accept
    }

    fn verdict(&self, file: &SourceFile) -> Result<(), String> {
        if file.size() == 0 {
            return Err("file is empty".into());
        }
        if let Some(limit) = self.max_file_bytes
            && file.size() > limit
        {
            return Err(format!("file is {} bytes; the limit is {limit}", file.size()));
        }
        if !self.accept.accepts(file) {
            let declared = file.declared_type().unwrap_or("unknown type");
            return Err(format!(
                "{declared} is not accepted here (expected {})",
                self.accept.describe()
            ));
        }
        Ok(())
    }

    /// Append one pending job per accepted file, in the order given.
    ///
    /// Duplicate names are allowed; each file becomes its own job.
    #[instrument(skip_all, fields(existing = state.len()))]
    pub fn add_files<O>(
        &self,
        state: &mut BatchState<O>,
        files: impl IntoIterator<Item = SourceFile>,
    ) -> IntakeReport {
        let mut report = IntakeReport::default();

        for file in files {
            match self.verdict(&file) {
                Ok(()) => {
                    debug!(name = file.name(), bytes = file.size(), "File accepted");
                    report.accepted.push(state.push(Job::for_file(file)));
                }
                Err(reason) => {
                    warn!(name = file.name(), %reason, "File rejected");
                    report.rejected.push(Rejection {
                        name: file.name().to_string(),
                        reason,
                    });
                }
            }
        }

        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "Intake complete"
        );
        report
    }

    /// Read `paths` from disk and add them. Unreadable paths are rejections.
    pub fn add_paths<O, P>(
        &self,
        state: &mut BatchState<O>,
        paths: impl IntoIterator<Item = P>,
    ) -> IntakeReport
    where
        P: AsRef<Path>,
    {
        let mut unreadable = Vec::new();
        let files: Vec<SourceFile> = paths
            .into_iter()
            .filter_map(|path| {
                let path = path.as_ref();
                SourceFile::read(path)
                    .map_err(|err| {
                        unreadable.push(Rejection {
                            name: path.display().to_string(),
                            reason: format!("cannot read file: {err}"),
                        })
                    })
                    .ok()
            })
            .collect();

        let mut report = self.add_files(state, files);
        report.rejected.extend(unreadable);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filewerk_core::JobStatus;

    fn file(name: &str, declared: Option<&str>) -> SourceFile {
        SourceFile::new(name, b"payload".to_vec(), declared.map(str::to_owned))
    }

    #[test]
    fn wildcard_mime_matches_subtypes() {
        let accept = AcceptList::new(["image/*"], std::iter::empty::<&str>());
        assert!(accept.accepts_mime("image/png"));
        assert!(accept.accepts_mime("IMAGE/WebP"));
        assert!(!accept.accepts_mime("application/pdf"));
        assert!(!accept.accepts_mime("imagex/png"));
    }

    #[test]
    fn either_mime_or_extension_is_enough() {
        let accept = AcceptList::new(["application/pdf"], [".pdf"]);
        assert!(accept.accepts(&file("a.pdf", None)));
        assert!(accept.accepts(&file("scan", Some("application/pdf"))));
        assert!(accept.accepts(&file("a.PDF", Some("application/octet-stream"))));
        assert!(accept.accepts(&file("a.bin", Some("application/pdf; version=1.7"))));
        assert!(!accept.accepts(&file("a.docx", Some("application/msword"))));
    }

    #[test]
    fn formats_accept_both_jpeg_extensions() {
        let accept = AcceptList::formats(&[FileFormat::Png, FileFormat::Jpeg]);
        assert!(accept.accepts_extension("jpeg"));
        assert!(accept.accepts_extension(".JPG"));
        assert!(accept.accepts_mime("image/png"));
        assert!(!accept.accepts_mime("image/gif"));
    }

    #[test]
    fn mixed_selection_adds_only_accepted_files() {
        let intake = FileIntake::new(AcceptList::new(["image/*"], ["png", "jpg"]));
        let mut state = BatchState::new(());

        let report = intake.add_files(
            &mut state,
            vec![
                file("one.png", Some("image/png")),
                file("notes.txt", Some("text/plain")),
                file("two.jpg", None),
                file("one.png", Some("image/png")),
            ],
        );

        assert_eq!(report.accepted.len(), 3);
        assert_eq!(state.len(), 3);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].name, "notes.txt");
        assert!(report.rejected[0].reason.contains("text/plain"));

        let names: Vec<String> = state.jobs().iter().map(|j| j.input.display_name()).collect();
        assert_eq!(names, ["one.png", "two.jpg", "one.png"]);
        assert!(state.jobs().iter().all(|j| j.status() == JobStatus::Pending));
    }

    #[test]
    fn bytes_are_not_altered() {
        let intake = FileIntake::new(AcceptList::any());
        let mut state = BatchState::new(());
        let original = file("data.bin", None);
        let digest = original.digest().to_string();

        let report = intake.add_files(&mut state, [original]);
        let job = state.get(report.accepted[0]).expect("job");
        let stored = job.input.file().expect("single file");
        assert_eq!(stored.digest(), digest);
        assert_eq!(stored.bytes(), b"payload");
    }

    #[test]
    fn empty_and_oversized_files_are_rejected() {
        let intake =
            FileIntake::new(AcceptList::formats(&[FileFormat::PlainText])).with_max_file_size(4);
        let mut state = BatchState::new(());
        let report = intake.add_files(
            &mut state,
            [
                SourceFile::new("empty.txt", Vec::new(), Some("text/plain".into())),
                file("big.txt", Some("text/plain")),
                SourceFile::new("small.txt", b"ok".to_vec(), Some("text/plain".into())),
            ],
        );
        assert_eq!(state.len(), 1);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].reason, "file is empty");
        assert_eq!(report.rejected[1].name, "big.txt");
        assert_eq!(report.rejected[1].reason, "file is 7 bytes; the limit is 4");
    }

    #[test]
    fn catch_all_list_accepts_files_without_a_type() {
        let accept = AcceptList::any();
        assert!(accept.accepts(&file("data.bin", None)));
        assert!(accept.accepts(&file("README", None)));
        assert!(accept.accepts(&file("x.weird", Some("application/x-custom"))));

        let narrow = AcceptList::new(["image/*"], std::iter::empty::<&str>());
        assert!(!narrow.accepts_everything());
        assert!(!narrow.accepts(&file("data.bin", None)));
    }

    #[test]
    fn rejections_become_input_rejected_errors() {
        let rejection = Rejection {
            name: "notes.txt".into(),
            reason: "text/plain is not accepted here".into(),
        };
        let err = rejection.to_error();
        assert_eq!(err.kind(), filewerk_core::ErrorKind::InputRejected);
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn unreadable_paths_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = dir.path().join("a.pdf");
        std::fs::write(&present, b"%PDF-1.4").expect("write");
        let missing = dir.path().join("missing.pdf");

        let intake = FileIntake::new(AcceptList::formats(&[FileFormat::Pdf]));
        let mut state = BatchState::new(());
        let report = intake.add_paths(&mut state, [&present, &missing]);

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].reason.starts_with("cannot read file"));
        let job = state.get(report.accepted[0]).expect("job");
        assert_eq!(job.input.file().expect("file").declared_type(), Some("application/pdf"));
    }
}
