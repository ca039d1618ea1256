// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZIP archive tools: pack many files into one archive, unpack an archive into
// its files. Archive handling is delegated to the `zip` crate.

use std::collections::HashSet;
use std::io::{Cursor, Read, Write};

use async_trait::async_trait;
use filewerk_core::adapter::run_blocking;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{
    AdapterMode, Artifact, FileFormat, JobInput, TransformAdapter, TransformContext,
    numbered_filename,
};
use tracing::{debug, info, instrument, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Refuse to inflate more than this from one archive.
const MAX_UNPACKED_BYTES: u64 = 2 * 1024 * 1024 * 1024;

fn archive_error(context: &str, err: ZipError) -> FilewerkError {
    FilewerkError::ArchiveError(format!("{context}: {err}"))
}

/// Pick `name`, or the first free `name (n)` variant.
fn claim_unique(name: &str, taken: &mut HashSet<String>) -> String {
    let mut n = 0;
    loop {
        let candidate = numbered_filename(name, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

// -- Pack -------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ZipPackOptions {
    pub output_name: String,
    /// Deflate level 1-9; 0 stores entries uncompressed.
    pub level: u8,
}

impl Default for ZipPackOptions {
    fn default() -> Self {
        Self {
            output_name: "archive.zip".into(),
            level: 6,
        }
    }
}

/// Pack every input, in list order, into one ZIP archive.
pub struct ZipPack;

#[async_trait]
impl TransformAdapter for ZipPack {
    type Options = ZipPackOptions;

    fn name(&self) -> &'static str {
        "zip"
    }

    fn mode(&self) -> AdapterMode {
        AdapterMode::Combine
    }

    fn validate(&self, options: &ZipPackOptions) -> Result<()> {
        if options.level > 9 {
            return Err(FilewerkError::Validation(format!(
                "compression level must be 0-9, got {}",
                options.level
            )));
        }
        if options.output_name.trim().is_empty() {
            return Err(FilewerkError::Validation("output name must not be empty".into()));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, files = input.files().len()))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &ZipPackOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let files = input.files().to_vec();
        let options = options.clone();
        let ctx = ctx.clone();

        run_blocking(move || {
            let entry_options = if options.level == 0 {
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
            } else {
                SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Deflated)
                    .compression_level(Some(options.level as i64))
            };

            let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
            let mut taken = HashSet::new();

            for (index, file) in files.iter().enumerate() {
                ctx.check_cancelled()?;
                let entry_name = claim_unique(file.name(), &mut taken);
                writer
                    .start_file(entry_name.as_str(), entry_options)
                    .map_err(|err| archive_error(&entry_name, err))?;
                writer.write_all(file.bytes())?;
                debug!(entry = %entry_name, bytes = file.size(), "Entry added");
                ctx.progress.report((index + 1) as f32 / files.len() as f32);
            }

            let bytes = writer
                .finish()
                .map_err(|err| archive_error("finishing archive", err))?
                .into_inner();

            info!(entries = files.len(), bytes = bytes.len(), "Archive packed");
            Ok(vec![Artifact::new(options.output_name, bytes, FileFormat::Zip)])
        })
        .await
    }
}

// -- Unpack -----------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ZipUnpackOptions {
    /// Prefix each output with the archive name (`photos_beach.jpg`), so
    /// unpacking several archives at once cannot mix up their files.
    pub prefix_archive_name: bool,
}

/// Extract every file from an archive.
///
/// Directories are skipped and output names are flattened to the entry's
/// final path component. Entries whose path would escape the archive root
/// are dropped.
pub struct ZipUnpack;

#[async_trait]
impl TransformAdapter for ZipUnpack {
    type Options = ZipUnpackOptions;

    fn name(&self) -> &'static str {
        "unzip"
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &ZipUnpackOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?.clone();
        let options = options.clone();
        let ctx = ctx.clone();

        run_blocking(move || {
            let mut archive = ZipArchive::new(Cursor::new(file.bytes()))
                .map_err(|err| archive_error(file.name(), err))?;

            let total = archive.len();
            let mut taken = HashSet::new();
            let mut unpacked: u64 = 0;
            let mut artifacts = Vec::new();

            for index in 0..total {
                ctx.check_cancelled()?;
                let mut entry = archive
                    .by_index(index)
                    .map_err(|err| archive_error(file.name(), err))?;

                if entry.is_dir() {
                    continue;
                }
                let Some(path) = entry.enclosed_name() else {
                    warn!(entry = entry.name(), "Skipping entry with unsafe path");
                    continue;
                };
                if path.components().any(|c| c.as_os_str() == "__MACOSX") {
                    continue;
                }
                let Some(base) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                    continue;
                };

                let remaining = MAX_UNPACKED_BYTES - unpacked;
                let mut bytes = Vec::new();
                (&mut entry)
                    .take(remaining + 1)
                    .read_to_end(&mut bytes)
                    .map_err(|err| {
                        FilewerkError::ArchiveError(format!("{}: {}: {}", file.name(), base, err))
                    })?;
                unpacked += bytes.len() as u64;
                if unpacked > MAX_UNPACKED_BYTES {
                    return Err(FilewerkError::ArchiveError(format!(
                        "{} expands to more than {} bytes",
                        file.name(),
                        MAX_UNPACKED_BYTES
                    )));
                }

                let name = if options.prefix_archive_name {
                    format!("{}_{}", file.stem(), base)
                } else {
                    base
                };
                let name = claim_unique(&name, &mut taken);
                let media_type = FileFormat::from_filename(&name)
                    .map_or("application/octet-stream", |format| format.mime_type());
                artifacts.push(Artifact::with_media_type(name, bytes, media_type));

                ctx.progress.report((index + 1) as f32 / total as f32);
            }

            if artifacts.is_empty() {
                return Err(FilewerkError::ArchiveError(format!(
                    "{} contains no files",
                    file.name()
                )));
            }

            info!(files = artifacts.len(), bytes = unpacked, "Archive unpacked");
            Ok(artifacts)
        })
        .await
    }
}
