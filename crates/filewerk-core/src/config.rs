// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the batch runner does after a job fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record the failure on that job and keep going.
    #[default]
    FailIsolated,
    /// Stop dispatching after the first failure.
    FailFast,
}

/// How long an adapter may reasonably take per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutClass {
    /// Image/PDF/archive work: seconds.
    Quick,
    /// Audio/video transcoding: minutes.
    Long,
    /// A network round trip to a conversion endpoint.
    Remote,
}

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where converted files are written.
    pub output_dir: PathBuf,
    /// Jobs in flight at once (1 = strictly sequential).
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Minimum spacing between bulk deliveries.
    pub delivery_interval_ms: u64,
    /// Inputs larger than this are rejected at intake.
    pub max_file_bytes: Option<u64>,
    pub quick_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
    pub remote_timeout_secs: u64,
    /// Explicit ffmpeg binary; otherwise looked up on `PATH`.
    pub ffmpeg_path: Option<PathBuf>,
    /// Endpoint for the remote DOCX-to-PDF tool.
    pub remote_endpoint: Option<String>,
    /// Default JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Public base URL used for canonical links and the sitemap.
    pub site_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("filewerk-output"),
            concurrency: 1,
            failure_policy: FailurePolicy::FailIsolated,
            delivery_interval_ms: 100,
            max_file_bytes: None,
            quick_timeout_secs: 60,
            transcode_timeout_secs: 30 * 60,
            remote_timeout_secs: 120,
            ffmpeg_path: None,
            remote_endpoint: None,
            jpeg_quality: 90,
            site_base_url: "https://filewerk.example".into(),
        }
    }
}

impl AppConfig {
    /// Per-job time limit for an adapter class.
    pub fn timeout_for(&self, class: TimeoutClass) -> Duration {
        let secs = match class {
            TimeoutClass::Quick => self.quick_timeout_secs,
            TimeoutClass::Long => self.transcode_timeout_secs,
            TimeoutClass::Remote => self.remote_timeout_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    pub fn delivery_interval(&self) -> Duration {
        Duration::from_millis(self.delivery_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "concurrency": 4, "failure_policy": "fail-fast" }"#)
                .expect("parse");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.delivery_interval_ms, 100);
        assert_eq!(config.max_file_bytes, None);
    }

    #[test]
    fn timeouts_follow_class() {
        let config = AppConfig::default();
        assert!(config.timeout_for(TimeoutClass::Long) > config.timeout_for(TimeoutClass::Quick));
        assert_eq!(config.timeout_for(TimeoutClass::Remote), Duration::from_secs(120));
    }
}
