// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Where the configuration lives, and loading/saving it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use filewerk_core::AppConfig;
use filewerk_core::error::Result;
use tracing::{debug, warn};

const CONFIG_FILE: &str = "config.json";

/// The default configuration file: `$XDG_CONFIG_HOME/filewerk/config.json`,
/// falling back to `~/.config/filewerk/config.json`.
pub fn default_config_path() -> PathBuf {
    config_dir_from(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
    .join(CONFIG_FILE)
}

fn config_dir_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let base = match (xdg_config_home, home) {
        (Some(xdg), _) if !xdg.is_empty() => PathBuf::from(xdg),
        (_, Some(home)) if !home.is_empty() => PathBuf::from(home).join(".config"),
        // Last resort
        _ => std::env::temp_dir(),
    };
    base.join("filewerk")
}

/// Read the configuration at `path`. A missing or unreadable file yields
/// `None`; so does one that does not parse, with a warning.
pub fn load_config(path: &Path) -> Option<AppConfig> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => {
            debug!(path = %path.display(), "Loaded config");
            Some(config)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Ignoring unreadable config");
            None
        }
    }
}

/// `load_config`, or the defaults.
pub fn load_or_default(path: &Path) -> AppConfig {
    load_config(path).unwrap_or_default()
}

/// Write `config` to `path` as pretty JSON, creating the directory.
pub fn persist_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filewerk_core::FailurePolicy;

    #[test]
    fn xdg_config_home_wins() {
        let dir = config_dir_from(Some("/xdg".into()), Some("/home/ada".into()));
        assert_eq!(dir, PathBuf::from("/xdg/filewerk"));
    }

    #[test]
    fn falls_back_to_home() {
        let dir = config_dir_from(Some("".into()), Some("/home/ada".into()));
        assert_eq!(dir, PathBuf::from("/home/ada/.config/filewerk"));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = AppConfig {
            concurrency: 3,
            failure_policy: FailurePolicy::FailFast,
            remote_endpoint: Some("https://convert.example/api".into()),
            ..AppConfig::default()
        };

        persist_config(&path, &config).expect("persist");
        assert_eq!(load_config(&path), Some(config));
    }

    #[test]
    fn missing_or_corrupt_files_give_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(load_or_default(&path), AppConfig::default());

        std::fs::write(&path, "{ not json").expect("write");
        assert!(load_config(&path).is_none());
        assert_eq!(load_or_default(&path), AppConfig::default());
    }
}
