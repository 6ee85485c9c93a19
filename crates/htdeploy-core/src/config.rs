//! `htdeploy.toml` configuration schema.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level deploy configuration, loaded from `htdeploy.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    pub manifest: ManifestConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Root directory to publish from.
    pub root: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

/// Which `Server` backend to connect to, and its connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// `"local"` (filesystem backend, for tests and local smoke deploys)
    /// or `"sftp"` (requires the `sftp` feature).
    pub kind: String,
    /// Filesystem path (kind = "local") or host (kind = "sftp").
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    /// Path to a private key file (kind = "sftp").
    pub key_file: Option<PathBuf>,
    /// Absolute remote root directory.
    pub root: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: "local".into(),
            host: String::new(),
            port: 22,
            username: None,
            key_file: None,
            root: "/".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Manifest file name at the remote root (default `.htdeployment`).
    pub filename: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            filename: ".htdeployment".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Glob patterns (with `!` negation, trailing-`/` directory anchors)
    /// deciding which local paths are skipped by the scanner.
    pub ignore: Vec<String>,
    /// Glob patterns deciding which files pass through the preprocessor.
    pub preprocess: Vec<String>,
    /// Whether the planner may emit deletes for remote-only paths.
    pub allow_delete: bool,
    /// Remote paths to purge (recursively clear contents, keep the dir)
    /// after the delete phase.
    pub purge: Vec<String>,
    /// Pre-deploy jobs, scheme-prefixed (`local:`, `remote:`, `http:`).
    pub before_jobs: Vec<String>,
    /// Post-deploy jobs, scheme-prefixed.
    pub after_jobs: Vec<String>,
    /// If true, compute and log the plan but perform no remote mutation.
    pub test_mode: bool,
    /// Directory used for preprocessor temp files and cache entries.
    pub temp_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            preprocess: Vec::new(),
            allow_delete: false,
            purge: Vec::new(),
            before_jobs: Vec::new(),
            after_jobs: Vec::new(),
            test_mode: false,
            temp_dir: std::env::temp_dir().join("htdeploy"),
        }
    }
}
