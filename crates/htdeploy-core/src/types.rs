//! Shared data model: paths, fingerprints, file maps, and jobs.
//!
//! Paths are plain `String`s, POSIX-style, rooted at the deployment root
//! with a leading `/`. Directory paths end with `/`; file paths never do.
//! This mirrors how the rest of the sync stack already treats remote/local
//! paths as `String` rather than a dedicated newtype.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The sentinel wire tag for a directory entry in the manifest.
pub const DIR_TAG: &str = "1";

/// Either `Dir` for a directory or a 32-lowercase-hex-char MD5 digest for a
/// file's preprocessed content. Equality of fingerprints is the sole
/// change-detection signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fingerprint {
    Dir,
    File(String),
}

impl Fingerprint {
    pub fn is_dir(&self) -> bool {
        matches!(self, Fingerprint::Dir)
    }

    /// Render the wire tag used in manifest lines (`1` for directories,
    /// the hex digest otherwise).
    pub fn wire_tag(&self) -> &str {
        match self {
            Fingerprint::Dir => DIR_TAG,
            Fingerprint::File(hex) => hex,
        }
    }

    /// Parse a wire tag back into a Fingerprint.
    pub fn from_wire_tag(tag: &str) -> Self {
        if tag == DIR_TAG {
            Fingerprint::Dir
        } else {
            Fingerprint::File(tag.to_string())
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_tag())
    }
}

/// An unordered (here: `BTreeMap` for deterministic iteration) mapping from
/// path to fingerprint. See spec FileMap invariants: every prefix directory
/// of a file path is present with fingerprint `Dir`, and the manifest's own
/// path is never present in a map used for diffing.
pub type FileMap = BTreeMap<String, Fingerprint>;

/// True if `path` denotes a directory entry (trailing `/`), matching the
/// Path data model's convention.
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// The basename (final path component) of a path, ignoring a trailing `/`
/// for directory paths.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// All proper prefix-directory paths of `path`, nearest-ancestor first,
/// each with a trailing `/`. `/a/b/c.txt` yields `["/a/b/", "/a/"]`.
pub fn parent_dirs(path: &str) -> Vec<String> {
    let trimmed = path.trim_end_matches('/');
    let mut out = Vec::new();
    let mut rest = trimmed;
    while let Some(idx) = rest.rfind('/') {
        if idx == 0 {
            break;
        }
        rest = &rest[..idx];
        out.push(format!("{rest}/"));
    }
    out
}

/// A single step in a `FilterPipeline` registration: the filter itself,
/// plus whether its output should be served from the content cache.
pub struct FilterStep {
    pub filter: Arc<dyn FilterFn>,
    pub cached: bool,
}

/// A user-supplied preprocessing filter: `(bytes, path) -> bytes`.
/// Modeled as a single-method trait per the design notes — filters are
/// assumed pure for the duration of a deploy (see Open Questions).
pub trait FilterFn: Send + Sync {
    fn apply(&self, data: &[u8], path: &str) -> anyhow::Result<Vec<u8>>;
}

/// A user-supplied pre/post-deploy callback job.
pub trait JobCallback: Send + Sync {
    fn run(&self) -> anyhow::Result<()>;
}

/// A tagged job value. Parsed once from a scheme-prefixed string
/// (`local:`, `remote:`, `http:`) at config load, or constructed directly
/// for callback jobs.
#[derive(Clone)]
pub enum Job {
    /// Runs in the local shell.
    Local(String),
    /// Runs on the Server via `execute`.
    Remote(String),
    /// Performs an HTTP GET.
    Http(String),
    /// Invokes a user-supplied callback.
    Callback(Arc<dyn JobCallback>),
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Local(cmd) => write!(f, "Job::Local({cmd:?})"),
            Job::Remote(cmd) => write!(f, "Job::Remote({cmd:?})"),
            Job::Http(url) => write!(f, "Job::Http({url:?})"),
            Job::Callback(_) => write!(f, "Job::Callback(..)"),
        }
    }
}

impl Job {
    /// Parse a scheme-prefixed job string: `local:<cmd>`, `remote:<cmd>`,
    /// or `http:<url>` (the `<url>` itself may start with `http://` or
    /// `https://`). Returns `None` if the string carries no recognized
    /// scheme prefix.
    pub fn parse(spec: &str) -> Option<Job> {
        if let Some(cmd) = spec.strip_prefix("local:") {
            Some(Job::Local(cmd.to_string()))
        } else if let Some(cmd) = spec.strip_prefix("remote:") {
            Some(Job::Remote(cmd.to_string()))
        } else if let Some(url) = spec.strip_prefix("http:") {
            Some(Job::Http(url.to_string()))
        } else {
            None
        }
    }

    /// A job is local if it runs before the Server is contacted for any
    /// mutation (i.e. everything except `remote:` jobs and callbacks that
    /// the caller has chosen to partition as local).
    pub fn is_local_scheme(&self) -> bool {
        matches!(self, Job::Local(_))
    }
}
