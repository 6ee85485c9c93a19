//! Planner: diffs a local `FileMap` against the remote manifest's
//! `FileMap` and produces an ordered upload/delete plan.
//!
//! Rules (spec §4.6):
//! 1. Uploads: every local path whose fingerprint differs from (or is
//!    absent from) the remote map, directories included.
//! 2. Deletes: every remote path absent from the local map, but only
//!    when `allow_delete` is set; otherwise no deletes are planned.
//! 3. `manifest_changed` tracks whether the local and remote `FileMap`s
//!    differ at all, independent of `allow_delete` — a remote-only path
//!    still changes the manifest even when deletion of it is gated off.
//! 4. Uploads are ordered depth-first: at every directory level, each
//!    subdirectory's own entry and its whole subtree precede that
//!    level's files, so a directory's `create_dir` always lands before
//!    anything placed inside it. Deletes are sorted reverse-
//!    lexicographically so children are removed before their parent
//!    directories.
//! 5. The manifest's own path is appended to the upload list last,
//!    after every other upload.

use htdeploy_core::types::FileMap;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Paths to upload, in commit order. The manifest path (supplied by
    /// the caller) is always the last entry.
    pub uploads: Vec<String>,
    /// Paths to delete, reverse-lexicographic (children before parents).
    pub deletes: Vec<String>,
    pub manifest_changed: bool,
}

pub fn plan(local: &FileMap, remote: &FileMap, allow_delete: bool, manifest_path: &str) -> Plan {
    let changed: Vec<String> = local
        .iter()
        .filter(|(path, fp)| remote.get(*path) != Some(fp))
        .map(|(path, _)| path.clone())
        .collect();

    let mut uploads = order_uploads(&changed);

    let remote_only: Vec<String> = remote
        .keys()
        .filter(|path| !local.contains_key(*path))
        .cloned()
        .collect();

    let mut deletes: Vec<String> = if allow_delete { remote_only.clone() } else { Vec::new() };
    deletes.sort_by(|a, b| b.cmp(a));

    // manifestChanged tracks whether the FileMaps themselves differ, not
    // whether allowDelete let any remote-only path actually get removed —
    // a presence-only divergence still means the manifest's content changes.
    let manifest_changed = !changed.is_empty() || !remote_only.is_empty();

    uploads.push(manifest_path.to_string());

    Plan {
        uploads,
        deletes,
        manifest_changed,
    }
}

/// Order a set of changed paths so that, at every directory level, the
/// full subtree of each subdirectory (its own entry, then its children
/// recursively) precedes the level's files. This keeps `create_dir`
/// calls ahead of the files placed in them while also keeping a whole
/// nested tree of changes together rather than interleaved with
/// unrelated siblings.
fn order_uploads(paths: &[String]) -> Vec<String> {
    #[derive(Default)]
    struct Node {
        upload_path: Option<String>,
        dirs: BTreeMap<String, Node>,
        files: BTreeMap<String, Node>,
    }

    let mut root = Node::default();

    for path in paths {
        let is_dir = htdeploy_core::types::is_dir_path(path);
        let trimmed = path.trim_start_matches('/').trim_end_matches('/');
        let segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut node = &mut root;
        for (idx, seg) in segments.iter().enumerate() {
            let is_last = idx == segments.len() - 1;
            let bucket = if is_last && !is_dir { &mut node.files } else { &mut node.dirs };
            node = bucket.entry(seg.to_string()).or_default();
        }
        node.upload_path = Some(path.clone());
    }

    fn emit(node: &Node, out: &mut Vec<String>) {
        for child in node.dirs.values() {
            if let Some(p) = &child.upload_path {
                out.push(p.clone());
            }
            emit(child, out);
        }
        for child in node.files.values() {
            if let Some(p) = &child.upload_path {
                out.push(p.clone());
            }
        }
    }

    let mut out = Vec::with_capacity(paths.len());
    emit(&root, &mut out);
    out
}
