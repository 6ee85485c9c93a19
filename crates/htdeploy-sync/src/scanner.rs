//! Scanner: depth-first walk of the local tree, producing a `{path ->
//! fingerprint}` FileMap.
//!
//! Unreadable entries are silently skipped; ignored paths (and, for
//! directories, their entire subtree) are skipped with a log line at
//! "ignored" severity. Traversal order within a directory is sorted by
//! file name so that results are deterministic given the same filesystem
//! state, even though the spec only requires determinism, not any
//! particular order.

use crate::preprocess::Preprocessor;
use htdeploy_core::types::{Fingerprint, FileMap};
use htdeploy_core::Progress;
use std::path::Path;

pub fn scan(
    root: &Path,
    ignore_patterns: &[String],
    preprocessor: &Preprocessor,
    progress: &dyn Progress,
) -> anyhow::Result<FileMap> {
    let mut map = FileMap::new();
    walk(root, root, ignore_patterns, preprocessor, progress, &mut map)?;
    Ok(map)
}

fn walk(
    root: &Path,
    dir: &Path,
    ignore_patterns: &[String],
    preprocessor: &Preprocessor,
    progress: &dyn Progress,
    map: &mut FileMap,
) -> anyhow::Result<()> {
    let mut entries: Vec<_> = match std::fs::read_dir(dir) {
        Ok(it) => it.filter_map(|e| e.ok()).collect(),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "scanner: unreadable directory, skipping");
            return Ok(());
        }
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let abs_path = entry.path();
        let name = entry.file_name();
        if name == "." || name == ".." {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %abs_path.display(), error = %e, "scanner: unreadable entry, skipping");
                continue;
            }
        };

        let is_dir = meta.is_dir();
        let rel = relative_path(root, &abs_path, is_dir);

        if crate::pattern::matches(&rel, ignore_patterns, is_dir) {
            tracing::event!(tracing::Level::INFO, severity = "ignored", path = %rel, "ignored by pattern");
            continue;
        }

        if is_dir {
            map.insert(rel.clone(), Fingerprint::Dir);
            progress.step(map.len() as u64, 0, &rel);
            walk(root, &abs_path, ignore_patterns, preprocessor, progress, map)?;
        } else if meta.is_file() {
            let pp_path = preprocessor.preprocess(&abs_path, &rel)?;
            let bytes = std::fs::read(&pp_path)?;
            let digest = format!("{:x}", md5::compute(&bytes));
            map.insert(rel.clone(), Fingerprint::File(digest));
            progress.step(map.len() as u64, 0, &rel);
        }
    }

    Ok(())
}

/// Build the `/`-rooted relative path the spec's Path type describes,
/// with a trailing `/` for directories.
fn relative_path(root: &Path, abs_path: &Path, is_dir: bool) -> String {
    let rel = abs_path
        .strip_prefix(root)
        .unwrap_or(abs_path)
        .to_string_lossy()
        .replace('\\', "/");
    let mut out = format!("/{rel}");
    if is_dir && !out.ends_with('/') {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{FilterRegistry, Preprocessor};
    use htdeploy_core::NoProgress;

    fn no_preprocessor(tmp: &Path) -> Preprocessor {
        Preprocessor::new(FilterRegistry::new(), vec![], tmp.join("pp"))
    }

    #[test]
    fn scans_files_and_directory_closure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"world").unwrap();

        let pp = no_preprocessor(dir.path());
        let map = scan(dir.path(), &[], &pp, &NoProgress).unwrap();

        assert_eq!(map.get("/sub/"), Some(&Fingerprint::Dir));
        assert!(matches!(map.get("/sub/b.txt"), Some(Fingerprint::File(_))));
        assert!(matches!(map.get("/a.txt"), Some(Fingerprint::File(_))));
    }

    #[test]
    fn ignored_directory_skips_entire_subtree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"y").unwrap();

        let pp = no_preprocessor(dir.path());
        let ignore = vec!["node_modules/".to_string()];
        let map = scan(dir.path(), &ignore, &pp, &NoProgress).unwrap();

        assert!(map.get("/node_modules/").is_none());
        assert!(map.get("/node_modules/pkg/index.js").is_none());
        assert!(map.get("/keep.txt").is_some());
    }

    #[test]
    fn pattern_negation_keeps_one_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), b"a").unwrap();
        std::fs::write(dir.path().join("keep.log"), b"b").unwrap();

        let pp = no_preprocessor(dir.path());
        let ignore = vec!["*.log".to_string(), "!keep.log".to_string()];
        let map = scan(dir.path(), &ignore, &pp, &NoProgress).unwrap();

        assert!(map.get("/a.log").is_none());
        assert!(map.get("/keep.log").is_some());
    }

    #[test]
    fn same_content_same_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"identical").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"identical").unwrap();

        let pp = no_preprocessor(dir.path());
        let map = scan(dir.path(), &[], &pp, &NoProgress).unwrap();

        assert_eq!(map.get("/a.txt"), map.get("/b.txt"));
    }
}
