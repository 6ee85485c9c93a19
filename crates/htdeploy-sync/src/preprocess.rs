//! Preprocessor: the extension-keyed filter pipeline applied to a file
//! before fingerprinting and upload.
//!
//! `preprocess` is called twice per file during a deploy (once to
//! fingerprint, once to upload) — per the open question in spec §9, we
//! require filters to be pure and rely on the content cache (for
//! `cached: true` steps) to make repeated calls produce byte-identical
//! output. Uncached steps legitimately produce two distinct temp files per
//! call; both are cleaned up by `TempFileGuard`'s `Drop`.

use htdeploy_core::types::{FilterFn, FilterStep};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registered filters, keyed by file extension (without the leading `.`).
#[derive(Default)]
pub struct FilterRegistry {
    by_extension: HashMap<String, Vec<FilterStep>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter for `extension`, run in registration order.
    pub fn register(&mut self, extension: &str, filter: Arc<dyn FilterFn>, cached: bool) {
        self.by_extension
            .entry(extension.to_ascii_lowercase())
            .or_default()
            .push(FilterStep { filter, cached });
    }

    fn steps_for(&self, extension: &str) -> Option<&[FilterStep]> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .map(|v| v.as_slice())
    }
}

pub struct Preprocessor {
    filters: FilterRegistry,
    preprocess_patterns: Vec<String>,
    temp_dir: PathBuf,
}

impl Preprocessor {
    pub fn new(filters: FilterRegistry, preprocess_patterns: Vec<String>, temp_dir: PathBuf) -> Self {
        Preprocessor {
            filters,
            preprocess_patterns,
            temp_dir,
        }
    }

    /// Whether `rel_path` is eligible for preprocessing: it has a
    /// registered filter sequence for its extension *and* matches at
    /// least one configured preprocess pattern.
    pub fn applies_to(&self, abs_path: &Path, rel_path: &str) -> bool {
        let extension = abs_path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if self.filters.steps_for(extension).is_none() {
            return false;
        }
        crate::pattern::matches(rel_path, &self.preprocess_patterns, false)
    }

    /// Apply the registered filter pipeline to `abs_path`, returning the
    /// path to preprocessed content. If nothing applies, returns
    /// `abs_path` unchanged with no temp file created.
    pub fn preprocess(&self, abs_path: &Path, rel_path: &str) -> anyhow::Result<PathBuf> {
        if !self.applies_to(abs_path, rel_path) {
            return Ok(abs_path.to_path_buf());
        }

        let extension = abs_path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let steps = self
            .filters
            .steps_for(extension)
            .expect("applies_to already checked steps_for is Some");

        let mut content = std::fs::read(abs_path)?;

        for step in steps {
            content = self.run_step(step, &content, rel_path)?;
        }

        std::fs::create_dir_all(&self.temp_dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix("htdeploy-pp-")
            .tempfile_in(&self.temp_dir)?;
        tmp.write_all(&content)?;
        let (_, path) = tmp.keep()?;
        Ok(path)
    }

    fn run_step(&self, step: &FilterStep, content: &[u8], rel_path: &str) -> anyhow::Result<Vec<u8>> {
        if !step.cached {
            return step.filter.apply(content, rel_path);
        }

        let key = blake3::hash(content).to_hex().to_string();
        let cache_path = self.temp_dir.join(&key);

        if cache_path.exists() {
            return Ok(std::fs::read(&cache_path)?);
        }

        let result = step.filter.apply(content, rel_path)?;
        std::fs::create_dir_all(&self.temp_dir)?;
        std::fs::write(&cache_path, &result)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uppercase;
    impl FilterFn for Uppercase {
        fn apply(&self, data: &[u8], _path: &str) -> anyhow::Result<Vec<u8>> {
            Ok(String::from_utf8_lossy(data).to_uppercase().into_bytes())
        }
    }

    struct CallCounter(std::sync::atomic::AtomicUsize);
    impl FilterFn for CallCounter {
        fn apply(&self, data: &[u8], _path: &str) -> anyhow::Result<Vec<u8>> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(data.to_vec())
        }
    }

    #[test]
    fn unregistered_extension_is_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();

        let registry = FilterRegistry::new();
        let pp = Preprocessor::new(registry, vec!["*".into()], dir.path().join("tmp"));
        let out = pp.preprocess(&file, "/a.txt").unwrap();
        assert_eq!(out, file);
    }

    #[test]
    fn registered_extension_not_matching_pattern_is_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.css");
        std::fs::write(&file, b"body{}").unwrap();

        let mut registry = FilterRegistry::new();
        registry.register("css", Arc::new(Uppercase), false);
        // Pattern only covers js, not css.
        let pp = Preprocessor::new(registry, vec!["*.js".into()], dir.path().join("tmp"));
        let out = pp.preprocess(&file, "/a.css").unwrap();
        assert_eq!(out, file);
    }

    #[test]
    fn filter_applies_and_writes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.css");
        std::fs::write(&file, b"body{}").unwrap();

        let mut registry = FilterRegistry::new();
        registry.register("css", Arc::new(Uppercase), false);
        let pp = Preprocessor::new(registry, vec!["*.css".into()], dir.path().join("tmp"));

        let out = pp.preprocess(&file, "/a.css").unwrap();
        assert_ne!(out, file);
        assert_eq!(std::fs::read(&out).unwrap(), b"BODY{}");
    }

    #[test]
    fn cached_step_is_invoked_once_for_repeated_content() {
        let dir = tempfile::tempdir().unwrap();
        let file_a = dir.path().join("a.css");
        let file_b = dir.path().join("b.css");
        std::fs::write(&file_a, b"same").unwrap();
        std::fs::write(&file_b, b"same").unwrap();

        let counter = Arc::new(CallCounter(std::sync::atomic::AtomicUsize::new(0)));
        let mut registry = FilterRegistry::new();
        registry.register("css", counter.clone(), true);
        let pp = Preprocessor::new(registry, vec!["*.css".into()], dir.path().join("tmp"));

        pp.preprocess(&file_a, "/a.css").unwrap();
        pp.preprocess(&file_b, "/b.css").unwrap();

        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn uncached_step_recomputes_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.css");
        std::fs::write(&file, b"same").unwrap();

        let counter = Arc::new(CallCounter(std::sync::atomic::AtomicUsize::new(0)));
        let mut registry = FilterRegistry::new();
        registry.register("css", counter.clone(), false);
        let pp = Preprocessor::new(registry, vec!["*.css".into()], dir.path().join("tmp"));

        pp.preprocess(&file, "/a.css").unwrap();
        pp.preprocess(&file, "/a.css").unwrap();

        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
