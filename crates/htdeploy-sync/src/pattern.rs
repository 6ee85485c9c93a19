//! PatternMatcher: decides whether a path is ignored / eligible for
//! preprocessing.
//!
//! Semantics (applied in list order, `result` starts `false`):
//! 1. Normalize backslashes to `/` in the pattern.
//! 2. A leading `!` negates the match for that pattern.
//! 3. A trailing `/` restricts the pattern to directories; non-directory
//!    candidates skip that pattern entirely.
//! 4. A pattern with no `/` matches the path's basename.
//! 5. Otherwise the pattern is anchored at the root and matched against
//!    the full path, with `*` never crossing a `/` boundary.
//!
//! All matching is case-insensitive. A match sets `result := !negated`; a
//! non-match leaves `result` unchanged — later patterns can re-include
//! paths excluded by earlier ones, and vice versa.

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Evaluate `patterns` against `path` (a `/`-rooted path; `is_dir` true if
/// it denotes a directory) and return whether it matches overall.
pub fn matches(path: &str, patterns: &[String], is_dir: bool) -> bool {
    let mut result = false;

    for raw in patterns {
        let normalized = raw.replace('\\', "/");

        let (negated, rest) = match normalized.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, normalized.as_str()),
        };

        let (dir_only, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        if dir_only && !is_dir {
            continue;
        }

        if rest.is_empty() {
            continue;
        }

        let is_match = if rest.contains('/') {
            let anchored = format!("/{}", rest.trim_start_matches('/'));
            match Pattern::new(&anchored) {
                Ok(p) => p.matches_with(path, MATCH_OPTIONS),
                Err(_) => false,
            }
        } else {
            let basename = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
            match Pattern::new(rest) {
                Ok(p) => p.matches_with(basename, MATCH_OPTIONS),
                Err(_) => false,
            }
        };

        if is_match {
            result = !negated;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_glob_matches_case_insensitively() {
        let patterns = vec!["*.LOG".to_string()];
        assert!(matches("/var/app.log", &patterns, false));
        assert!(!matches("/var/app.txt", &patterns, false));
    }

    #[test]
    fn negation_re_includes() {
        let patterns = vec!["*.log".to_string(), "!keep.log".to_string()];
        assert!(matches("/a.log", &patterns, false));
        assert!(!matches("/keep.log", &patterns, false));
    }

    #[test]
    fn appending_negate_then_same_pattern_is_a_no_op() {
        // Property 8: appending "!x" then "x" yields the same decision as
        // just "x", for inputs where "x" matches.
        let just_x = vec!["*.log".to_string()];
        let negate_then_x = vec![
            "*.log".to_string(),
            "!*.log".to_string(),
            "*.log".to_string(),
        ];
        for path in ["/a.log", "/b.log"] {
            assert_eq!(
                matches(path, &just_x, false),
                matches(path, &negate_then_x, false)
            );
        }
    }

    #[test]
    fn trailing_slash_is_directory_only() {
        let patterns = vec!["build/".to_string()];
        assert!(matches("/build/", &patterns, true));
        assert!(!matches("/build", &patterns, false));
    }

    #[test]
    fn anchored_pattern_does_not_cross_slash() {
        let patterns = vec!["/src/*.rs".to_string()];
        assert!(matches("/src/main.rs", &patterns, false));
        assert!(!matches("/src/nested/main.rs", &patterns, false));
    }

    #[test]
    fn rooted_pattern_without_leading_slash_is_anchored() {
        let patterns = vec!["sub/b.txt".to_string()];
        assert!(matches("/sub/b.txt", &patterns, false));
        assert!(!matches("/other/sub/b.txt", &patterns, false));
    }

    #[test]
    fn empty_pattern_list_never_matches() {
        assert!(!matches("/anything", &[], false));
    }
}
