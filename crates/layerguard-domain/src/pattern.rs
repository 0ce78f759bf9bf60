use std::fmt;

use globset::GlobBuilder;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// Path-pattern capability used by the rule catalog.
///
/// Patterns are compiled once when the catalog is loaded; matching is then a pure
/// predicate over a normalized, forward-slash path.
pub trait PatternMatcher: Send + Sync {
    type Compiled: Clone + fmt::Debug + Send + Sync;

    fn compile(&self, pattern: &str) -> Result<Self::Compiled, PatternError>;

    fn matches(&self, pattern: &Self::Compiled, path: &str) -> bool;
}

/// Glob semantics: case-sensitive, `*` and `?` stay within one path segment,
/// `**` crosses separators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobMatcher;

impl PatternMatcher for GlobMatcher {
    type Compiled = globset::GlobMatcher;

    fn compile(&self, pattern: &str) -> Result<Self::Compiled, PatternError> {
        // Patterns keep `\` as the glob escape; only paths are normalized.
        GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map(|glob| glob.compile_matcher())
            .map_err(|e| PatternError {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            })
    }

    fn matches(&self, pattern: &Self::Compiled, path: &str) -> bool {
        pattern.is_match(path)
    }
}

/// Normalize a changed path for matching: forward slashes, no leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let mut rest = replaced.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str, path: &str) -> bool {
        let m = GlobMatcher;
        let compiled = m.compile(pattern).expect("valid glob");
        m.matches(&compiled, path)
    }

    #[test]
    fn single_star_stays_within_a_segment() {
        assert!(glob("lambda-*/src/**", "lambda-a/src/handler.py"));
        assert!(!glob("lambda-*/src/**", "lambda-a/extra/src/handler.py"));
        assert!(glob("lib/*.py", "lib/common.py"));
        assert!(!glob("lib/*.py", "lib/nested/common.py"));
    }

    #[test]
    fn double_star_crosses_separators() {
        assert!(glob("lib/**", "lib/common.py"));
        assert!(glob("lib/**", "lib/a/b/c.py"));
        assert!(glob("**/*.md", "README.md"));
        assert!(glob("**/*.md", "docs/guide/intro.md"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!glob("docs/**", "DOCS/readme.txt"));
        assert!(!glob("**/*.md", "NOTES.MD"));
    }

    #[test]
    fn invalid_glob_reports_pattern() {
        let err = GlobMatcher.compile("lib/[abc").unwrap_err();
        assert_eq!(err.pattern, "lib/[abc");
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn backslash_escapes_glob_metacharacters() {
        assert!(glob("docs/\\*.md", "docs/*.md"));
        assert!(!glob("docs/\\*.md", "docs/a.md"));
        assert!(glob("data/\\[raw\\].csv", "data/[raw].csv"));
    }

    #[test]
    fn normalize_path_strips_prefixes_and_backslashes() {
        assert_eq!(normalize_path("./lib/common.py"), "lib/common.py");
        assert_eq!(normalize_path("lib\\common.py"), "lib/common.py");
        assert_eq!(normalize_path("/lib/common.py"), "lib/common.py");
        assert_eq!(normalize_path("././a.txt"), "a.txt");
    }
}
