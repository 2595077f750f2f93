//! Glob expansion against a base directory.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Paths, Pattern};

use crate::error::{Result, SandboxError};

/// Shell-style matching: `*` stays within one path component and does not
/// pick up hidden files.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Expands glob patterns relative to a fixed base directory.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    base: PathBuf,
}

impl PathMatcher {
    /// Create a matcher rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The directory relative patterns are resolved against.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Turn `pattern` into an absolute pattern string.
    ///
    /// Absolute patterns pass through. Relative ones are prefixed with the
    /// escaped base directory so metacharacters in the base stay literal.
    pub fn resolve(&self, pattern: &str) -> Result<String> {
        if Path::new(pattern).is_absolute() {
            return Ok(pattern.to_string());
        }
        let base = self.base.to_str().ok_or_else(|| {
            SandboxError::Config(format!(
                "base directory {} is not valid UTF-8",
                self.base.display()
            ))
        })?;
        let base = Pattern::escape(base.trim_end_matches(std::path::MAIN_SEPARATOR));
        Ok(format!("{}{}{}", base, std::path::MAIN_SEPARATOR, pattern))
    }

    /// Lazily expand `pattern` into every existing path it matches.
    pub fn matches(&self, pattern: &str) -> Result<Matches> {
        let resolved = self.resolve(pattern)?;
        let paths = glob::glob_with(&resolved, MATCH_OPTIONS).map_err(|source| {
            SandboxError::Pattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Matches {
            pattern: pattern.to_string(),
            paths,
        })
    }

    /// Like [`matches`](Self::matches), restricted to regular files.
    ///
    /// Symlinks count when they resolve to a regular file; dangling ones are skipped.
    pub fn files(&self, pattern: &str) -> Result<impl Iterator<Item = Result<PathBuf>>> {
        Ok(self.matches(pattern)?.filter_map(|entry| match entry {
            Ok(path) => match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => Some(Ok(path)),
                Ok(_) => None,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                Err(err) => Some(Err(SandboxError::Io(err))),
            },
            Err(err) => Some(Err(err)),
        }))
    }
}

/// Iterator over the paths matched by one pattern.
///
/// Finite and single-pass; the filesystem is read as it advances.
pub struct Matches {
    pattern: String,
    paths: Paths,
}

impl Iterator for Matches {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        self.paths.next().map(|entry| {
            entry.map_err(|source| SandboxError::Match {
                pattern: self.pattern.clone(),
                source,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join(".hidden.md"), "h").unwrap();
        fs::write(dir.path().join("notes.txt"), "n").unwrap();
        fs::create_dir(dir.path().join("dir.md")).unwrap();
        fs::create_dir(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build").join("out.pdf"), "pdf").unwrap();
        dir
    }

    fn names(paths: Vec<PathBuf>) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_files_skip_directories_and_hidden() {
        let dir = fixture();
        let matcher = PathMatcher::new(dir.path());

        let found: Vec<PathBuf> = matcher.files("*.md").unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(names(found), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_matches_include_directories() {
        let dir = fixture();
        let matcher = PathMatcher::new(dir.path());

        let found: Vec<PathBuf> = matcher.matches("*.md").unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(names(found), vec!["a.md", "b.md", "dir.md"]);
    }

    #[test]
    fn test_nested_pattern() {
        let dir = fixture();
        let matcher = PathMatcher::new(dir.path());

        let found: Vec<PathBuf> = matcher.files("build/*.pdf").unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(found, vec![dir.path().join("build").join("out.pdf")]);

        // `*` does not cross directories
        let top: Vec<PathBuf> = matcher.files("*.pdf").unwrap().collect::<Result<_>>().unwrap();
        assert!(top.is_empty());
    }

    #[test]
    fn test_no_match_is_empty() {
        let dir = fixture();
        let matcher = PathMatcher::new(dir.path());
        assert_eq!(matcher.files("*.docx").unwrap().count(), 0);
        assert_eq!(matcher.files("missing/*.md").unwrap().count(), 0);
    }

    #[test]
    fn test_absolute_pattern_ignores_base() {
        let dir = fixture();
        let other = tempfile::tempdir().unwrap();
        let matcher = PathMatcher::new(other.path());

        let pattern = format!("{}/*.txt", dir.path().display());
        let found: Vec<PathBuf> = matcher.files(&pattern).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(names(found), vec!["notes.txt"]);
    }

    #[test]
    fn test_base_with_metacharacters() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("odd[1]");
        fs::create_dir(&base).unwrap();
        fs::write(base.join("x.md"), "x").unwrap();

        let matcher = PathMatcher::new(&base);
        let found: Vec<PathBuf> = matcher.files("*.md").unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(found, vec![base.join("x.md")]);
    }

    #[test]
    fn test_invalid_pattern() {
        let matcher = PathMatcher::new("/tmp");
        let err = matcher.matches("[").err().unwrap();
        assert!(err.is_matching());
    }
}
