//! Copying files into and out of a sandbox.

use std::collections::HashSet;
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{Result, SandboxError};
use crate::sandbox::matcher::PathMatcher;

/// Copies the caller's files into a sandbox before the operation runs.
#[derive(Debug)]
pub struct ImportStage<'a> {
    matcher: PathMatcher,
    patterns: &'a [String],
}

impl<'a> ImportStage<'a> {
    /// Match `patterns` against the caller's directory `source`.
    pub fn new(source: &Path, patterns: &'a [String]) -> Self {
        Self {
            matcher: PathMatcher::new(source),
            patterns,
        }
    }

    /// Copy every matching regular file into the root of `sandbox`.
    ///
    /// Directory structure is dropped: only the base name is kept, and a later
    /// match with the same name replaces an earlier one.
    pub fn run(&self, sandbox: &Path) -> Result<Vec<PathBuf>> {
        let copied = flatten_into(&self.matcher, self.patterns, sandbox)?;
        debug!(count = copied.len(), "imported files into sandbox");
        Ok(copied)
    }
}

/// Copies results out of a sandbox after a successful run.
#[derive(Debug)]
pub struct ExportStage<'a> {
    matcher: PathMatcher,
    patterns: &'a [String],
}

impl<'a> ExportStage<'a> {
    /// Match `patterns` against the sandbox root.
    pub fn new(sandbox: &Path, patterns: &'a [String]) -> Self {
        Self {
            matcher: PathMatcher::new(sandbox),
            patterns,
        }
    }

    /// Copy every matching regular file into `destination`, keeping base names.
    pub fn run(&self, destination: &Path) -> Result<Vec<PathBuf>> {
        let copied = flatten_into(&self.matcher, self.patterns, destination)?;
        debug!(count = copied.len(), destination = %destination.display(), "exported sandbox results");
        Ok(copied)
    }
}

fn flatten_into(matcher: &PathMatcher, patterns: &[String], target: &Path) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    let mut seen = HashSet::new();

    for pattern in patterns {
        for source in matcher.files(pattern)? {
            let source = source?;
            let Some(name) = source.file_name() else {
                continue;
            };
            let destination = target.join(name);
            if !seen.insert(destination.clone()) {
                warn!(
                    file = %destination.display(),
                    from = %source.display(),
                    "flattened copy replaces an earlier file with the same name"
                );
            }
            copy_file(&source, &destination)?;
            copied.push(destination);
        }
    }

    Ok(copied)
}

/// Copy one file, keeping its content, permissions and timestamps.
pub(crate) fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let wrap = |source| SandboxError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    fs::copy(from, to).map_err(wrap)?;
    let meta = fs::metadata(from).map_err(wrap)?;
    let mut times = FileTimes::new().set_modified(meta.modified().map_err(wrap)?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    // Opened for writing to set times; skip read-only copies rather than fail.
    match File::options().write(true).open(to) {
        Ok(file) => file.set_times(times).map_err(wrap)?,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            debug!(file = %to.display(), "read-only copy keeps fresh timestamps");
        }
        Err(err) => return Err(wrap(err)),
    }
    trace!(from = %from.display(), to = %to.display(), "copied file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, SystemTime};

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_import_flattens_and_filters() {
        let caller = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        fs::write(caller.path().join("a.md"), "alpha").unwrap();
        fs::write(caller.path().join("b.md"), "beta").unwrap();
        fs::write(caller.path().join("c.txt"), "gamma").unwrap();
        fs::create_dir(caller.path().join("chapters")).unwrap();
        fs::write(caller.path().join("chapters").join("one.tex"), "one").unwrap();

        let pats = patterns(&["*.md", "chapters/*.tex", "chapters"]);
        let copied = ImportStage::new(caller.path(), &pats).run(sandbox.path()).unwrap();

        assert_eq!(copied.len(), 3);
        assert_eq!(fs::read_to_string(sandbox.path().join("a.md")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(sandbox.path().join("b.md")).unwrap(), "beta");
        assert_eq!(fs::read_to_string(sandbox.path().join("one.tex")).unwrap(), "one");
        assert!(!sandbox.path().join("c.txt").exists());
        assert!(!sandbox.path().join("chapters").exists());
    }

    #[test]
    fn test_import_preserves_modification_time() {
        let caller = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let file = caller.path().join("old.md");
        fs::write(&file, "old").unwrap();

        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(stamp)
            .unwrap();

        let pats = patterns(&["old.md"]);
        ImportStage::new(caller.path(), &pats).run(sandbox.path()).unwrap();

        let copied = fs::metadata(sandbox.path().join("old.md")).unwrap();
        assert_eq!(copied.modified().unwrap(), stamp);
    }

    #[test]
    fn test_export_from_subdirectory() {
        let sandbox = tempfile::tempdir().unwrap();
        let caller = tempfile::tempdir().unwrap();
        fs::create_dir(sandbox.path().join("build")).unwrap();
        fs::write(sandbox.path().join("build").join("doc.pdf"), "pdf").unwrap();
        fs::write(sandbox.path().join("doc.log"), "log").unwrap();

        let pats = patterns(&["build/*.pdf"]);
        let copied = ExportStage::new(sandbox.path(), &pats).run(caller.path()).unwrap();

        assert_eq!(copied, vec![caller.path().join("doc.pdf")]);
        assert_eq!(fs::read_to_string(caller.path().join("doc.pdf")).unwrap(), "pdf");
        assert!(!caller.path().join("doc.log").exists());
    }

    #[test]
    fn test_no_matches_copy_nothing() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let pats = patterns(&["*.pdf", "nested/**/*.aux"]);
        assert!(ExportStage::new(a.path(), &pats).run(b.path()).unwrap().is_empty());
        assert_eq!(fs::read_dir(b.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let caller = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        fs::create_dir(caller.path().join("x")).unwrap();
        fs::create_dir(caller.path().join("y")).unwrap();
        fs::write(caller.path().join("x").join("main.tex"), "first").unwrap();
        fs::write(caller.path().join("y").join("main.tex"), "second").unwrap();

        let pats = patterns(&["x/*.tex", "y/*.tex"]);
        ImportStage::new(caller.path(), &pats).run(sandbox.path()).unwrap();
        assert_eq!(fs::read_to_string(sandbox.path().join("main.tex")).unwrap(), "second");
    }
}
