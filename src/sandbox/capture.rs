//! Preserving a failed sandbox for postmortem inspection.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SandboxError};
use crate::sandbox::transfer::copy_file;

/// Written into every capture that starts from an empty directory.
/// Only directories carrying it are ever cleared.
pub const CAPTURE_MARKER: &str = ".sandbox-capture";

/// Behaviour when the debug directory already holds files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebugPolicy {
    /// Remove a previous capture, then write the new one.
    ///
    /// A populated directory without [`CAPTURE_MARKER`] is not a capture and
    /// is refused with [`SandboxError::DebugExists`].
    #[default]
    Replace,
    /// Copy over the previous capture, keeping files the new one lacks.
    Merge,
    /// Refuse with [`SandboxError::DebugExists`].
    FailIfPopulated,
}

/// Copies a whole sandbox tree into a debug directory.
#[derive(Debug, Clone)]
pub struct FailureCapture {
    destination: PathBuf,
    policy: DebugPolicy,
}

impl FailureCapture {
    /// Capture into `destination`, resolving existing contents with `policy`.
    pub fn new(destination: impl Into<PathBuf>, policy: DebugPolicy) -> Self {
        Self {
            destination: destination.into(),
            policy,
        }
    }

    /// The debug directory.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Copy everything under `sandbox` into the debug directory.
    pub fn preserve(&self, sandbox: &Path) -> Result<usize> {
        let fresh = self.prepare()?;
        let copied = copy_tree(sandbox, &self.destination)?;
        if fresh {
            fs::write(self.destination.join(CAPTURE_MARKER), "")?;
        }
        warn!(
            files = copied,
            debug_dir = %self.destination.display(),
            "preserved failed sandbox"
        );
        Ok(copied)
    }

    /// Make the destination ready. Returns whether it is now empty.
    fn prepare(&self) -> Result<bool> {
        let populated = match fs::read_dir(&self.destination) {
            Ok(mut entries) => entries.next().is_some(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => return Err(SandboxError::Io(err)),
        };

        let fresh = match (populated, self.policy) {
            (false, _) => true,
            (true, DebugPolicy::Replace) if self.destination.join(CAPTURE_MARKER).is_file() => {
                debug!(debug_dir = %self.destination.display(), "clearing previous capture");
                fs::remove_dir_all(&self.destination)?;
                true
            }
            (true, DebugPolicy::Merge) => false,
            (true, DebugPolicy::Replace | DebugPolicy::FailIfPopulated) => {
                return Err(SandboxError::DebugExists(self.destination.clone()));
            }
        };

        fs::create_dir_all(&self.destination)?;
        Ok(fresh)
    }
}

/// Recursively copy the contents of `from` into `to`, returning the file count.
///
/// Symlinks are copied as the file they point to; links to directories are skipped.
pub fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut files = 0;

    for entry in WalkDir::new(from).min_depth(1).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|err| SandboxError::Config(err.to_string()))?;
        let target = to.join(relative);
        let kind = entry.file_type();

        if kind.is_dir() {
            fs::create_dir_all(&target)?;
        } else if kind.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {
                    copy_file(entry.path(), &target)?;
                    files += 1;
                }
                _ => debug!(link = %entry.path().display(), "skipping symlink"),
            }
        } else {
            copy_file(entry.path(), &target)?;
            files += 1;
        }
    }

    Ok(files)
}
