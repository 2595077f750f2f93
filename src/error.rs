//! Error types for the sandbox.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the sandbox machinery and its collaborators.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The sandbox directory could not be allocated.
    #[error("failed to allocate sandbox directory: {0}")]
    Allocation(#[source] std::io::Error),

    /// The current working directory could not be determined.
    #[error("failed to read current working directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    /// Switching into the sandbox root failed.
    #[error("failed to enter sandbox directory {}: {source}", .path.display())]
    Activate {
        /// The sandbox root.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The recorded working directory could not be restored.
    #[error("failed to restore working directory {}: {source}", .path.display())]
    Restore {
        /// The directory that should have become current again.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A working-directory sandbox is already active on this thread.
    #[error("a working-directory sandbox is already active on this thread")]
    Reentrant,

    /// A glob pattern could not be compiled.
    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Reading the filesystem while expanding a pattern failed.
    #[error("failed to expand glob pattern `{pattern}`: {source}")]
    Match {
        /// The pattern being expanded.
        pattern: String,
        #[source]
        source: glob::GlobError,
    },

    /// Copying a single file failed.
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        /// Source file.
        from: PathBuf,
        /// Destination file.
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking a directory tree failed.
    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// The debug directory already holds a capture and the policy forbids overwriting it.
    #[error("debug directory {} already holds a previous capture", .0.display())]
    DebugExists(PathBuf),

    /// The front matter block is not valid YAML.
    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    /// The front matter block is valid YAML but not a mapping.
    #[error("front matter must be a mapping, found {0}")]
    FrontMatterShape(&'static str),

    /// An external program could not be launched.
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        /// Program name.
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program was not found.
    #[error("`{0}` was not found")]
    ToolNotFound(String),

    /// No typesetting source was found in a directory.
    #[error("no `.{extension}` source found in {}", .dir.display())]
    NoSource {
        /// The searched directory.
        dir: PathBuf,
        /// The extension looked for.
        extension: &'static str,
    },

    /// The document format could not be derived from a path.
    #[error("unrecognized document format for {}", .0.display())]
    UnknownFormat(PathBuf),

    /// The blocking task running a sandbox did not complete.
    #[error("sandbox task failed: {0}")]
    TaskFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SandboxError {
    /// Check if this error is a failure to restore the working directory.
    pub fn is_restore(&self) -> bool {
        matches!(self, SandboxError::Restore { .. })
    }

    /// Check if this error reports a missing external program.
    pub fn is_tool_not_found(&self) -> bool {
        matches!(self, SandboxError::ToolNotFound(_))
    }

    /// Check if this error came from glob expansion.
    pub fn is_matching(&self) -> bool {
        matches!(self, SandboxError::Pattern { .. } | SandboxError::Match { .. })
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// What went wrong inside an active sandbox.
#[derive(Error, Debug)]
pub enum Failure<E> {
    /// The wrapped operation failed.
    #[error("{0}")]
    Operation(E),

    /// Importing the caller's files failed.
    #[error("failed to import files into sandbox: {0}")]
    Import(#[source] SandboxError),
}

/// Error returned by [`SandboxRunner::run`](crate::SandboxRunner::run).
///
/// The operation's own error is carried untouched in [`RunError::Operation`].
/// Faults during cleanup never replace it: they are reported in their own
/// variants with the original failure attached.
#[derive(Error, Debug)]
pub enum RunError<E> {
    /// The wrapped operation failed. Cleanup completed normally.
    #[error("{0}")]
    Operation(E),

    /// The sandbox could not be set up, so the operation never ran.
    #[error("sandbox unavailable: {0}")]
    Sandbox(#[source] SandboxError),

    /// Importing files failed. Cleanup completed normally.
    #[error("failed to import files into sandbox: {0}")]
    Import(#[source] SandboxError),

    /// The operation succeeded but its results could not be exported.
    #[error("failed to export sandbox results: {0}")]
    Export(#[source] SandboxError),

    /// The caller's working directory could not be restored.
    ///
    /// `masked` holds the failure that was being handled, if any.
    #[error("{source}")]
    Restore {
        #[source]
        source: SandboxError,
        /// Failure that was in flight when restoration failed.
        masked: Option<Failure<E>>,
    },

    /// The sandbox could not be preserved after a failure.
    #[error("{original} (debug capture also failed: {source})")]
    Capture {
        #[source]
        source: SandboxError,
        /// The failure that triggered the capture.
        original: Failure<E>,
    },
}

impl<E> RunError<E> {
    /// Borrow the operation's error, wherever it is carried.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            RunError::Operation(err)
            | RunError::Capture {
                original: Failure::Operation(err),
                ..
            }
            | RunError::Restore {
                masked: Some(Failure::Operation(err)),
                ..
            } => Some(err),
            _ => None,
        }
    }

    /// Take the operation's error out, wherever it is carried.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            RunError::Operation(err)
            | RunError::Capture {
                original: Failure::Operation(err),
                ..
            }
            | RunError::Restore {
                masked: Some(Failure::Operation(err)),
                ..
            } => Some(err),
            _ => None,
        }
    }

    /// Check if the working directory could not be restored.
    pub fn is_restore(&self) -> bool {
        matches!(self, RunError::Restore { .. })
    }

    /// Check if the debug capture failed.
    pub fn is_capture(&self) -> bool {
        matches!(self, RunError::Capture { .. })
    }
}

impl<E> From<Failure<E>> for RunError<E> {
    fn from(failure: Failure<E>) -> Self {
        match failure {
            Failure::Operation(err) => RunError::Operation(err),
            Failure::Import(err) => RunError::Import(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_is_transparent() {
        let err: RunError<std::io::Error> = RunError::Operation(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "boom",
        ));
        assert_eq!(err.to_string(), "boom");

        let inner = err.into_operation_error().unwrap();
        assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_capture_keeps_original() {
        let err: RunError<String> = RunError::Capture {
            source: SandboxError::DebugExists(PathBuf::from("debug")),
            original: Failure::Operation("render failed".to_string()),
        };

        assert!(err.is_capture());
        assert!(err.to_string().starts_with("render failed"));
        assert!(err.to_string().contains("debug capture also failed"));
        assert_eq!(err.operation_error().map(String::as_str), Some("render failed"));
    }

    #[test]
    fn test_restore_carries_masked_failure() {
        let err: RunError<String> = RunError::Restore {
            source: SandboxError::Restore {
                path: PathBuf::from("/gone"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
            masked: Some(Failure::Operation("late".to_string())),
        };

        assert!(err.is_restore());
        assert!(err.to_string().contains("/gone"));
        assert_eq!(err.operation_error().map(String::as_str), Some("late"));
    }

    #[test]
    fn test_failure_conversion() {
        let err: RunError<String> = Failure::Import(SandboxError::Reentrant).into();
        assert!(matches!(err, RunError::Import(SandboxError::Reentrant)));
        assert!(err.operation_error().is_none());
    }

    #[test]
    fn test_error_helpers() {
        assert!(SandboxError::ToolNotFound("pandoc".into()).is_tool_not_found());
        assert!(!SandboxError::Reentrant.is_restore());

        let pattern = SandboxError::Pattern {
            pattern: "[".into(),
            source: glob::Pattern::new("[").unwrap_err(),
        };
        assert!(pattern.is_matching());
    }
}
