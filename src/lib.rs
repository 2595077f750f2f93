//! # Workdir Sandbox
//!
//! Run an operation inside a disposable working directory.
//!
//! A [`SandboxRunner`] allocates a fresh directory for every run and:
//!
//! - **Imports** caller files matching glob patterns before the operation runs
//! - **Exports** sandbox files matching glob patterns after it succeeds
//! - **Preserves** the whole sandbox in a `debug/` directory when it fails
//! - **Restores** the working directory and removes the sandbox on every path
//!
//! The operation's error comes back unchanged inside [`RunError::Operation`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use workdir_sandbox::prelude::*;
//!
//! let config = SandboxConfig::builder()
//!     .import("*.md")
//!     .export("*.html")
//!     .chdir(false)
//!     .build();
//!
//! let runner = SandboxRunner::new(config);
//! let pages = runner.run(|sandbox| {
//!     let text = std::fs::read_to_string(sandbox.path("index.md"))?;
//!     std::fs::write(sandbox.path("index.html"), text)?;
//!     Ok::<_, std::io::Error>(1)
//! });
//! assert!(pages.is_ok());
//! ```
//!
//! ## Working directory
//!
//! With `chdir` enabled (the default) the process working directory is switched
//! into the sandbox for the duration of the operation. That directory is
//! process-wide, so such runs are serialized and nesting one inside another on
//! the same thread fails with [`SandboxError::Reentrant`]. Disable `chdir` and
//! address files through [`SandboxContext`] to run sandboxes concurrently.
//!
//! ## Collaborators
//!
//! - [`frontmatter`]: YAML metadata blocks at the head of documents
//! - [`convert`]: document conversion through pandoc
//! - [`typeset`]: sandboxed LaTeX runs

pub mod convert;
pub mod error;
pub mod frontmatter;
pub mod prelude;
pub mod process;
pub mod sandbox;
pub mod typeset;

// Re-export main types at crate root for convenience
pub use error::{Failure, Result, RunError, SandboxError};
pub use process::ToolOutput;
pub use sandbox::capture::{DebugPolicy, FailureCapture, CAPTURE_MARKER};
pub use sandbox::config::{SandboxConfig, SandboxConfigBuilder};
pub use sandbox::directory::{SandboxDirectory, SessionState};
pub use sandbox::executor::{SandboxContext, SandboxRunner};
pub use sandbox::matcher::PathMatcher;
pub use sandbox::transfer::{ExportStage, ImportStage};
