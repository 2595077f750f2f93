//! Running an operation inside a sandbox.

use std::path::{Path, PathBuf};

use tracing::{debug, debug_span, warn};

use crate::error::{Failure, RunError, SandboxError};
use crate::sandbox::capture::FailureCapture;
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::directory::SandboxDirectory;
use crate::sandbox::transfer::{ExportStage, ImportStage};

/// What the operation sees of its sandbox.
#[derive(Debug)]
pub struct SandboxContext<'a> {
    root: &'a Path,
    base: &'a Path,
    imported: &'a [PathBuf],
}

impl SandboxContext<'_> {
    /// Absolute sandbox root.
    pub fn root(&self) -> &Path {
        self.root
    }

    /// Resolve `relative` inside the sandbox.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// The caller's directory: imports came from here and exports go here.
    pub fn base_dir(&self) -> &Path {
        self.base
    }

    /// Sandbox paths of the imported files, in copy order.
    pub fn imported(&self) -> &[PathBuf] {
        self.imported
    }
}

/// Runs operations in fresh, disposable sandboxes.
#[derive(Debug, Clone, Default)]
pub struct SandboxRunner {
    config: SandboxConfig,
}

impl SandboxRunner {
    /// Create a runner with the given configuration.
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// The runner's configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `operation` in a new sandbox.
    ///
    /// Imports are copied in first. On success the working directory is
    /// restored, exports are copied out and the value is returned. On failure
    /// the working directory is restored, the sandbox is preserved in the
    /// debug directory if configured, and the failure is returned unchanged.
    /// The sandbox is removed on every path.
    pub fn run<T, E, F>(&self, operation: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(&SandboxContext<'_>) -> Result<T, E>,
    {
        let mut session = SandboxDirectory::create(&self.config).map_err(RunError::Sandbox)?;

        let span = debug_span!("sandbox", root = %session.root().display());
        let _enter = span.enter();

        session
            .activate(self.config.chdir)
            .map_err(RunError::Sandbox)?;

        // Entering took the working-directory lock, so the recorded directory
        // is the caller's and not another run's sandbox.
        let base = match session.entered_from() {
            Some(cwd) => self.config.base_dir_from(cwd),
            None => self.config.resolve_base_dir().map_err(RunError::Sandbox)?,
        };

        match self.attempt(&session, &base, operation) {
            Ok(value) => self.complete(session, &base).map(|()| value),
            Err(failure) => Err(self.fail(session, &base, failure)),
        }
    }

    /// Run `operation` on the blocking thread pool.
    ///
    /// Sandboxes with `chdir` disabled run fully in parallel; those that switch
    /// the working directory still take turns.
    pub async fn run_async<T, E, F>(&self, operation: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(&SandboxContext<'_>) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let runner = self.clone();
        match tokio::task::spawn_blocking(move || runner.run(operation)).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(RunError::Sandbox(SandboxError::TaskFailed(err.to_string()))),
        }
    }

    fn attempt<T, E, F>(
        &self,
        session: &SandboxDirectory,
        base: &Path,
        operation: F,
    ) -> Result<T, Failure<E>>
    where
        F: FnOnce(&SandboxContext<'_>) -> Result<T, E>,
    {
        let imported = ImportStage::new(base, &self.config.imports)
            .run(session.root())
            .map_err(Failure::Import)?;

        let context = SandboxContext {
            root: session.root(),
            base,
            imported: &imported,
        };
        operation(&context).map_err(Failure::Operation)
    }

    fn complete<E>(&self, mut session: SandboxDirectory, base: &Path) -> Result<(), RunError<E>> {
        if let Err(source) = session.deactivate(true) {
            discard(&mut session);
            return Err(RunError::Restore {
                source,
                masked: None,
            });
        }

        let exported = ExportStage::new(session.root(), &self.config.exports).run(base);
        discard(&mut session);
        exported.map_err(RunError::Export)?;
        debug!("sandbox run completed");
        Ok(())
    }

    fn fail<E>(&self, mut session: SandboxDirectory, base: &Path, failure: Failure<E>) -> RunError<E> {
        if let Err(source) = session.deactivate(false) {
            discard(&mut session);
            return RunError::Restore {
                source,
                masked: Some(failure),
            };
        }

        if self.config.copy_on_error {
            let capture = FailureCapture::new(self.config.debug_dir_in(base), self.config.debug_policy);
            if let Err(source) = capture.preserve(session.root()) {
                discard(&mut session);
                return RunError::Capture {
                    source,
                    original: failure,
                };
            }
        }

        discard(&mut session);
        failure.into()
    }
}

fn discard(session: &mut SandboxDirectory) {
    if let Err(err) = session.destroy() {
        warn!(root = %session.root().display(), "failed to remove sandbox: {err}");
    }
}
