//! Lifecycle of one disposable sandbox directory.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Result, SandboxError};
use crate::sandbox::config::SandboxConfig;

/// Serializes every sandbox that switches the process working directory.
static CHDIR_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static CHDIR_HELD: Cell<bool> = const { Cell::new(false) };
}

/// Where a sandbox is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Allocated, not yet in use.
    Created,
    /// Ready for the operation.
    Active,
    /// Deactivated after a successful operation.
    Completed,
    /// Deactivated after a failure.
    Failed,
    /// Removed from disk.
    Destroyed,
}

/// One uniquely named, disposable directory.
///
/// Dropping it restores the working directory (if it was switched) and then
/// removes the directory, so every exit path releases both.
#[derive(Debug)]
pub struct SandboxDirectory {
    // Declared first so the working directory is restored before removal.
    cwd: Option<CwdGuard>,
    dir: Option<TempDir>,
    root: PathBuf,
    state: SessionState,
}

impl SandboxDirectory {
    /// Allocate a fresh sandbox directory.
    pub fn create(config: &SandboxConfig) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&config.prefix);
        let dir = match &config.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(SandboxError::Allocation)?;

        // Canonical so it compares equal to `current_dir()` once entered.
        let root = dir.path().canonicalize().map_err(SandboxError::Allocation)?;
        debug!(root = %root.display(), "allocated sandbox");

        Ok(Self {
            cwd: None,
            dir: Some(dir),
            root,
            state: SessionState::Created,
        })
    }

    /// Absolute path of the sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the process working directory currently points into this sandbox.
    pub fn owns_cwd(&self) -> bool {
        self.cwd.is_some()
    }

    /// The working directory recorded when the sandbox was entered.
    ///
    /// Read while holding the working-directory lock, so it is the caller's
    /// directory even when other runs switch directories concurrently.
    pub fn entered_from(&self) -> Option<&Path> {
        self.cwd.as_ref().map(|guard| guard.original.as_path())
    }

    /// Make the sandbox ready for use, optionally switching into it.
    pub fn activate(&mut self, chdir: bool) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(SandboxError::Config(format!(
                "cannot activate sandbox in state {:?}",
                self.state
            )));
        }
        if chdir {
            self.cwd = Some(CwdGuard::enter(&self.root)?);
        }
        self.state = SessionState::Active;
        Ok(())
    }

    /// Leave the sandbox, restoring the recorded working directory if one was switched.
    ///
    /// The restore is attempted exactly once even when it fails.
    pub fn deactivate(&mut self, succeeded: bool) -> Result<()> {
        self.state = if succeeded {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        match self.cwd.take() {
            Some(guard) => guard.restore(),
            None => Ok(()),
        }
    }

    /// Remove the sandbox from disk. Calling it again is a no-op.
    pub fn destroy(&mut self) -> Result<()> {
        if let Some(guard) = self.cwd.take() {
            guard.restore()?;
        }
        self.state = SessionState::Destroyed;
        match self.dir.take() {
            Some(dir) => {
                debug!(root = %self.root.display(), "removing sandbox");
                dir.close().map_err(SandboxError::Io)
            }
            None => Ok(()),
        }
    }
}

/// Read the process working directory once no sandbox on another thread holds it.
///
/// On a thread that is itself inside a sandbox this is that sandbox.
pub(crate) fn current_dir() -> Result<PathBuf> {
    if CHDIR_HELD.with(Cell::get) {
        return std::env::current_dir().map_err(SandboxError::CurrentDir);
    }
    let _lock = CHDIR_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    std::env::current_dir().map_err(SandboxError::CurrentDir)
}

/// Holds the process working directory inside a sandbox.
#[derive(Debug)]
struct CwdGuard {
    original: PathBuf,
    restored: bool,
    _lock: MutexGuard<'static, ()>,
}

impl CwdGuard {
    fn enter(target: &Path) -> Result<Self> {
        if CHDIR_HELD.with(Cell::get) {
            return Err(SandboxError::Reentrant);
        }
        let lock = CHDIR_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let original = std::env::current_dir().map_err(SandboxError::CurrentDir)?;
        std::env::set_current_dir(target).map_err(|source| SandboxError::Activate {
            path: target.to_path_buf(),
            source,
        })?;
        CHDIR_HELD.with(|held| held.set(true));
        debug!(from = %original.display(), to = %target.display(), "entered sandbox");

        Ok(Self {
            original,
            restored: false,
            _lock: lock,
        })
    }

    fn restore(mut self) -> Result<()> {
        self.restored = true;
        std::env::set_current_dir(&self.original).map_err(|source| SandboxError::Restore {
            path: self.original.clone(),
            source,
        })?;
        debug!(to = %self.original.display(), "restored working directory");
        Ok(())
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(err) = std::env::set_current_dir(&self.original) {
                warn!(
                    path = %self.original.display(),
                    "failed to restore working directory: {err}"
                );
            }
        }
        CHDIR_HELD.with(|held| held.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config_in(root: &Path) -> SandboxConfig {
        SandboxConfig::builder().temp_root(root).build()
    }

    #[test]
    fn test_create_and_destroy() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = SandboxDirectory::create(&config_in(tmp.path())).unwrap();

        assert_eq!(sandbox.state(), SessionState::Created);
        assert!(sandbox.root().is_dir());
        assert!(sandbox
            .root()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("sandbox-"));

        let root = sandbox.root().to_path_buf();
        sandbox.destroy().unwrap();
        assert!(!root.exists());
        assert_eq!(sandbox.state(), SessionState::Destroyed);

        // second call is a no-op
        sandbox.destroy().unwrap();
    }

    #[test]
    fn test_unique_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let a = SandboxDirectory::create(&config_in(tmp.path())).unwrap();
        let b = SandboxDirectory::create(&config_in(tmp.path())).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_allocation_failure() {
        let config = SandboxConfig::builder()
            .temp_root("/nonexistent/sandbox/root")
            .build();
        let err = SandboxDirectory::create(&config).unwrap_err();
        assert!(matches!(err, SandboxError::Allocation(_)));
    }

    #[test]
    fn test_activate_without_chdir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = SandboxDirectory::create(&config_in(tmp.path())).unwrap();
        sandbox.activate(false).unwrap();

        assert_eq!(sandbox.state(), SessionState::Active);
        assert!(!sandbox.owns_cwd());
        sandbox.deactivate(true).unwrap();
        assert_eq!(sandbox.state(), SessionState::Completed);
    }

    #[test]
    #[serial]
    fn test_activate_with_chdir_restores() {
        let tmp = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();
        let mut sandbox = SandboxDirectory::create(&config_in(tmp.path())).unwrap();

        sandbox.activate(true).unwrap();
        assert_eq!(std::env::current_dir().unwrap(), sandbox.root());

        sandbox.deactivate(false).unwrap();
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert_eq!(sandbox.state(), SessionState::Failed);
    }

    #[test]
    #[serial]
    fn test_drop_restores_and_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();
        let root = {
            let mut sandbox = SandboxDirectory::create(&config_in(tmp.path())).unwrap();
            sandbox.activate(true).unwrap();
            sandbox.root().to_path_buf()
        };
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(!root.exists());
    }

    #[test]
    #[serial]
    fn test_reentrant_chdir_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut outer = SandboxDirectory::create(&config_in(tmp.path())).unwrap();
        let mut inner = SandboxDirectory::create(&config_in(tmp.path())).unwrap();

        outer.activate(true).unwrap();
        let err = inner.activate(true).unwrap_err();
        assert!(matches!(err, SandboxError::Reentrant));

        // path-threaded sandboxes are still fine
        let mut threaded = SandboxDirectory::create(&config_in(tmp.path())).unwrap();
        threaded.activate(false).unwrap();

        outer.destroy().unwrap();
    }

    #[test]
    fn test_double_activate_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = SandboxDirectory::create(&config_in(tmp.path())).unwrap();
        sandbox.activate(false).unwrap();
        assert!(sandbox.activate(false).is_err());
    }
}
