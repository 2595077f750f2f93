//! Sandbox configuration with builder pattern.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::sandbox::capture::DebugPolicy;
use crate::sandbox::directory;

/// Configuration for one kind of sandboxed run.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Glob patterns copied into the sandbox before the operation runs.
    pub imports: Vec<String>,
    /// Glob patterns copied out of the sandbox after a successful run.
    pub exports: Vec<String>,
    /// Switch the process working directory into the sandbox while the operation runs.
    pub chdir: bool,
    /// Preserve the sandbox contents in the debug directory on failure.
    pub copy_on_error: bool,
    /// Directory imports are matched against and exports land in.
    /// `None` means the process working directory at the start of the run.
    pub base_dir: Option<PathBuf>,
    /// Debug capture location, relative to the base directory unless absolute.
    pub debug_dir: PathBuf,
    /// What to do when the debug directory already holds a capture.
    pub debug_policy: DebugPolicy,
    /// Where sandboxes are allocated. `None` means the system temp directory.
    pub temp_root: Option<PathBuf>,
    /// Name prefix of sandbox directories.
    pub prefix: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            imports: Vec::new(),
            exports: Vec::new(),
            chdir: true,
            copy_on_error: true,
            base_dir: None,
            debug_dir: PathBuf::from("debug"),
            debug_policy: DebugPolicy::default(),
            temp_root: None,
            prefix: "sandbox-".to_string(),
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    /// Resolve the caller's directory for this run as an absolute path.
    ///
    /// The working directory is read only when `base_dir` is unset or relative,
    /// and never while another thread's sandbox has switched it.
    pub fn resolve_base_dir(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(dir) if dir.is_absolute() => Ok(dir.clone()),
            _ => Ok(self.base_dir_from(&directory::current_dir()?)),
        }
    }

    /// Resolve the caller's directory against a known working directory.
    pub fn base_dir_from(&self, cwd: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        }
    }

    /// Absolute debug directory for a given base directory.
    pub fn debug_dir_in(&self, base: &Path) -> PathBuf {
        if self.debug_dir.is_absolute() {
            self.debug_dir.clone()
        } else {
            base.join(&self.debug_dir)
        }
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    imports: Vec<String>,
    exports: Vec<String>,
    chdir: Option<bool>,
    copy_on_error: Option<bool>,
    base_dir: Option<PathBuf>,
    debug_dir: Option<PathBuf>,
    debug_policy: Option<DebugPolicy>,
    temp_root: Option<PathBuf>,
    prefix: Option<String>,
}

impl SandboxConfigBuilder {
    /// Add one import pattern.
    pub fn import(mut self, pattern: impl Into<String>) -> Self {
        self.imports.push(pattern.into());
        self
    }

    /// Add several import patterns.
    pub fn imports<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add one export pattern.
    pub fn export(mut self, pattern: impl Into<String>) -> Self {
        self.exports.push(pattern.into());
        self
    }

    /// Add several export patterns.
    pub fn exports<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Set whether the process working directory follows the sandbox.
    pub fn chdir(mut self, chdir: bool) -> Self {
        self.chdir = Some(chdir);
        self
    }

    /// Set whether a failed sandbox is preserved for inspection.
    pub fn copy_on_error(mut self, copy: bool) -> Self {
        self.copy_on_error = Some(copy);
        self
    }

    /// Set the caller's directory explicitly.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Set the debug capture location.
    pub fn debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Set the policy for an already populated debug directory.
    pub fn debug_policy(mut self, policy: DebugPolicy) -> Self {
        self.debug_policy = Some(policy);
        self
    }

    /// Allocate sandboxes under this directory instead of the system temp area.
    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    /// Set the sandbox directory name prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            imports: self.imports,
            exports: self.exports,
            chdir: self.chdir.unwrap_or(default.chdir),
            copy_on_error: self.copy_on_error.unwrap_or(default.copy_on_error),
            base_dir: self.base_dir.or(default.base_dir),
            debug_dir: self.debug_dir.unwrap_or(default.debug_dir),
            debug_policy: self.debug_policy.unwrap_or(default.debug_policy),
            temp_root: self.temp_root.or(default.temp_root),
            prefix: self.prefix.unwrap_or(default.prefix),
        }
    }
}
