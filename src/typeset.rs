//! One-shot typesetting of a LaTeX project inside a sandbox.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use glob::Pattern;

use crate::error::{Result, RunError, SandboxError};
use crate::process::{self, ToolOutput};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::directory;
use crate::sandbox::executor::SandboxRunner;

const SOURCE_EXTENSION: &str = "tex";

/// First `.tex` file in `dir`, by name.
pub fn find_source(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let mut sources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) && path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    sources.into_iter().next().ok_or_else(|| SandboxError::NoSource {
        dir: dir.to_path_buf(),
        extension: SOURCE_EXTENSION,
    })
}

/// Runs a TeX engine non-interactively.
#[derive(Debug, Clone)]
pub struct Typesetter {
    program: String,
    args: Vec<String>,
    include_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

impl Default for Typesetter {
    fn default() -> Self {
        Self {
            program: "xelatex".to_string(),
            args: Vec::new(),
            include_dir: None,
            output_dir: None,
        }
    }
}

impl Typesetter {
    /// A typesetter using `xelatex`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different engine executable.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Append one extra argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append extra arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extra directory the engine searches for inputs.
    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = Some(dir.into());
        self
    }

    /// Where sandboxed runs export results and keep debug captures.
    /// Defaults to the process working directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Build the engine invocation for `source`, run from `cwd`.
    pub fn command(&self, source: &Path, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .current_dir(cwd)
            .arg("-interaction=nonstopmode")
            .arg(source);
        if let Some(dir) = &self.include_dir {
            let mut flag = std::ffi::OsString::from("-include-directory=");
            flag.push(dir);
            command.arg(flag);
        }
        command.args(&self.args);
        command
    }

    /// Typeset `source` from `cwd`. The exit status is returned, not checked.
    pub fn run(&self, source: &Path, cwd: &Path) -> Result<ToolOutput> {
        process::execute(&mut self.command(source, cwd))
    }

    /// Sandbox settings for typesetting the project in `folder`.
    ///
    /// A relative `folder` is taken from the working directory, not from the
    /// output directory.
    pub fn sandbox_config<S: AsRef<str>>(&self, folder: &Path, captures: &[S]) -> Result<SandboxConfig> {
        let folder = absolute(folder)?;
        let folder = folder.to_str().ok_or_else(|| {
            SandboxError::Config(format!("project folder {} is not valid UTF-8", folder.display()))
        })?;
        let mut builder = SandboxConfig::builder()
            .import(format!("{}/*", Pattern::escape(folder.trim_end_matches('/'))))
            .exports(captures.iter().map(|c| c.as_ref().to_string()))
            .chdir(false);
        if let Some(dir) = &self.output_dir {
            builder = builder.base_dir(dir);
        }
        Ok(builder.build())
    }

    /// Typeset the first `.tex` file of `folder` in a sandbox and export `captures`.
    ///
    /// The folder's files are copied in flat; the engine runs with the sandbox
    /// as its working directory.
    pub fn run_in_sandbox<S: AsRef<str>>(
        &self,
        folder: impl AsRef<Path>,
        captures: &[S],
    ) -> std::result::Result<ToolOutput, RunError<SandboxError>> {
        let folder = absolute(folder.as_ref()).map_err(RunError::Sandbox)?;
        let folder = folder.as_path();
        let source = find_source(folder).map_err(RunError::Sandbox)?;
        let Some(name) = source.file_name().map(PathBuf::from) else {
            return Err(RunError::Sandbox(SandboxError::NoSource {
                dir: folder.to_path_buf(),
                extension: SOURCE_EXTENSION,
            }));
        };

        let config = self.sandbox_config(folder, captures).map_err(RunError::Sandbox)?;
        SandboxRunner::new(config).run(|sandbox| self.run(&name, sandbox.root()))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(directory::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::ffi::OsStr;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.tex"), "\\documentclass{article}").unwrap();
        fs::write(dir.path().join("a.tex"), "\\documentclass{article}").unwrap();
        fs::write(dir.path().join("refs.bib"), "@book{}").unwrap();
        fs::create_dir(dir.path().join("z.tex")).unwrap();
        dir
    }

    #[test]
    fn test_find_source() {
        let dir = project();
        assert_eq!(find_source(dir.path()).unwrap(), dir.path().join("a.tex"));

        let empty = tempfile::tempdir().unwrap();
        let err = find_source(empty.path()).unwrap_err();
        assert!(matches!(err, SandboxError::NoSource { extension: "tex", .. }));
    }

    #[test]
    fn test_command_layout() {
        let command = Typesetter::new()
            .include_dir("/opt/tex inputs")
            .arg("-shell-escape")
            .command(Path::new("main.tex"), Path::new("/work"));

        assert_eq!(command.get_program(), "xelatex");
        assert_eq!(command.get_current_dir(), Some(Path::new("/work")));
        let args: Vec<&OsStr> = command.get_args().collect();
        assert_eq!(
            args,
            vec![
                "-interaction=nonstopmode",
                "main.tex",
                "-include-directory=/opt/tex inputs",
                "-shell-escape",
            ]
        );
    }

    #[test]
    fn test_sandbox_config() {
        let out = tempfile::tempdir().unwrap();
        let config = Typesetter::new()
            .output_dir(out.path())
            .sandbox_config(Path::new("/projects/thesis[v2]/"), &["*.pdf"])
            .unwrap();

        assert_eq!(config.imports, vec!["/projects/thesis[[]v2[]]/*"]);
        assert_eq!(config.exports, vec!["*.pdf"]);
        assert!(!config.chdir);
        assert_eq!(config.base_dir.as_deref(), Some(out.path()));
    }

    #[test]
    fn test_missing_engine_is_captured() {
        let dir = project();
        let out = tempfile::tempdir().unwrap();

        let err = Typesetter::new()
            .program("no-such-tex-engine-7731")
            .output_dir(out.path())
            .run_in_sandbox(dir.path(), &["*.pdf"])
            .unwrap_err();

        assert!(err.operation_error().is_some_and(SandboxError::is_tool_not_found));
        // imports are preserved for inspection
        assert!(out.path().join("debug").join("a.tex").exists());
        assert!(out.path().join("debug").join("refs.bib").exists());
        assert!(!out.path().join("a.pdf").exists());
    }

    #[test]
    #[serial]
    fn test_relative_folder_is_imported() {
        let workspace = tempfile::tempdir().unwrap();
        fs::create_dir(workspace.path().join("project")).unwrap();
        fs::write(workspace.path().join("project").join("a.tex"), "\\documentclass{article}").unwrap();
        fs::write(workspace.path().join("project").join("refs.bib"), "@book{}").unwrap();
        let out = tempfile::tempdir().unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(workspace.path()).unwrap();
        let result = Typesetter::new()
            .program("no-such-tex-engine-7731")
            .output_dir(out.path())
            .run_in_sandbox("project", &["*.pdf"]);
        std::env::set_current_dir(previous).unwrap();

        assert!(result.unwrap_err().operation_error().is_some_and(SandboxError::is_tool_not_found));
        assert!(out.path().join("debug").join("a.tex").exists());
        assert!(out.path().join("debug").join("refs.bib").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_in_sandbox_exports_results() {
        use std::os::unix::fs::PermissionsExt;

        let dir = project();
        let out = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();

        // stand-in engine: $1 is the interaction flag, $2 the source
        let engine = bin.path().join("fake-tex");
        fs::write(
            &engine,
            "#!/bin/sh\nname=$(basename \"$2\" .tex)\necho pdf > \"$name.pdf\"\necho log > \"$name.log\"\n",
        )
        .unwrap();
        fs::set_permissions(&engine, fs::Permissions::from_mode(0o755)).unwrap();

        let result = Typesetter::new()
            .program(engine.to_string_lossy())
            .output_dir(out.path())
            .run_in_sandbox(dir.path(), &["*.pdf"])
            .unwrap();

        assert!(result.is_success());
        assert_eq!(fs::read_to_string(out.path().join("a.pdf")).unwrap(), "pdf\n");
        assert!(!out.path().join("a.log").exists());
        assert!(!out.path().join("debug").exists());
        // the project folder is untouched
        assert!(!dir.path().join("a.pdf").exists());
    }
}
