//! Launching external tools.

use std::process::Command;

use tracing::debug;

use crate::error::{Result, SandboxError};

/// Result of running an external tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Captured stdout output.
    pub stdout: String,
    /// Captured stderr output.
    pub stderr: String,
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    /// Check if the tool exited with code 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `command` to completion and capture its output.
///
/// The exit status is reported, not judged.
pub fn execute(command: &mut Command) -> Result<ToolOutput> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(
        program = %program,
        args = ?command.get_args().collect::<Vec<_>>(),
        "launching external tool"
    );

    let output = command.output().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SandboxError::ToolNotFound(program.clone())
        } else {
            SandboxError::Spawn {
                program: program.clone(),
                source,
            }
        }
    })?;

    let result = ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
    };
    debug!(program = %program, exit_code = ?result.exit_code, "external tool finished");
    Ok(result)
}
