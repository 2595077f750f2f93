//! Example demonstrating failure handling.
//!
//! This example shows:
//! - The operation's own error coming back unchanged
//! - The failed sandbox preserved under `debug/`
//! - A populated `debug/` reported next to the original failure
//!
//! Run with: cargo run --example error_handling

use std::fs;

use tracing_subscriber::EnvFilter;
use workdir_sandbox::{DebugPolicy, RunError, SandboxConfig, SandboxRunner};

#[derive(Debug)]
struct CompileError {
    line: u32,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "undefined control sequence on line {}", self.line)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Error Handling Example ===\n");

    let project = tempfile::tempdir()?;

    // Example 1: the operation fails, the sandbox is preserved
    println!("--- Test 1: Operation failure ---");
    {
        let runner = SandboxRunner::new(
            SandboxConfig::builder()
                .base_dir(project.path())
                .chdir(false)
                .build(),
        );

        let result = runner.run(|sandbox| {
            fs::write(sandbox.path("main.log"), "! Undefined control sequence.\nl.12\n")
                .map_err(|_| CompileError { line: 0 })?;
            Err::<(), _>(CompileError { line: 12 })
        });

        match result {
            Err(RunError::Operation(err)) => {
                println!("Operation failed: {}", err);
                println!("Original line number intact: {}", err.line);
            }
            other => println!("Unexpected outcome: {:?}", other.map(|_| ())),
        }

        let log = project.path().join("debug").join("main.log");
        println!("Preserved log:\n{}", fs::read_to_string(log)?);
    }
    println!();

    // Example 2: the previous capture blocks a new one
    println!("--- Test 2: Debug directory already populated ---");
    {
        let runner = SandboxRunner::new(
            SandboxConfig::builder()
                .base_dir(project.path())
                .chdir(false)
                .debug_policy(DebugPolicy::FailIfPopulated)
                .build(),
        );

        let err = match runner.run(|_| Err::<(), _>(CompileError { line: 40 })) {
            Ok(()) => anyhow::bail!("operation unexpectedly succeeded"),
            Err(err) => err,
        };
        println!("Combined error: {}", err);
        if let Some(original) = err.operation_error() {
            println!("Original failure still available: {}", original);
        }
    }

    Ok(())
}
