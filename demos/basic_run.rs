//! Basic sandboxed run: import sources, build in the sandbox, export results.
//!
//! Run with: cargo run --example basic_run
//!
//! Set `RUST_LOG=workdir_sandbox=debug` to watch the sandbox lifecycle.

use std::fs;

use tracing_subscriber::EnvFilter;
use workdir_sandbox::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Basic Run Example ===\n");

    let project = tempfile::tempdir()?;
    fs::write(project.path().join("intro.md"), "# Intro\n")?;
    fs::write(project.path().join("usage.md"), "# Usage\n")?;
    fs::write(project.path().join("draft.txt"), "not part of the build\n")?;

    let config = SandboxConfig::builder()
        .base_dir(project.path())
        .import("*.md")
        .export("site/*.html")
        .chdir(false)
        .build();

    let runner = SandboxRunner::new(config);
    let pages = runner.run(|sandbox| {
        println!("Sandbox root: {}", sandbox.root().display());
        fs::create_dir(sandbox.path("site"))?;
        for source in sandbox.imported() {
            let text = fs::read_to_string(source)?;
            let Some(stem) = source.file_stem() else {
                continue;
            };
            let page = sandbox.path("site").join(stem).with_extension("html");
            fs::write(page, format!("<pre>{text}</pre>\n"))?;
        }
        Ok::<_, std::io::Error>(sandbox.imported().len())
    })?;

    println!("Rendered {pages} pages");
    for entry in fs::read_dir(project.path())? {
        println!("  {}", entry?.file_name().to_string_lossy());
    }

    Ok(())
}
