//! Example of concurrent sandboxes using explicit sandbox paths.
//!
//! With `chdir` disabled the process working directory is never touched, so
//! independent runs can proceed in parallel on tokio's blocking pool.
//!
//! Run with: cargo run --example concurrent_runs

use std::fs;
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use workdir_sandbox::{SandboxConfig, SandboxRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Concurrent Runs Example ===\n");

    let output = tempfile::tempdir()?;
    let runner = SandboxRunner::new(
        SandboxConfig::builder()
            .base_dir(output.path())
            .chdir(false)
            .export("*.txt")
            .build(),
    );

    let tasks = vec![("squares", 100u64), ("cubes", 50), ("triangles", 200)];

    println!("Starting {} concurrent runs...\n", tasks.len());
    let start = Instant::now();

    let mut handles = Vec::new();
    for (name, limit) in tasks {
        let runner = runner.clone();
        handles.push(tokio::spawn(async move {
            runner
                .run_async(move |sandbox| {
                    let values: Vec<String> = (1..=limit)
                        .map(|n| match name {
                            "squares" => n * n,
                            "cubes" => n * n * n,
                            _ => n * (n + 1) / 2,
                        })
                        .map(|v| v.to_string())
                        .collect();
                    fs::write(sandbox.path(format!("{name}.txt")), values.join("\n"))?;
                    Ok::<_, std::io::Error>((name, sandbox.root().to_path_buf()))
                })
                .await
        }));
    }

    println!("Results:");
    println!("{:-<60}", "");
    for handle in handles {
        match handle.await? {
            Ok((name, root)) => println!("{}: built in {}", name, root.display()),
            Err(e) => println!("Run error: {}", e),
        }
    }
    println!("{:-<60}", "");

    println!("\nTotal wall-clock time: {:?}", start.elapsed());
    for entry in fs::read_dir(output.path())? {
        println!("  exported {}", entry?.file_name().to_string_lossy());
    }

    Ok(())
}
