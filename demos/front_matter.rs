//! Example of reading and merging document front matter.
//!
//! Run with: cargo run --example front_matter

use std::fs;

use serde_yaml::Mapping;
use workdir_sandbox::convert::{Conversion, DocumentFormat};
use workdir_sandbox::frontmatter;

fn main() -> anyhow::Result<()> {
    println!("=== Front Matter Example ===\n");

    let dir = tempfile::tempdir()?;
    let letter = dir.path().join("letter.md");
    fs::write(&letter, "---\ntitle: Draft\nauthor: Ada\n---\n\nDear reader,\n")?;

    let meta = frontmatter::read(&letter)?;
    println!("Existing metadata: {:?}", meta);

    let update: Mapping = serde_yaml::from_str("title: Final\ndate: 2024-05-01")?;
    frontmatter::write(&letter, &update)?;
    println!("Updated document:\n{}", fs::read_to_string(&letter)?);

    let conversion = Conversion::new(&letter, "letter.pdf", "letter.tex")
        .to_format(DocumentFormat::Latex)
        .arg("--pdf-engine=xelatex");
    let command = conversion.command()?;
    println!(
        "Converter invocation: {} {:?}",
        command.get_program().to_string_lossy(),
        command.get_args().collect::<Vec<_>>()
    );

    Ok(())
}
