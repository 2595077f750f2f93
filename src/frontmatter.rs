//! YAML front matter at the head of text documents.
//!
//! A block is opened by a `---` line and closed by the next `---` line.
//! Keys keep their insertion order through parsing, merging and serialization.

use std::fs;
use std::ops::Range;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::{Result, SandboxError};

const DELIMITER: &str = "---";

/// Parse the front matter of `text`.
///
/// Text without a block yields an empty mapping.
pub fn parse(text: &str) -> Result<Mapping> {
    match locate(text) {
        Some(range) => to_mapping(&text[range]),
        None => Ok(Mapping::new()),
    }
}

/// Merge `new` into `existing`.
///
/// Keys already present keep their position and take the new value; other
/// keys are appended in the order `new` lists them.
pub fn merge(existing: &Mapping, new: &Mapping) -> Mapping {
    let mut merged = existing.clone();
    for (key, value) in new {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Merge and render as YAML, without delimiters.
pub fn merge_and_serialize(existing: &Mapping, new: &Mapping) -> Result<String> {
    Ok(serde_yaml::to_string(&merge(existing, new))?)
}

/// Return `text` with `new` merged into its front matter.
///
/// A block is prepended when the text has none. Everything outside the block
/// is left untouched.
pub fn apply(text: &str, new: &Mapping) -> Result<String> {
    match locate(text) {
        Some(range) => {
            let existing = to_mapping(&text[range.clone()])?;
            let yaml = merge_and_serialize(&existing, new)?;
            Ok(format!("{}{}{}", &text[..range.start], yaml, &text[range.end..]))
        }
        None => {
            let yaml = serde_yaml::to_string(new)?;
            Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{text}"))
        }
    }
}

/// Read the front matter of a file.
pub fn read(path: impl AsRef<Path>) -> Result<Mapping> {
    parse(&fs::read_to_string(path)?)
}

/// Contents of `path` with `new` merged into its front matter.
///
/// A missing file is treated as an empty document.
pub fn update(path: impl AsRef<Path>, new: &Mapping) -> Result<String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err.into()),
    };
    apply(&text, new)
}

/// Merge `new` into the front matter of `path` and write the file back.
pub fn write(path: impl AsRef<Path>, new: &Mapping) -> Result<()> {
    let path = path.as_ref();
    let updated = update(path, new)?;
    fs::write(path, updated)?;
    Ok(())
}

/// Byte range of the YAML between the opening and closing delimiter lines.
fn locate(text: &str) -> Option<Range<usize>> {
    let open = delimiter_lines(text, 0).next()?;
    let after = open + DELIMITER.len();
    let start = after + line_break_len(&text[after..]);
    // A lone `---` line is a horizontal rule, not a block.
    delimiter_lines(text, start).next().map(|end| start..end)
}

/// Offsets of `---` lines at or after `from`.
fn delimiter_lines(text: &str, from: usize) -> impl Iterator<Item = usize> + '_ {
    text[from..]
        .match_indices(DELIMITER)
        .map(move |(offset, _)| from + offset)
        .filter(move |&at| {
            let line_start = at == 0 || text[..at].ends_with('\n');
            let rest = &text[at + DELIMITER.len()..];
            line_start && (rest.is_empty() || line_break_len(rest) > 0)
        })
}

fn line_break_len(rest: &str) -> usize {
    if rest.starts_with("\r\n") {
        2
    } else if rest.starts_with('\n') {
        1
    } else {
        0
    }
}

fn to_mapping(yaml: &str) -> Result<Mapping> {
    match serde_yaml::from_str(yaml)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        Value::Sequence(_) => Err(SandboxError::FrontMatterShape("a sequence")),
        Value::String(_) => Err(SandboxError::FrontMatterShape("a string")),
        Value::Number(_) => Err(SandboxError::FrontMatterShape("a number")),
        Value::Bool(_) => Err(SandboxError::FrontMatterShape("a boolean")),
        Value::Tagged(_) => Err(SandboxError::FrontMatterShape("a tagged value")),
    }
}
