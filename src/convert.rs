//! Document conversion through an external converter (pandoc by default).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::error::{Result, SandboxError};
use crate::frontmatter;
use crate::process::{self, ToolOutput};

/// Document formats understood by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// HTML.
    Html,
    /// Pandoc Markdown.
    Markdown,
    /// LaTeX, also used for PDF output.
    Latex,
    /// Word document.
    Docx,
    /// OpenDocument text.
    Odt,
    /// Rich text.
    Rtf,
    /// Plain text.
    Plain,
    /// EPUB v2.
    Epub,
    /// EPUB v3.
    Epub3,
    /// PowerPoint presentation.
    Pptx,
    /// Legacy PowerPoint presentation.
    Ppt,
    /// OpenDocument presentation.
    Odp,
    /// OpenDocument spreadsheet.
    Ods,
}

impl DocumentFormat {
    /// Format for a file extension. PDF output goes through LaTeX.
    pub fn from_extension(extension: &str) -> Option<Self> {
        Some(match extension {
            "html" => Self::Html,
            "md" => Self::Markdown,
            "tex" | "pdf" => Self::Latex,
            "docx" => Self::Docx,
            "odt" => Self::Odt,
            "rtf" => Self::Rtf,
            "txt" => Self::Plain,
            "epub" => Self::Epub,
            "epub3" => Self::Epub3,
            "pptx" => Self::Pptx,
            "ppt" => Self::Ppt,
            "odp" => Self::Odp,
            "ods" => Self::Ods,
            _ => return None,
        })
    }

    /// Format for a path, from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// The converter's name for this format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Latex => "latex",
            Self::Docx => "docx",
            Self::Odt => "odt",
            Self::Rtf => "rtf",
            Self::Plain => "plain",
            Self::Epub => "epub",
            Self::Epub3 => "epub3",
            Self::Pptx => "pptx",
            Self::Ppt => "ppt",
            Self::Odp => "odp",
            Self::Ods => "ods",
        }
    }
}

/// One converter invocation.
#[derive(Debug, Clone)]
pub struct Conversion {
    program: String,
    input: PathBuf,
    output: PathBuf,
    template: PathBuf,
    from: Option<DocumentFormat>,
    to: Option<DocumentFormat>,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl Conversion {
    /// Convert `input` into `output` using `template`.
    ///
    /// Formats default to those implied by the input's and the template's extensions.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: "pandoc".to_string(),
            input: input.into(),
            output: output.into(),
            template: template.into(),
            from: None,
            to: None,
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Use a different converter executable.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the source format.
    pub fn from_format(mut self, format: DocumentFormat) -> Self {
        self.from = Some(format);
        self
    }

    /// Override the target format.
    pub fn to_format(mut self, format: DocumentFormat) -> Self {
        self.to = Some(format);
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

    /// Run the converter from this directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Build the process invocation. Every value is passed as its own argument.
    pub fn command(&self) -> Result<Command> {
        let from = self.resolve(self.from, &self.input)?;
        let to = self.resolve(self.to, &self.template)?;

        let mut command = Command::new(&self.program);
        command
            .arg(&self.input)
            .arg("-o")
            .arg(&self.output)
            .arg("-f")
            .arg(from.as_str())
            .arg("-t")
            .arg(to.as_str())
            .arg("--template")
            .arg(&self.template)
            .args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        Ok(command)
    }

    /// Run the converter. The exit status is returned, not checked.
    pub fn run(&self) -> Result<ToolOutput> {
        process::execute(&mut self.command()?)
    }

    fn resolve(&self, explicit: Option<DocumentFormat>, path: &Path) -> Result<DocumentFormat> {
        explicit
            .or_else(|| DocumentFormat::from_path(path))
            .ok_or_else(|| SandboxError::UnknownFormat(path.to_path_buf()))
    }
}

/// Options for [`render`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Converter executable.
    pub program: String,
    /// File the metadata is written to before conversion.
    pub input: PathBuf,
    /// Keep the metadata file after conversion.
    pub keep_input: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
            input: PathBuf::from("input.md"),
            keep_input: false,
        }
    }
}

/// Render `data` through `template` into `output`.
///
/// `data` is written as front matter into the metadata file, whose remaining
/// text is kept. A sequence of strings under `args` is passed to the converter.
pub fn render(
    data: &Mapping,
    template: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &RenderOptions,
) -> Result<ToolOutput> {
    let output = output.as_ref();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    frontmatter::write(&options.input, data)?;
    let conversion = Conversion::new(&options.input, output, template.as_ref())
        .program(options.program.clone())
        .from_format(DocumentFormat::Markdown)
        .args(extra_args(data)?);

    let result = conversion.run();
    if !options.keep_input {
        debug!(file = %options.input.display(), "removing metadata file");
        if let Err(err) = fs::remove_file(&options.input) {
            warn!(file = %options.input.display(), "failed to remove metadata file: {err}");
        }
    }
    result
}

fn extra_args(data: &Mapping) -> Result<Vec<String>> {
    match data.get("args") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(arg) => Ok(arg.clone()),
                other => Err(SandboxError::Config(format!(
                    "converter arguments must be strings, found {other:?}"
                ))),
            })
            .collect(),
        Some(other) => Err(SandboxError::Config(format!(
            "`args` must be a sequence of strings, found {other:?}"
        ))),
    }
}
