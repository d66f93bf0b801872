//! Code requests: ordered markdown/code cells plus the dependencies their
//! code needs.
//!
//! A request is built by appending cells and is never edited in place. It
//! has two persisted forms:
//!
//! - the plain notebook document ([`CodeRequest::write`]), which is what a
//!   flake launches;
//! - the request envelope ([`CodeRequest::serialize`]), which wraps the
//!   notebook together with each code cell's dependencies and the
//!   markdown normalization policy, so nothing is lost on the way back.

use crate::config::RunConfig;
use crate::dependency::Dependency;
use crate::error::{CodeRequestError, CodeRequestResult};
use crate::notebook::{Notebook, NotebookCell};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// How markdown text is normalized before it is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextNormalization {
    /// Store markdown verbatim.
    #[default]
    None,
    /// Strip leading whitespace from every line, so markdown written as an
    /// indented literal renders as markdown rather than a code block.
    StripLeadingWhitespace,
}

impl TextNormalization {
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::None => text.to_string(),
            Self::StripLeadingWhitespace => text
                .split('\n')
                .map(str::trim_start)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One cell of a code request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Markdown {
        text: String,
    },
    Code {
        text: String,
        dependencies: Vec<Dependency>,
    },
}

impl Cell {
    pub fn text(&self) -> &str {
        match self {
            Self::Markdown { text } | Self::Code { text, .. } => text,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code { .. })
    }
}

/// A unit of notebook-based computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeRequest {
    cells: Vec<Cell>,
    normalization: TextNormalization,
}

/// Persisted form of a [`CodeRequest`].
#[derive(Serialize, Deserialize)]
struct Envelope {
    notebook: serde_json::Value,
    /// One list per code cell, in code-cell order.
    #[serde(default)]
    dependencies: Vec<Vec<Dependency>>,
    #[serde(default)]
    normalization: TextNormalization,
}

impl CodeRequest {
    /// An empty request that stores markdown verbatim.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty request for Jupyterlab, which strips leading whitespace
    /// from markdown lines.
    pub fn jupyterlab() -> Self {
        Self::with_normalization(TextNormalization::StripLeadingWhitespace)
    }

    pub fn with_normalization(normalization: TextNormalization) -> Self {
        Self {
            cells: Vec::new(),
            normalization,
        }
    }

    pub fn normalization(&self) -> TextNormalization {
        self.normalization
    }

    pub fn append_markdown(&mut self, text: &str) {
        let text = self.normalization.apply(text);
        self.cells.push(Cell::Markdown { text });
    }

    /// Append a code cell. Dependencies are kept as given, duplicates
    /// included; deduplication happens when flake inputs are computed.
    pub fn append_code(&mut self, code: &str, dependencies: Vec<Dependency>) {
        self.cells.push(Cell::Code {
            text: code.to_string(),
            dependencies,
        });
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every dependency passed to `append_code`, in call order.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.cells
            .iter()
            .filter_map(|cell| match cell {
                Cell::Code { dependencies, .. } => Some(dependencies.iter().cloned()),
                Cell::Markdown { .. } => None,
            })
            .flatten()
            .collect()
    }

    pub fn to_notebook(&self) -> Notebook {
        let mut notebook = Notebook::new();
        notebook.cells = self
            .cells
            .iter()
            .map(|cell| match cell {
                Cell::Markdown { text } => NotebookCell::markdown(text.as_str()),
                Cell::Code { text, .. } => NotebookCell::code(text.as_str()),
            })
            .collect();
        notebook
    }

    /// Write the notebook document to `sink`.
    pub fn write(&self, sink: impl Write) -> std::io::Result<()> {
        self.to_notebook().write(sink)
    }

    /// Build a request from a plain notebook. Code cells get no
    /// dependencies; markdown is taken as stored, without normalization.
    pub fn from_notebook(
        notebook: &Notebook,
        normalization: TextNormalization,
    ) -> CodeRequestResult<Self> {
        let code_cells = notebook
            .cells
            .iter()
            .filter(|cell| matches!(cell, NotebookCell::Code(_)))
            .count();
        Self::from_parts(notebook, vec![Vec::new(); code_cells], normalization)
    }

    pub fn read_notebook(
        source: impl Read,
        normalization: TextNormalization,
    ) -> CodeRequestResult<Self> {
        Self::from_notebook(&Notebook::read(source)?, normalization)
    }

    fn from_parts(
        notebook: &Notebook,
        dependencies: Vec<Vec<Dependency>>,
        normalization: TextNormalization,
    ) -> CodeRequestResult<Self> {
        let mut per_code_cell = dependencies.into_iter();
        let mut cells = Vec::with_capacity(notebook.cells.len());
        for (index, cell) in notebook.cells.iter().enumerate() {
            match cell {
                NotebookCell::Markdown(md) => cells.push(Cell::Markdown {
                    text: md.source.clone(),
                }),
                NotebookCell::Code(code) => {
                    let dependencies = per_code_cell.next().ok_or_else(|| {
                        CodeRequestError::serialization(format!(
                            "code cell {index} has no dependency list"
                        ))
                    })?;
                    cells.push(Cell::Code {
                        text: code.source.clone(),
                        dependencies,
                    });
                }
                NotebookCell::Raw(_) => {
                    return Err(CodeRequestError::serialization(format!(
                        "cell {index} is a raw cell; code requests hold only markdown and code"
                    )))
                }
            }
        }
        if per_code_cell.next().is_some() {
            return Err(CodeRequestError::serialization(
                "more dependency lists than code cells",
            ));
        }
        Ok(Self {
            cells,
            normalization,
        })
    }

    fn to_envelope(&self) -> CodeRequestResult<Envelope> {
        Ok(Envelope {
            notebook: serde_json::to_value(self.to_notebook())?,
            dependencies: self
                .cells
                .iter()
                .filter_map(|cell| match cell {
                    Cell::Code { dependencies, .. } => Some(dependencies.clone()),
                    Cell::Markdown { .. } => None,
                })
                .collect(),
            normalization: self.normalization,
        })
    }

    fn from_envelope(envelope: Envelope) -> CodeRequestResult<Self> {
        let notebook = Notebook::from_value(envelope.notebook)?;
        if envelope.dependencies.is_empty() {
            return Self::from_notebook(&notebook, envelope.normalization);
        }
        Self::from_parts(&notebook, envelope.dependencies, envelope.normalization)
    }

    /// Serialize into the request envelope.
    pub fn serialize(&self) -> CodeRequestResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_envelope()?)?)
    }

    /// Rebuild a request from its envelope.
    pub fn deserialize(json: &str) -> CodeRequestResult<Self> {
        Self::from_envelope(serde_json::from_str(json)?)
    }

    /// Generate a throwaway flake for this request and hand it to `nix run`.
    pub async fn run(&self, config: &RunConfig) -> CodeRequestResult<()> {
        let executor = crate::runner::NixExecutor::from_config(config);
        crate::runner::run(self, config, &executor).await
    }
}

/// `#[serde(with = ...)]` support for structs that embed a request.
pub(crate) mod envelope {
    use super::{CodeRequest, Envelope};
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(request: &CodeRequest, serializer: S) -> Result<S::Ok, S::Error> {
        request
            .to_envelope()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CodeRequest, D::Error> {
        CodeRequest::from_envelope(Envelope::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numpy() -> Dependency {
        Dependency::new("numpy", "pypi:numpy")
    }

    #[test]
    fn title_then_code_scenario() {
        let mut request = CodeRequest::new();
        request.append_markdown("# Title");
        request.append_code("print(1)", vec![numpy()]);

        let notebook = request.to_notebook();
        assert_eq!(notebook.cells.len(), 2);
        assert_eq!(notebook.cells[0].cell_type(), "markdown");
        assert_eq!(notebook.cells[0].source(), "# Title");
        assert_eq!(notebook.cells[1].cell_type(), "code");
        assert_eq!(notebook.cells[1].source(), "print(1)");
        assert_eq!(request.dependencies(), vec![numpy()]);
    }

    #[test]
    fn dependencies_concatenate_with_duplicates() {
        let pandas = Dependency::new("pandas", "pypi:pandas");
        let mut request = CodeRequest::new();
        request.append_code("import numpy", vec![numpy()]);
        request.append_markdown("between");
        request.append_code("import numpy, pandas", vec![numpy(), pandas.clone()]);

        assert_eq!(request.dependencies(), vec![numpy(), numpy(), pandas]);
    }

    #[test]
    fn jupyterlab_strips_leading_whitespace_per_line() {
        let mut request = CodeRequest::jupyterlab();
        request.append_markdown("  # Title\n\t  body\n   ");
        assert_eq!(request.cells()[0].text(), "# Title\nbody\n");
    }

    #[test]
    fn plain_request_keeps_markdown_verbatim() {
        let mut request = CodeRequest::new();
        request.append_markdown("    indented");
        assert_eq!(request.cells()[0].text(), "    indented");
    }

    #[test]
    fn code_is_never_normalized() {
        let mut request = CodeRequest::jupyterlab();
        request.append_code("def f():\n    return 1", vec![]);
        assert_eq!(request.cells()[0].text(), "def f():\n    return 1");
    }

    #[test]
    fn envelope_round_trip_keeps_cells_and_dependencies() {
        let mut request = CodeRequest::jupyterlab();
        request.append_markdown("# Analysis");
        request.append_code("import numpy", vec![numpy()]);
        request.append_code("x = 1\n", vec![]);
        request.append_markdown("done\n");
        request.append_code(
            "import pythoneda",
            vec![Dependency::pythoneda(
                "pythoneda-shared-pythoneda-domain",
                "github:pythoneda-shared-pythoneda/domain/0.0.1",
            )],
        );

        let json = request.serialize().unwrap();
        let back = CodeRequest::deserialize(&json).unwrap();
        assert_eq!(back, request);
        assert_eq!(back.normalization(), TextNormalization::StripLeadingWhitespace);
    }

    #[test]
    fn empty_request_round_trips() {
        let request = CodeRequest::new();
        let back = CodeRequest::deserialize(&request.serialize().unwrap()).unwrap();
        assert!(back.is_empty());
        assert_eq!(back, request);
    }

    #[test]
    fn envelope_without_dependencies_gives_empty_lists() {
        let json = r#"{"notebook": {"cells": [
            {"cell_type": "code", "metadata": {}, "outputs": [], "source": "1+1"}
        ], "metadata": {}, "nbformat": 4, "nbformat_minor": 4}}"#;
        let request = CodeRequest::deserialize(json).unwrap();
        assert_eq!(request.len(), 1);
        assert!(request.dependencies().is_empty());
    }

    #[test]
    fn mismatched_dependency_lists_are_rejected() {
        let mut request = CodeRequest::new();
        request.append_code("a", vec![numpy()]);
        let mut value: serde_json::Value =
            serde_json::from_str(&request.serialize().unwrap()).unwrap();
        value["dependencies"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!([]));

        let err = CodeRequest::deserialize(&value.to_string()).unwrap_err();
        assert!(matches!(err, CodeRequestError::Serialization { .. }));
    }

    #[test]
    fn malformed_envelope_is_a_serialization_error() {
        let err = CodeRequest::deserialize("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, CodeRequestError::Serialization { .. }));
    }

    #[test]
    fn raw_cells_are_rejected_on_import() {
        let json = r#"{"cells": [{"cell_type": "raw", "metadata": {}, "source": "x"}],
                       "metadata": {}, "nbformat": 4, "nbformat_minor": 4}"#;
        let err = CodeRequest::read_notebook(json.as_bytes(), TextNormalization::None).unwrap_err();
        assert!(err.to_string().contains("raw cell"));
    }

    #[test]
    fn write_then_read_notebook_keeps_order() {
        let mut request = CodeRequest::new();
        request.append_markdown("one");
        request.append_code("two", vec![]);
        request.append_markdown("three");

        let mut buf = Vec::new();
        request.write(&mut buf).unwrap();
        let back = CodeRequest::read_notebook(buf.as_slice(), TextNormalization::None).unwrap();
        let texts: Vec<&str> = back.cells().iter().map(Cell::text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }
}
