//! nbformat v4 notebook documents
//!
//! Reads and writes the Jupyter notebook interchange format. Fields this
//! crate does not interpret (document/cell metadata, attachments, outputs,
//! unknown keys) are carried through untouched so a read-write cycle is
//! lossless.
//!
//! Output mirrors nbformat's own writer: keys sorted, one-space indent,
//! `source` split into a list of lines, trailing newline. New documents use
//! minor version 4, which has no cell ids; ids found on read are preserved.

use crate::error::{CodeRequestError, CodeRequestResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{Read, Write};

/// Supported nbformat major version.
pub const NBFORMAT: u32 = 4;

/// Minor version stamped on newly created documents.
pub const NBFORMAT_MINOR: u32 = 4;

/// A notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<NotebookCell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub nbformat: u32,
    pub nbformat_minor: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One notebook cell, tagged by `cell_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum NotebookCell {
    Markdown(MarkdownCell),
    Code(CodeCell),
    Raw(RawCell),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(with = "multiline")]
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub execution_count: Option<u64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub outputs: Vec<Value>,
    #[serde(with = "multiline")]
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(with = "multiline")]
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotebookCell {
    /// A markdown cell with default metadata.
    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Markdown(MarkdownCell {
            id: None,
            metadata: Map::new(),
            source: text.into(),
            extra: Map::new(),
        })
    }

    /// A code cell that has never been executed.
    pub fn code(text: impl Into<String>) -> Self {
        Self::Code(CodeCell {
            id: None,
            execution_count: None,
            metadata: Map::new(),
            outputs: Vec::new(),
            source: text.into(),
            extra: Map::new(),
        })
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Markdown(cell) => &cell.source,
            Self::Code(cell) => &cell.source,
            Self::Raw(cell) => &cell.source,
        }
    }

    pub fn cell_type(&self) -> &'static str {
        match self {
            Self::Markdown(_) => "markdown",
            Self::Code(_) => "code",
            Self::Raw(_) => "raw",
        }
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

impl Notebook {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            metadata: Map::new(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            extra: Map::new(),
        }
    }

    /// Parse a document, rejecting major versions other than 4.
    pub fn from_value(value: Value) -> CodeRequestResult<Self> {
        let version = value
            .get("nbformat")
            .and_then(Value::as_u64)
            .ok_or_else(|| CodeRequestError::serialization("notebook has no nbformat version"))?;
        if version != u64::from(NBFORMAT) {
            return Err(CodeRequestError::serialization(format!(
                "unsupported nbformat version {version} (expected {NBFORMAT})"
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(json: &str) -> CodeRequestResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn read(mut source: impl Read) -> CodeRequestResult<Self> {
        let mut json = String::new();
        source
            .read_to_string(&mut json)
            .map_err(|e| CodeRequestError::serialization(format!("cannot read notebook: {e}")))?;
        Self::from_json(&json)
    }

    /// The canonical JSON text of this document.
    pub fn to_json(&self) -> CodeRequestResult<String> {
        // Going through `Value` sorts every object's keys.
        let value = serde_json::to_value(self)?;
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|e| CodeRequestError::serialization(e.to_string()))
    }

    pub fn write(&self, mut sink: impl Write) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        sink.write_all(json.as_bytes())?;
        sink.flush()
    }
}

/// nbformat's multiline strings: a string or a list of strings on read,
/// a list of lines (each keeping its `\n`) on write.
mod multiline {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        Text(String),
        Lines(Vec<String>),
    }

    pub fn serialize<S: Serializer>(text: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(text.split_inclusive('\n'))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Multiline::deserialize(deserializer)? {
            Multiline::Text(text) => text,
            Multiline::Lines(lines) => lines.concat(),
        })
    }
}
