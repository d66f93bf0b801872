//! Code request error types
//!
//! Every operation in this crate is all-or-nothing: errors surface directly
//! to the caller, with no local retry or partial-result salvage.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for code request operations
pub type CodeRequestResult<T> = Result<T, CodeRequestError>;

#[derive(Error, Debug)]
pub enum CodeRequestError {
    /// A persisted notebook or request envelope is malformed or has an
    /// incompatible format version.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Output artifacts could not be created or written.
    #[error("Cannot write {path}: {source}")]
    GenerationIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required descriptor field is missing before generation.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The external build/execution tool reported a failure.
    #[error("{tool} failed (exit status {}): {stderr}", display_status(.status))]
    ExternalTool {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The version-control adapter could not stage a generated file.
    #[error("Cannot stage {path}: {message}")]
    Staging { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn display_status(status: &Option<i32>) -> String {
    status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl CodeRequestError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::GenerationIo {
            path: path.into(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn external_tool(
        tool: impl Into<String>,
        status: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            status,
            stderr: stderr.into(),
        }
    }

    pub fn staging(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Staging {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used by the CLI when reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
            Self::GenerationIo { .. } => "GENERATION_IO_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::ExternalTool { .. } => "EXTERNAL_TOOL_ERROR",
            Self::Staging { .. } => "STAGING_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }
}

impl From<serde_json::Error> for CodeRequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
