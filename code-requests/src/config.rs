//! Run configuration
//!
//! Defaults come from `CODE_REQUEST_*` environment variables; a TOML file
//! can override any subset of them.

use crate::error::{CodeRequestError, CodeRequestResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Settings for running code requests and staging their flakes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Nix binary (`CODE_REQUEST_NIX_BIN`, default `nix`).
    pub nix_bin: String,
    /// Arguments placed before the flake directory
    /// (`CODE_REQUEST_NIX_ARGS`, whitespace-separated, default `run`).
    pub nix_args: Vec<String>,
    /// Git binary used for staging (`CODE_REQUEST_GIT_BIN`, default `git`).
    pub git_bin: String,
    /// Kill the external tool after this many seconds
    /// (`CODE_REQUEST_TIMEOUT_SECS`, default: no limit).
    pub timeout_secs: Option<u64>,
    /// Parent of the temporary flake directories
    /// (`CODE_REQUEST_WORK_DIR`, default: system temp dir).
    pub work_dir_parent: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nix_bin: std::env::var("CODE_REQUEST_NIX_BIN").unwrap_or_else(|_| "nix".into()),
            nix_args: std::env::var("CODE_REQUEST_NIX_ARGS")
                .map(|args| args.split_whitespace().map(String::from).collect())
                .unwrap_or_else(|_| vec!["run".into()]),
            git_bin: std::env::var("CODE_REQUEST_GIT_BIN").unwrap_or_else(|_| "git".into()),
            timeout_secs: std::env::var("CODE_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|secs| parse_timeout(&secs)),
            work_dir_parent: std::env::var("CODE_REQUEST_WORK_DIR")
                .ok()
                .map(PathBuf::from),
        }
    }
}

/// Seconds from `CODE_REQUEST_TIMEOUT_SECS`. Unparsable values fall back to
/// no limit, with a warning.
fn parse_timeout(raw: &str) -> Option<u64> {
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(e) => {
            warn!(value = %raw, error = %e, "Ignoring invalid CODE_REQUEST_TIMEOUT_SECS");
            None
        }
    }
}

impl RunConfig {
    /// Load from a TOML file; missing keys fall back to [`Default`].
    pub fn from_file(path: &Path) -> CodeRequestResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CodeRequestError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CodeRequestResult<Self> {
        let config: RunConfig = toml::from_str(content)
            .map_err(|e| CodeRequestError::config(format!("Invalid run config: {e}")))?;
        if config.nix_bin.trim().is_empty() {
            return Err(CodeRequestError::config("nix_bin must not be empty"));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_selected_fields() {
        let config = RunConfig::from_toml(
            r#"
            nix_bin = "/run/current-system/sw/bin/nix"
            nix_args = ["run", "--impure"]
            timeout_secs = 600
            "#,
        )
        .unwrap();
        assert_eq!(config.nix_bin, "/run/current-system/sw/bin/nix");
        assert_eq!(config.nix_args, vec!["run", "--impure"]);
        assert_eq!(config.timeout_secs, Some(600));
        assert!(!config.git_bin.is_empty());
    }

    #[test]
    fn timeout_parsing() {
        assert_eq!(parse_timeout("600"), Some(600));
        assert_eq!(parse_timeout(" 30 "), Some(30));
        assert_eq!(parse_timeout("soon"), None);
        assert_eq!(parse_timeout("-5"), None);
    }

    #[test]
    fn empty_nix_bin_is_rejected() {
        let err = RunConfig::from_toml(r#"nix_bin = "  ""#).unwrap_err();
        assert!(matches!(err, CodeRequestError::Config { .. }));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(RunConfig::from_toml("timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = RunConfig::from_file(Path::new("/nonexistent/code-request.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/code-request.toml"));
    }
}
