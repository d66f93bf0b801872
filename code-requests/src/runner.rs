//! Running code requests
//!
//! `run` generates the request's flake into a fresh, timestamp-named
//! temporary directory and hands that directory to a [`FlakeExecutor`].
//! The directory is owned by a [`tempfile::TempDir`], so it is removed on
//! every exit path: success, executor failure, or the future being dropped.

use crate::code_request::CodeRequest;
use crate::config::RunConfig;
use crate::error::{CodeRequestError, CodeRequestResult};
use crate::flake::CodeRequestFlake;
use async_trait::async_trait;
use chrono::Local;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Version stamped on flakes built by `run`.
const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

const RUN_FLAKE_NAME: &str = "code_request";
const RUN_FLAKE_DESCRIPTION: &str = "A nix flake to run a code request";

/// Materializes and launches a generated flake.
#[async_trait]
pub trait FlakeExecutor: Send + Sync {
    /// Tool name for logging.
    fn name(&self) -> &str;

    /// Run the flake in `flake_dir`. Failures are returned as reported by
    /// the tool, without retry.
    async fn execute(&self, flake_dir: &Path) -> CodeRequestResult<()>;
}

/// Launches flakes with `nix run <dir>`.
#[derive(Debug, Clone)]
pub struct NixExecutor {
    bin: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl NixExecutor {
    pub fn new(bin: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            bin: bin.into(),
            args,
            timeout: None,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            bin: config.nix_bin.clone(),
            args: config.nix_args.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn tool_error(&self, status: Option<i32>, message: impl Into<String>) -> CodeRequestError {
        CodeRequestError::external_tool(&self.bin, status, message)
    }
}

#[async_trait]
impl FlakeExecutor for NixExecutor {
    fn name(&self) -> &str {
        &self.bin
    }

    async fn execute(&self, flake_dir: &Path) -> CodeRequestResult<()> {
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.args(&self.args)
            .arg(flake_dir)
            .current_dir(flake_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| self.tool_error(None, format!("Failed to execute: {e}")))?;
        let stderr = child.stderr.take();

        // stderr is echoed byte for byte and kept for the error report. It
        // need not be UTF-8.
        let wait = async move {
            let mut captured = Vec::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr);
                let mut echo = tokio::io::stderr();
                let mut line = Vec::new();
                while reader.read_until(b'\n', &mut line).await? > 0 {
                    echo.write_all(&line).await?;
                    captured.extend_from_slice(&line);
                    line.clear();
                }
                echo.flush().await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, String::from_utf8_lossy(&captured).into_owned()))
        };

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| {
                    self.tool_error(None, format!("timed out after {}s", limit.as_secs_f64()))
                })?,
            None => wait.await,
        };
        let (status, captured) = outcome.map_err(|e| self.tool_error(None, e.to_string()))?;

        if !status.success() {
            warn!(tool = %self.bin, status = ?status.code(), "External tool failed");
            return Err(self.tool_error(status.code(), captured.trim_end()));
        }
        Ok(())
    }
}

/// Generate `request` into a temporary flake directory and execute it.
pub async fn run(
    request: &CodeRequest,
    config: &RunConfig,
    executor: &dyn FlakeExecutor,
) -> CodeRequestResult<()> {
    let version = Local::now().format(VERSION_FORMAT).to_string();

    let prefix = format!("code-request-{version}-");
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix);
    let work_dir = match &config.work_dir_parent {
        Some(parent) => builder
            .tempdir_in(parent)
            .map_err(|e| CodeRequestError::io(parent, e))?,
        None => builder
            .tempdir()
            .map_err(|e| CodeRequestError::io(std::env::temp_dir(), e))?,
    };

    let mut flake = CodeRequestFlake::jupyter(
        request.clone(),
        RUN_FLAKE_NAME,
        version,
        work_dir.path(),
        RUN_FLAKE_DESCRIPTION,
    );
    flake.generate()?;

    info!(
        tool = executor.name(),
        dir = %work_dir.path().display(),
        cells = request.len(),
        "Running code request"
    );
    let result = executor.execute(work_dir.path()).await;

    let path = work_dir.path().to_path_buf();
    if let Err(e) = work_dir.close() {
        warn!(dir = %path.display(), error = %e, "Failed to remove work dir");
    }
    result
}
