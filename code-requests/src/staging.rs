//! Version-control staging for generated files.

use crate::error::{CodeRequestError, CodeRequestResult};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Marks files as pending inclusion in the next commit.
pub trait Staging {
    /// `relative_path` is relative to the folder the files were generated in.
    fn stage(&self, relative_path: &Path) -> CodeRequestResult<()>;
}

/// Stages files with `git add`.
pub struct GitStaging {
    working_dir: PathBuf,
    bin: String,
}

impl GitStaging {
    /// Stage into the repository containing `working_dir`.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            bin: "git".to_string(),
        }
    }

    /// Use a different git binary.
    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run git command and return stdout
    fn run_git(&self, args: &[&str]) -> Result<String, String> {
        let output = Command::new(&self.bin)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|e| format!("failed to execute {}: {e}", self.bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("git {} failed: {}", args.join(" "), stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Paths currently staged, relative to the repository root.
    pub fn staged_files(&self) -> CodeRequestResult<Vec<String>> {
        let output = self
            .run_git(&["diff", "--cached", "--name-only"])
            .map_err(|message| CodeRequestError::staging(&self.working_dir, message))?;
        Ok(output.lines().map(str::to_string).collect())
    }
}

impl Staging for GitStaging {
    fn stage(&self, relative_path: &Path) -> CodeRequestResult<()> {
        let path = relative_path.to_string_lossy();
        self.run_git(&["add", "--", &path])
            .map_err(|message| CodeRequestError::staging(relative_path, message))?;
        debug!(path = %path, dir = %self.working_dir.display(), "git add");
        Ok(())
    }
}
