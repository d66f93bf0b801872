//! Flake descriptors wrapping a code request.
//!
//! A [`CodeRequestFlake`] computes the flake inputs a request needs and
//! generates two files into an output folder: `flake.nix` and
//! `code-request.ipynb`. Generation is deterministic, so regenerating with
//! the same request and parameters produces byte-identical files.

use crate::code_request::CodeRequest;
use crate::dependency::Dependency;
use crate::error::{CodeRequestError, CodeRequestResult};
use crate::flake::input::{FlakeInput, FlakeInputSet};
use crate::flake::manifest;
use crate::staging::Staging;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the generated flake manifest.
pub const FLAKE_FILE: &str = "flake.nix";

/// File name of the generated notebook.
pub const NOTEBOOK_FILE: &str = "code-request.ipynb";

const JUPYTER_HOMEPAGE: &str = "https://github.com/pythoneda-shared-code-requests/jupyter";

/// License of the generated flake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum License {
    #[default]
    Gpl3,
    Mit,
    Asl20,
}

impl License {
    /// Attribute name under `lib.licenses` in nixpkgs.
    pub fn nix_name(self) -> &'static str {
        match self {
            Self::Gpl3 => "gpl3",
            Self::Mit => "mit",
            Self::Asl20 => "asl20",
        }
    }
}

/// Compute the flake inputs for a sequence of dependencies.
///
/// The result always starts with the Jupyterlab environment. Each
/// dependency becomes one input; pythoneda dependencies get the platform
/// baseline (nixos, flake-utils, banner) as nested inputs, plus the core
/// domain unless they are the core domain. Inputs collapse on
/// `(name, url)`, first occurrence wins.
pub fn compute_inputs(dependencies: &[Dependency]) -> FlakeInputSet {
    let mut result = FlakeInputSet::new();
    result.insert(FlakeInput::jupyterlab());

    let baseline = vec![
        FlakeInput::nixos(),
        FlakeInput::flake_utils(),
        FlakeInput::pythoneda_banner(),
    ];

    for dep in dependencies {
        let mut nested = Vec::new();
        if dep.is_pythoneda() {
            nested = baseline.clone();
            if !dep.is_core_domain() {
                nested.push(FlakeInput::pythoneda_domain());
            }
        }
        let inserted = result.insert(FlakeInput::new(dep.name.clone(), dep.url.clone(), nested));
        debug!(name = %dep.name, url = %dep.url, inserted, "flake input");
    }

    result
}

/// A Nix flake that launches a code request in Jupyterlab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRequestFlake {
    pub name: String,
    pub version: String,
    /// Where the flake itself can be fetched from.
    pub url: String,
    pub inputs: FlakeInputSet,
    pub output_folder: PathBuf,
    pub description: String,
    pub homepage: String,
    #[serde(default)]
    pub license: License,
    #[serde(default)]
    pub authors: Vec<String>,
    pub copyright_year: u16,
    pub copyright_holder: String,
    #[serde(with = "crate::code_request::envelope")]
    code_request: CodeRequest,
    #[serde(skip)]
    generated_in: Option<PathBuf>,
}

impl CodeRequestFlake {
    /// The general-purpose flake used to run an arbitrary code request.
    pub fn jupyter(
        code_request: CodeRequest,
        name: impl Into<String>,
        version: impl Into<String>,
        output_folder: impl Into<PathBuf>,
        description: impl Into<String>,
    ) -> Self {
        let inputs = compute_inputs(&code_request.dependencies());
        Self {
            name: name.into(),
            version: version.into(),
            url: JUPYTER_HOMEPAGE.to_string(),
            inputs,
            output_folder: output_folder.into(),
            description: description.into(),
            homepage: JUPYTER_HOMEPAGE.to_string(),
            license: License::Gpl3,
            authors: vec!["rydnr <github@acm-sl.org>".to_string()],
            copyright_year: 2023,
            copyright_holder: "rydnr".to_string(),
            code_request,
            generated_in: None,
        }
    }

    /// The published Jupyterlab code request flake for `version`.
    pub fn jupyterlab(
        code_request: CodeRequest,
        version: impl Into<String>,
        output_folder: impl Into<PathBuf>,
    ) -> Self {
        let version = version.into();
        let mut flake = Self::jupyter(
            code_request,
            "jupyterlab-code-request",
            version.clone(),
            output_folder,
            "Jupyterlab code request",
        );
        flake.url = format!("github:rydnr/nix-flakes/jupyterlab-{version}?dir=jupyterlab");
        flake
    }

    pub fn code_request(&self) -> &CodeRequest {
        &self.code_request
    }

    /// Folder of the last successful generation, if any.
    pub fn generated_in(&self) -> Option<&Path> {
        self.generated_in.as_deref()
    }

    pub fn validate(&self) -> CodeRequestResult<()> {
        if self.name.trim().is_empty() {
            return Err(CodeRequestError::validation("flake name is required"));
        }
        if self.version.trim().is_empty() {
            return Err(CodeRequestError::validation("flake version is required"));
        }

        // These end up in `#` comment lines of the manifest.
        let single_line = [
            ("name", self.name.as_str()),
            ("version", self.version.as_str()),
            ("copyright holder", self.copyright_holder.as_str()),
        ]
        .into_iter()
        .chain(self.authors.iter().map(|author| ("author", author.as_str())));
        for (field, value) in single_line {
            if value.contains(['\n', '\r']) {
                return Err(CodeRequestError::validation(format!(
                    "flake {field} must be a single line: {value:?}"
                )));
            }
        }

        if let Some((first, second)) = self.inputs.name_conflict() {
            return Err(CodeRequestError::validation(format!(
                "input {} is required from both {} and {}",
                first.name, first.url, second.url
            )));
        }
        Ok(())
    }

    /// Render `flake.nix`.
    pub fn manifest(&self) -> String {
        manifest::render(self)
    }

    /// Generate into the configured output folder.
    pub fn generate(&mut self) -> CodeRequestResult<()> {
        let folder = self.output_folder.clone();
        self.generate_in(&folder)
    }

    /// Write `flake.nix` and `code-request.ipynb` into `folder`, creating it
    /// if needed. Existing files are overwritten.
    pub fn generate_in(&mut self, folder: &Path) -> CodeRequestResult<()> {
        self.validate()?;

        std::fs::create_dir_all(folder).map_err(|e| CodeRequestError::io(folder, e))?;

        let flake_path = folder.join(FLAKE_FILE);
        std::fs::write(&flake_path, self.manifest())
            .map_err(|e| CodeRequestError::io(&flake_path, e))?;
        debug!(path = %flake_path.display(), "wrote flake manifest");

        let notebook_path = folder.join(NOTEBOOK_FILE);
        let notebook = self.code_request.to_notebook().to_json()?;
        std::fs::write(&notebook_path, notebook)
            .map_err(|e| CodeRequestError::io(&notebook_path, e))?;
        debug!(path = %notebook_path.display(), "wrote notebook");

        info!(
            name = %self.name,
            version = %self.version,
            inputs = self.inputs.len(),
            folder = %folder.display(),
            "Generated code request flake"
        );
        self.generated_in = Some(folder.to_path_buf());
        Ok(())
    }

    /// Stage the generated files. Returns `false` without touching the
    /// adapter if nothing has been generated yet.
    pub fn stage_for_version_control(&self, staging: &dyn Staging) -> CodeRequestResult<bool> {
        if self.generated_in.is_none() {
            debug!(name = %self.name, "nothing generated, skipping staging");
            return Ok(false);
        }
        for file in [FLAKE_FILE, NOTEBOOK_FILE] {
            staging.stage(Path::new(file))?;
        }
        info!(name = %self.name, "Staged generated flake files");
        Ok(true)
    }
}
