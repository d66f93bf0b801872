//! Conditions a code request flake must satisfy.

use crate::flake::descriptor::CodeRequestFlake;
use serde::{Deserialize, Serialize};

/// Requires an input by name, and by url when one is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InputSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }

    pub fn exact(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
        }
    }
}

/// A pattern over [`CodeRequestFlake`]s. `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakeSpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
}

impl FlakeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            url: None,
            inputs: Vec::new(),
        }
    }

    /// Matches the published Jupyterlab code request flake. Without a
    /// version, any release matches.
    pub fn jupyterlab(version: Option<&str>) -> Self {
        let mut spec = Self::new("jupyterlab-code-request");
        if let Some(version) = version {
            spec.version = Some(version.to_string());
            spec.url = Some(format!(
                "github:rydnr/nix-flakes/jupyterlab-{version}?dir=jupyterlab"
            ));
        }
        spec
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_input(mut self, input: InputSpec) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn matches(&self, flake: &CodeRequestFlake) -> bool {
        if self.name != flake.name {
            return false;
        }
        if self.version.as_ref().is_some_and(|v| *v != flake.version) {
            return false;
        }
        if self.url.as_ref().is_some_and(|u| *u != flake.url) {
            return false;
        }
        self.inputs.iter().all(|wanted| {
            flake.inputs.iter().any(|input| {
                input.name == wanted.name
                    && wanted.url.as_ref().map_or(true, |url| *url == input.url)
            })
        })
    }
}
