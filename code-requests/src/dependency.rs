//! Dependency descriptors attached to code cells.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the organization's core domain library. Internal dependencies
/// other than this one get it added to their nested flake inputs.
pub const CORE_DOMAIN_DEPENDENCY: &str = "pythoneda-shared-pythoneda-domain";

/// Which namespace a dependency belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Any third-party library or environment.
    #[default]
    External,
    /// A library from the organization's own (pythoneda) namespace. These
    /// expand to the platform baseline inputs when turned into flake inputs.
    Pythoneda,
}

/// A named, located external library required by a code request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl Dependency {
    /// A third-party dependency.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: DependencyKind::External,
        }
    }

    /// A dependency in the organization's own namespace.
    pub fn pythoneda(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: DependencyKind::Pythoneda,
        }
    }

    pub fn is_pythoneda(&self) -> bool {
        self.kind == DependencyKind::Pythoneda
    }

    /// Whether this is the core domain library itself.
    pub fn is_core_domain(&self) -> bool {
        self.is_pythoneda() && self.name == CORE_DOMAIN_DEPENDENCY
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_to_external_when_absent() {
        let dep: Dependency =
            serde_json::from_str(r#"{"name":"numpy","url":"pypi:numpy"}"#).unwrap();
        assert_eq!(dep, Dependency::new("numpy", "pypi:numpy"));
        assert!(!dep.is_pythoneda());
    }

    #[test]
    fn pythoneda_kind_round_trips() {
        let dep = Dependency::pythoneda(
            "pythoneda-shared-git-shared",
            "github:pythoneda-shared-git/shared",
        );
        let json = serde_json::to_string(&dep).unwrap();
        assert!(json.contains(r#""kind":"pythoneda""#));
        let back: Dependency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dep);
    }

    #[test]
    fn core_domain_detection_requires_internal_kind() {
        assert!(Dependency::pythoneda(CORE_DOMAIN_DEPENDENCY, "github:x/y").is_core_domain());
        assert!(!Dependency::new(CORE_DOMAIN_DEPENDENCY, "github:x/y").is_core_domain());
    }
}
