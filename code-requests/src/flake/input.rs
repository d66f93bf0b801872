//! Flake inputs and the deduplicating input set.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One named node in a flake's dependency graph. Nested inputs form a DAG;
/// cycles are not guarded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakeInput {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<FlakeInput>,
}

impl FlakeInput {
    pub fn new(name: impl Into<String>, url: impl Into<String>, inputs: Vec<FlakeInput>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            inputs,
        }
    }

    /// Identity used for deduplication. Nested inputs are not part of it.
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.url)
    }

    /// The notebook execution environment every code request flake needs.
    pub fn jupyterlab() -> Self {
        Self::new(
            "jupyterlab",
            "github:rydnr/nix-flakes/main?dir=jupyterlab",
            vec![Self::nixos(), Self::flake_utils()],
        )
    }

    pub fn nixos() -> Self {
        Self::new("nixos", "github:NixOS/nixpkgs/23.05", Vec::new())
    }

    pub fn flake_utils() -> Self {
        Self::new(
            "flake-utils",
            "github:numtide/flake-utils/v1.0.0",
            Vec::new(),
        )
    }

    pub fn pythoneda_banner() -> Self {
        Self::new(
            "pythoneda-shared-pythoneda-banner",
            "github:pythoneda-shared-pythoneda/banner/0.0.1",
            Vec::new(),
        )
    }

    pub fn pythoneda_domain() -> Self {
        Self::new(
            crate::dependency::CORE_DOMAIN_DEPENDENCY,
            "github:pythoneda-shared-pythoneda/domain/0.0.1",
            Vec::new(),
        )
    }
}

/// Insertion-ordered set of flake inputs keyed by `(name, url)`.
///
/// The first input inserted under a key wins: later inserts with the same
/// key are ignored even when their nested inputs differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlakeInputSet {
    inputs: Vec<FlakeInput>,
    index: HashMap<(String, String), usize>,
}

impl FlakeInputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an input with the same key was already present.
    pub fn insert(&mut self, input: FlakeInput) -> bool {
        let key = (input.name.clone(), input.url.clone());
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.inputs.len());
        self.inputs.push(input);
        true
    }

    pub fn get(&self, name: &str, url: &str) -> Option<&FlakeInput> {
        self.index
            .get(&(name.to_string(), url.to_string()))
            .map(|&i| &self.inputs[i])
    }

    pub fn contains(&self, name: &str, url: &str) -> bool {
        self.get(name, url).is_some()
    }

    /// First input with the given name, whatever its url.
    pub fn by_name(&self, name: &str) -> Option<&FlakeInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlakeInput> {
        self.inputs.iter()
    }

    pub fn as_slice(&self) -> &[FlakeInput] {
        &self.inputs
    }

    /// Every input reachable from this set, flattened and deduplicated by
    /// name. Depth-first, parents before their nested inputs; the first
    /// input seen under a name wins.
    pub fn closure(&self) -> Vec<&FlakeInput> {
        fn visit<'a>(
            input: &'a FlakeInput,
            seen: &mut HashSet<&'a str>,
            out: &mut Vec<&'a FlakeInput>,
        ) {
            if !seen.insert(input.name.as_str()) {
                return;
            }
            out.push(input);
            for nested in &input.inputs {
                visit(nested, seen, out);
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for input in &self.inputs {
            visit(input, &mut seen, &mut out);
        }
        out
    }

    /// The first pair of reachable inputs sharing a name but not a url.
    /// A manifest declares one input per name, so such a pair cannot be
    /// rendered.
    pub fn name_conflict(&self) -> Option<(&FlakeInput, &FlakeInput)> {
        fn visit<'a>(
            input: &'a FlakeInput,
            declared: &mut HashMap<&'a str, &'a FlakeInput>,
        ) -> Option<(&'a FlakeInput, &'a FlakeInput)> {
            match declared.get(input.name.as_str()).copied() {
                Some(first) if first.url != input.url => return Some((first, input)),
                Some(_) => {}
                None => {
                    declared.insert(input.name.as_str(), input);
                }
            }
            input
                .inputs
                .iter()
                .find_map(|nested| visit(nested, declared))
        }

        let mut declared = HashMap::new();
        self.inputs
            .iter()
            .find_map(|input| visit(input, &mut declared))
    }
}

impl FromIterator<FlakeInput> for FlakeInputSet {
    fn from_iter<I: IntoIterator<Item = FlakeInput>>(iter: I) -> Self {
        let mut set = Self::new();
        for input in iter {
            set.insert(input);
        }
        set
    }
}

impl<'a> IntoIterator for &'a FlakeInputSet {
    type Item = &'a FlakeInput;
    type IntoIter = std::slice::Iter<'a, FlakeInput>;

    fn into_iter(self) -> Self::IntoIter {
        self.inputs.iter()
    }
}

impl Serialize for FlakeInputSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inputs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FlakeInputSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Vec::<FlakeInput>::deserialize(deserializer)?
            .into_iter()
            .collect())
    }
}
