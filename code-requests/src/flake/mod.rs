//! Nix flakes wrapping code requests
//!
//! - `input`: flake inputs and the `(name, url)`-keyed input set
//! - `descriptor`: input computation and file generation
//! - `manifest`: `flake.nix` rendering
//! - `spec`: conditions over generated flakes

pub mod descriptor;
pub mod input;
pub mod manifest;
pub mod spec;

pub use descriptor::{compute_inputs, CodeRequestFlake, License, FLAKE_FILE, NOTEBOOK_FILE};
pub use input::{FlakeInput, FlakeInputSet};
pub use spec::{FlakeSpec, InputSpec};
