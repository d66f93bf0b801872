//! Code Requests Library
//!
//! Models "code requests" (Jupyter notebooks plus the libraries their code
//! cells need) and packages them as reproducible Nix flakes.
//!
//! # Pipeline
//!
//! ```text
//! CodeRequest (append cells) → CodeRequestFlake (compute inputs)
//!     → generate: flake.nix + code-request.ipynb
//!     → stage_for_version_control (git add)
//!     → run: temporary flake dir → nix run
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use code_requests::{CodeRequest, CodeRequestFlake, Dependency, GitStaging};
//!
//! let mut request = CodeRequest::new();
//! request.append_markdown("# Title");
//! request.append_code("print(1)", vec![Dependency::new("numpy", "pypi:numpy")]);
//!
//! let mut flake = CodeRequestFlake::jupyter(request, "demo", "0.1.0", "out", "Demo");
//! flake.generate()?;
//! flake.stage_for_version_control(&GitStaging::new("out"))?;
//! ```

pub mod code_request;
pub mod config;
pub mod dependency;
pub mod error;
pub mod flake;
pub mod notebook;
pub mod runner;
pub mod staging;

pub use code_request::{Cell, CodeRequest, TextNormalization};
pub use config::RunConfig;
pub use dependency::{Dependency, DependencyKind, CORE_DOMAIN_DEPENDENCY};
pub use error::{CodeRequestError, CodeRequestResult};
pub use flake::{
    compute_inputs, CodeRequestFlake, FlakeInput, FlakeInputSet, FlakeSpec, InputSpec, License,
    FLAKE_FILE, NOTEBOOK_FILE,
};
pub use notebook::{Notebook, NotebookCell};
pub use runner::{run, FlakeExecutor, NixExecutor};
pub use staging::{GitStaging, Staging};
