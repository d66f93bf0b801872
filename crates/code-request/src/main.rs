//! Command-line front end for code requests.
//!
//! Reads request envelopes (see `CodeRequest::serialize`) and turns them
//! into notebooks, generated flakes, or a running Jupyterlab session.
//!
//! # Usage
//!
//! ```bash
//! # Summarize a request
//! code-request inspect request.json
//!
//! # Generate flake.nix + code-request.ipynb and stage them
//! code-request generate request.json --output ./flake --jupyterlab --version 0.0.3 --stage
//!
//! # Launch it through nix in a throwaway directory
//! CODE_REQUEST_TIMEOUT_SECS=3600 code-request run request.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use code_requests::{
    compute_inputs, CodeRequest, CodeRequestFlake, GitStaging, RunConfig, TextNormalization,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cells and computed flake inputs of a request
    Inspect {
        /// Request envelope (JSON)
        request: PathBuf,
    },

    /// Generate flake.nix and code-request.ipynb for a request
    Generate {
        /// Request envelope (JSON)
        request: PathBuf,

        /// Folder to generate into (created if missing)
        #[arg(long, short)]
        output: PathBuf,

        /// Flake name (ignored with --jupyterlab)
        #[arg(long, default_value = "code-request")]
        name: String,

        /// Flake version
        #[arg(long, default_value = "0.0.1")]
        version: String,

        /// Flake description (ignored with --jupyterlab)
        #[arg(long, default_value = "A nix flake to run a code request")]
        description: String,

        /// Use the published Jupyterlab code request flake metadata
        #[arg(long, default_value_t = false)]
        jupyterlab: bool,

        /// Stage the generated files with git afterwards
        #[arg(long, default_value_t = false)]
        stage: bool,

        /// Run config (TOML); only `git_bin` is used here
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a request's notebook document
    Notebook {
        /// Request envelope (JSON)
        request: PathBuf,

        /// Destination file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Convert a plain .ipynb into a request envelope on stdout
    Import {
        /// Notebook file
        notebook: PathBuf,

        /// Strip leading whitespace from markdown lines on later appends
        #[arg(long, default_value_t = false)]
        jupyterlab: bool,
    },

    /// Generate a temporary flake for a request and run it with nix
    Run {
        /// Request envelope (JSON)
        request: PathBuf,

        /// Run config (TOML); environment variables fill in the rest
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_request(path: &Path) -> Result<CodeRequest> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {}", path.display()))?;
    CodeRequest::deserialize(&json)
        .with_context(|| format!("Invalid request envelope {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => Ok(RunConfig::from_file(path)?),
        None => Ok(RunConfig::default()),
    }
}

fn inspect(request: &CodeRequest, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "{} cell(s), normalization: {:?}",
        request.len(),
        request.normalization()
    )?;
    for (index, cell) in request.cells().iter().enumerate() {
        let kind = if cell.is_code() { "code" } else { "markdown" };
        let first_line = cell.text().lines().next().unwrap_or("");
        writeln!(out, "  [{index}] {kind:<8} {first_line}")?;
    }

    let inputs = compute_inputs(&request.dependencies());
    writeln!(out, "{} flake input(s):", inputs.len())?;
    for input in &inputs {
        writeln!(out, "  {} = {}", input.name, input.url)?;
        for nested in &input.inputs {
            writeln!(out, "    follows {}", nested.name)?;
        }
    }
    Ok(())
}

fn generate(
    request: CodeRequest,
    output: &Path,
    name: &str,
    version: &str,
    description: &str,
    jupyterlab: bool,
    staging: Option<&GitStaging>,
) -> Result<CodeRequestFlake> {
    let mut flake = if jupyterlab {
        CodeRequestFlake::jupyterlab(request, version, output)
    } else {
        CodeRequestFlake::jupyter(request, name, version, output, description)
    };
    flake.generate()?;
    info!(folder = %output.display(), inputs = flake.inputs.len(), "Flake generated");

    if let Some(staging) = staging {
        if !flake.stage_for_version_control(staging)? {
            bail!("nothing was generated to stage");
        }
    }
    Ok(flake)
}

fn import(notebook: &Path, jupyterlab: bool) -> Result<String> {
    let file = std::fs::File::open(notebook)
        .with_context(|| format!("Failed to open notebook {}", notebook.display()))?;
    let normalization = if jupyterlab {
        TextNormalization::StripLeadingWhitespace
    } else {
        TextNormalization::None
    };
    let request = CodeRequest::read_notebook(std::io::BufReader::new(file), normalization)?;
    Ok(request.serialize()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Inspect { request } => {
            let request = load_request(&request)?;
            inspect(&request, &mut std::io::stdout().lock())?;
        }
        Command::Generate {
            request,
            output,
            name,
            version,
            description,
            jupyterlab,
            stage,
            config,
        } => {
            let request = load_request(&request)?;
            let staging = if stage {
                let config = load_config(config.as_deref())?;
                Some(GitStaging::new(&output).with_bin(config.git_bin))
            } else {
                None
            };
            generate(
                request,
                &output,
                &name,
                &version,
                &description,
                jupyterlab,
                staging.as_ref(),
            )?;
        }
        Command::Notebook { request, output } => {
            let request = load_request(&request)?;
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    request.write(std::io::BufWriter::new(file))?;
                    info!(path = %path.display(), "Notebook written");
                }
                None => request.write(std::io::stdout().lock())?,
            }
        }
        Command::Import {
            notebook,
            jupyterlab,
        } => {
            println!("{}", import(&notebook, jupyterlab)?);
        }
        Command::Run { request, config } => {
            let request = load_request(&request)?;
            let config = load_config(config.as_deref())?;
            info!(nix = %config.nix_bin, cells = request.len(), "Running code request");
            request.run(&config).await?;
        }
    }

    Ok(())
}
