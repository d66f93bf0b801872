//! End-to-end flake generation: build a request, generate its flake,
//! stage it in a real git repository, and read everything back.

use std::path::Path;
use std::process::Command;

use code_requests::{
    CodeRequest, CodeRequestError, CodeRequestFlake, Dependency, GitStaging, Staging,
    TextNormalization, FLAKE_FILE, NOTEBOOK_FILE,
};

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn init_repo(dir: &Path) {
    git(dir, &["init"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
}

fn sample_request() -> CodeRequest {
    let mut request = CodeRequest::jupyterlab();
    request.append_markdown(
        "
        # Commit statistics
        Counts commits per author.
        ",
    );
    request.append_code(
        "from pythoneda.shared.git import GitRepo\nrepo = GitRepo('.')",
        vec![Dependency::pythoneda(
            "pythoneda-shared-git-shared",
            "github:pythoneda-shared-git/shared/0.0.1",
        )],
    );
    request.append_code(
        "import pandas as pd\npd.DataFrame(repo.log())",
        vec![Dependency::new("pandas", "github:rydnr/nix-flakes/pandas")],
    );
    request
}

#[test]
fn title_and_code_scenario_serializes_two_cells() {
    let mut request = CodeRequest::new();
    request.append_markdown("# Title");
    request.append_code("print(1)", vec![Dependency::new("numpy", "pypi:numpy")]);

    let mut buf = Vec::new();
    request.write(&mut buf).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&buf).unwrap();

    let cells = doc["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0]["cell_type"], "markdown");
    assert_eq!(cells[0]["source"], serde_json::json!(["# Title"]));
    assert_eq!(cells[1]["cell_type"], "code");
    assert_eq!(cells[1]["source"], serde_json::json!(["print(1)"]));
    assert_eq!(
        request.dependencies(),
        vec![Dependency::new("numpy", "pypi:numpy")]
    );
}

#[test]
fn generation_is_byte_identical_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut flake = CodeRequestFlake::jupyterlab(sample_request(), "0.0.3", dir.path());

    flake.generate().unwrap();
    let manifest = std::fs::read(dir.path().join(FLAKE_FILE)).unwrap();
    let notebook = std::fs::read(dir.path().join(NOTEBOOK_FILE)).unwrap();

    flake.generate().unwrap();
    assert_eq!(std::fs::read(dir.path().join(FLAKE_FILE)).unwrap(), manifest);
    assert_eq!(std::fs::read(dir.path().join(NOTEBOOK_FILE)).unwrap(), notebook);

    // A fresh descriptor over an equal request produces the same bytes.
    let other = tempfile::tempdir().unwrap();
    let mut again = CodeRequestFlake::jupyterlab(sample_request(), "0.0.3", other.path());
    again.generate().unwrap();
    assert_eq!(std::fs::read(other.path().join(FLAKE_FILE)).unwrap(), manifest);
    assert_eq!(std::fs::read(other.path().join(NOTEBOOK_FILE)).unwrap(), notebook);
}

#[test]
fn generated_notebook_reads_back_as_the_same_cells() {
    let dir = tempfile::tempdir().unwrap();
    let request = sample_request();
    let mut flake = CodeRequestFlake::jupyterlab(request.clone(), "0.0.3", dir.path());
    flake.generate().unwrap();

    let file = std::fs::File::open(dir.path().join(NOTEBOOK_FILE)).unwrap();
    let back = CodeRequest::read_notebook(file, TextNormalization::StripLeadingWhitespace).unwrap();

    assert_eq!(back.len(), request.len());
    for (read, written) in back.cells().iter().zip(request.cells()) {
        assert_eq!(read.text(), written.text());
        assert_eq!(read.is_code(), written.is_code());
    }
    assert_eq!(
        request.cells()[0].text(),
        "\n# Commit statistics\nCounts commits per author.\n"
    );
}

#[test]
fn generated_manifest_declares_every_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut flake = CodeRequestFlake::jupyterlab(sample_request(), "0.0.3", dir.path());
    flake.generate().unwrap();
    let manifest = std::fs::read_to_string(dir.path().join(FLAKE_FILE)).unwrap();

    for name in [
        "flake-utils",
        "jupyterlab",
        "nixos",
        "pandas",
        "pythoneda-shared-git-shared",
        "pythoneda-shared-pythoneda-banner",
        "pythoneda-shared-pythoneda-domain",
    ] {
        let declared = manifest.contains(&format!("    {name}.url = "))
            || manifest.contains(&format!("    {name} = {{"));
        assert!(declared, "{name} not declared in:\n{manifest}");
    }
    assert!(manifest.contains("inputs.pandas.packages.${system}.default"));
}

#[test]
fn generated_files_are_staged_in_git() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());

    let mut flake = CodeRequestFlake::jupyterlab(sample_request(), "0.0.3", repo.path());
    let staging = GitStaging::new(repo.path());

    assert!(!flake.stage_for_version_control(&staging).unwrap());
    assert!(staging.staged_files().unwrap().is_empty());

    flake.generate().unwrap();
    assert!(flake.stage_for_version_control(&staging).unwrap());

    let mut staged = staging.staged_files().unwrap();
    staged.sort();
    assert_eq!(staged, vec![NOTEBOOK_FILE.to_string(), FLAKE_FILE.to_string()]);
}

#[test]
fn staging_failure_surfaces_to_the_caller() {
    struct Refuse;
    impl Staging for Refuse {
        fn stage(&self, relative_path: &Path) -> code_requests::CodeRequestResult<()> {
            Err(CodeRequestError::staging(relative_path, "read-only repository"))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let mut flake = CodeRequestFlake::jupyterlab(sample_request(), "0.0.3", dir.path());
    flake.generate().unwrap();

    let err = flake.stage_for_version_control(&Refuse).unwrap_err();
    assert!(err.to_string().contains(FLAKE_FILE));
}

#[test]
fn request_envelope_survives_a_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    let request = sample_request();

    std::fs::write(&path, request.serialize().unwrap()).unwrap();
    let back = CodeRequest::deserialize(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(back, request);
    assert_eq!(back.dependencies(), request.dependencies());
}
