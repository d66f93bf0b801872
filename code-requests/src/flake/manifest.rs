//! `flake.nix` rendering.
//!
//! Every input reachable from the flake's input set is declared at top
//! level, sorted by name; nested inputs become `follows` references so a
//! single version of each is used. The output is a `jupyter-lab` launcher
//! over the generated notebook with the direct inputs' default packages on
//! its `PATH`.

use crate::flake::descriptor::{CodeRequestFlake, NOTEBOOK_FILE};
use crate::flake::input::FlakeInput;
use std::fmt::Write;

const NIX_KEYWORDS: &[&str] = &[
    "assert", "else", "if", "in", "inherit", "let", "or", "rec", "then", "with",
];

/// Quote `s` as a Nix double-quoted string.
pub fn nix_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// An attribute name, quoted unless it is a plain identifier.
pub fn nix_attr(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => chars
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '\''),
        _ => false,
    };
    if plain && !NIX_KEYWORDS.contains(&name) {
        name.to_string()
    } else {
        nix_string(name)
    }
}

fn render_input(out: &mut String, input: &FlakeInput) {
    let attr = nix_attr(&input.name);
    if input.inputs.is_empty() {
        let _ = writeln!(out, "    {attr}.url = {};", nix_string(&input.url));
        return;
    }

    let mut follows: Vec<&str> = input.inputs.iter().map(|i| i.name.as_str()).collect();
    follows.sort_unstable();
    follows.dedup();

    let _ = writeln!(out, "    {attr} = {{");
    for name in follows {
        let _ = writeln!(
            out,
            "      inputs.{}.follows = {};",
            nix_attr(name),
            nix_string(name)
        );
    }
    let _ = writeln!(out, "      url = {};", nix_string(&input.url));
    out.push_str("    };\n");
}

pub fn render(flake: &CodeRequestFlake) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {} {}", flake.name, flake.version);
    out.push_str("#\n");
    out.push_str("# Generated from a code request. Do not edit by hand.\n");
    let _ = writeln!(
        out,
        "# Copyright (C) {}-today {}",
        flake.copyright_year, flake.copyright_holder
    );
    for author in &flake.authors {
        let _ = writeln!(out, "# Author: {author}");
    }
    out.push_str("{\n");
    let _ = writeln!(out, "  description = {};", nix_string(&flake.description));

    out.push_str("  inputs = {\n");
    let mut declared = flake.inputs.closure();
    declared.sort_by(|a, b| a.name.cmp(&b.name));
    for input in declared {
        render_input(&mut out, input);
    }
    out.push_str("  };\n");

    out.push_str("  outputs = inputs:\n");
    out.push_str("    with inputs;\n");
    out.push_str("    flake-utils.lib.eachDefaultSystem (system:\n");
    out.push_str("      let\n");
    let _ = writeln!(out, "        pname = {};", nix_string(&flake.name));
    let _ = writeln!(out, "        version = {};", nix_string(&flake.version));
    out.push_str("        pkgs = import nixos { inherit system; };\n");
    let _ = writeln!(
        out,
        "        description = {};",
        nix_string(&flake.description)
    );
    let _ = writeln!(
        out,
        "        license = pkgs.lib.licenses.{};",
        flake.license.nix_name()
    );
    let _ = writeln!(out, "        homepage = {};", nix_string(&flake.homepage));
    let _ = writeln!(out, "        notebook = ./{NOTEBOOK_FILE};");
    out.push_str("        runtimeInputs = [\n");
    for input in &flake.inputs {
        let _ = writeln!(
            out,
            "          inputs.{}.packages.${{system}}.default",
            nix_attr(&input.name)
        );
    }
    out.push_str("        ];\n");
    out.push_str("      in rec {\n");
    out.push_str("        packages.default = pkgs.writeShellApplication {\n");
    out.push_str("          name = pname;\n");
    out.push_str("          inherit runtimeInputs;\n");
    out.push_str("          text = ''\n");
    out.push_str("            jupyter-lab \"${notebook}\"\n");
    out.push_str("          '';\n");
    out.push_str("          meta = { inherit description homepage license; };\n");
    out.push_str("        };\n");
    out.push_str("        apps.default = flake-utils.lib.mkApp { drv = packages.default; };\n");
    out.push_str("        defaultPackage = packages.default;\n");
    out.push_str("        defaultApp = apps.default;\n");
    out.push_str("      });\n");
    out.push_str("}\n");
    out
}
