//! Purpose: Generate the compiled snippet-unit table from `src/snippets/`.
//! Role: Cargo build-script; writes `$OUT_DIR/snippet_units.rs` for `src/snippets/mod.rs`.
//! Invariants: `cargo:rerun-if-changed` covers the snippets directory and each snippet file.
//! Invariants: A file that fails to parse or lacks `pub fn unit()` is skipped with a warning.
//! Invariants: Naming rules match `discovery`: `<name>.rs`, no `_` prefix, not `mod.rs`.
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    let snippets_dir = manifest_dir.join("src").join("snippets");

    println!("cargo:rerun-if-changed=src/snippets");

    let mut paths: Vec<PathBuf> = fs::read_dir(&snippets_dir)
        .expect("failed to read src/snippets")
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    paths.sort();

    let mut units = Vec::new();
    for path in paths {
        let Some(name) = snippet_name(&path) else {
            continue;
        };
        println!("cargo:rerun-if-changed={}", path.display());
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) => {
                println!("cargo:warning=skipping snippet {name}: {err}");
                continue;
            }
        };
        match syn::parse_file(&source) {
            Ok(file) if has_unit_fn(&file) => units.push((name, path)),
            Ok(_) => println!("cargo:warning=skipping snippet {name}: no `pub fn unit()`"),
            Err(err) => println!("cargo:warning=skipping snippet {name}: syntax error: {err}"),
        }
    }

    fs::write(out_dir.join("snippet_units.rs"), render_table(&units))
        .expect("failed to write snippet table");
}

fn snippet_name(path: &Path) -> Option<String> {
    if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("rs") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('_') || stem == "mod" {
        return None;
    }
    let valid = stem.chars().next().is_some_and(|ch| ch.is_ascii_lowercase())
        && stem
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
    if !valid {
        println!("cargo:warning=skipping snippet file with invalid name: {}", path.display());
        return None;
    }
    Some(stem.to_string())
}

fn has_unit_fn(file: &syn::File) -> bool {
    file.items.iter().any(|item| match item {
        syn::Item::Fn(func) => {
            func.sig.ident == "unit"
                && func.sig.inputs.is_empty()
                && !matches!(func.vis, syn::Visibility::Inherited)
        }
        _ => false,
    })
}

fn render_table(units: &[(String, PathBuf)]) -> String {
    let mut out = String::from("// @generated by build.rs from src/snippets; do not edit.\n\n");
    for (name, path) in units {
        let _ = writeln!(out, "#[path = {:?}]", path.display().to_string());
        let _ = writeln!(out, "pub mod {name};");
    }
    out.push_str("\n/// Every snippet unit compiled into this crate, keyed by file name.\n");
    out.push_str("pub fn compiled_units() -> Vec<(&'static str, crate::unit::Unit)> {\n");
    out.push_str("    vec![\n");
    for (name, _) in units {
        let _ = writeln!(out, "        ({name:?}, {name}::unit()),");
    }
    out.push_str("    ]\n}\n");
    out
}
