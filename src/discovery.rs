//! Purpose: Enumerate snippet source units in a directory.
//! Exports: `SourceUnit`, `discover`, `is_snippet_name`, `default_snippets_dir`.
//! Role: First startup stage; the registry decides which units actually load.
//! Invariants: Names are derived from `<name>.rs` and are valid URL path segments.
//! Invariants: `_`-prefixed files and `mod.rs` are internal and never listed.
//! Invariants: Output is sorted by name; one unreadable entry never aborts the scan.
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

const SOURCE_EXTENSION: &str = "rs";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceUnit {
    pub name: String,
    pub path: PathBuf,
}

/// The snippet sources this crate was built from.
pub fn default_snippets_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join("snippets")
}

pub fn is_snippet_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}

pub fn discover(dir: &Path) -> Result<Vec<SourceUnit>, Error> {
    let entries = std::fs::read_dir(dir).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read snippets directory")
            .with_path(dir)
            .with_hint("Pass --snippets-dir pointing at a directory of snippet sources.")
            .with_source(err)
    })?;

    let mut units = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = candidate_name(&path) else {
            continue;
        };
        if !is_snippet_name(name) {
            tracing::warn!(file = %path.display(), "skipping snippet with invalid name");
            continue;
        }
        units.push(SourceUnit {
            name: name.to_string(),
            path: path.clone(),
        });
    }
    units.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(units)
}

fn candidate_name(path: &Path) -> Option<&str> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('_') || stem == "mod" {
        return None;
    }
    Some(stem)
}
