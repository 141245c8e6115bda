use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Comparison key for a path: absolute, symlinks and `.`/`..` resolved,
/// case-folded. Two spellings of one file collapse to the same key.
pub fn normalize(path: &Path) -> String {
    resolve(path).to_string_lossy().to_lowercase()
}

/// The first spelling seen for a key is the one kept.
pub fn dedupe(paths: Vec<PathBuf>) -> Vec<(String, PathBuf)> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter_map(|path| {
            let key = normalize(&path);
            seen.insert(key.clone()).then_some((key, path))
        })
        .collect()
}

fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    if let Ok(canonical) = fs::canonicalize(&absolute) {
        return canonical;
    }

    // The file may be gone or spelled differently from disk; resolve the
    // closest existing ancestor and keep the rest as written.
    let cleaned = lexical_clean(&absolute);
    let mut tail = Vec::new();
    let mut cursor = cleaned.as_path();
    while let (Some(parent), Some(name)) = (cursor.parent(), cursor.file_name()) {
        tail.push(name);
        if let Ok(mut resolved) = fs::canonicalize(parent) {
            resolved.extend(tail.iter().rev());
            return resolved;
        }
        cursor = parent;
    }
    cleaned
}

fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
