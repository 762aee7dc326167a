// Source document loading
// Scans the configured docs tree for plain-text and markdown sources


pub mod splitter;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{HolosError, Result};

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// A raw source document prior to splitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub content: String,
}

impl SourceDocument {
    #[inline]
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Recursively load all supported documents under `root`, sorted by path.
///
/// A missing root yields an empty set; unreadable files are skipped with a
/// warning so a single bad file cannot block indexing.
#[inline]
pub fn load_documents(root: &Path) -> Result<Vec<SourceDocument>> {
    if !root.exists() {
        warn!("Documents directory does not exist: {}", root.display());
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    collect_paths(root, &mut paths)?;
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match fs::read_to_string(&path) {
            Ok(content) => {
                documents.push(SourceDocument::new(path, content));
            }
            Err(e) => {
                warn!("Skipping unreadable document {}: {}", path.display(), e);
            }
        }
    }

    debug!(
        "Loaded {} documents from {}",
        documents.len(),
        root.display()
    );
    Ok(documents)
}

fn collect_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        HolosError::Document(format!("Failed to read directory {}: {}", dir.display(), e))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            HolosError::Document(format!(
                "Failed to read entry in {}: {}",
                dir.display(),
                e
            ))
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_paths(&path, out)?;
        } else if is_supported(&path) {
            out.push(path);
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}
