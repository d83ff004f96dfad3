//! Load-path directory scanner
//!
//! Walks a search root and lists its requirable files and subdirectories as
//! '/'-separated paths relative to the root. Symlinked directories are followed;
//! walkdir reports cycles as errors, which are skipped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::paths::{is_hidden, make_relative};
use crate::load_path::is_requirable;

/// Recursion bound in addition to walkdir's loop detection
pub const MAX_SCAN_DEPTH: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub requirables: BTreeSet<String>,
    pub dirs: BTreeSet<String>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.requirables.is_empty() && self.dirs.is_empty()
    }
}

/// Scan `root`, never descending into any path in `excluded`.
///
/// Dotfiles and dot-directories are skipped. A missing root yields an empty result.
pub fn scan(root: &Path, excluded: &[PathBuf]) -> ScanResult {
    let mut result = ScanResult::default();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .max_depth(MAX_SCAN_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            !is_hidden(entry.path()) && !excluded.iter().any(|ex| entry.path().starts_with(ex))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::trace!(
                    target: "prewarm::load_path",
                    root = %root.display(),
                    error = %err,
                    "skipping unreadable scan entry"
                );
                continue;
            }
        };

        let Some(relative) = make_relative(entry.path(), root) else {
            continue;
        };

        if entry.file_type().is_dir() {
            result.dirs.insert(relative);
        } else if is_requirable(&relative) {
            result.requirables.insert(relative);
        }
    }

    tracing::debug!(
        target: "prewarm::load_path",
        root = %root.display(),
        requirables = result.requirables.len(),
        dirs = result.dirs.len(),
        "scanned search root"
    );
    result
}
