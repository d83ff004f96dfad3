//! Search roots
//!
//! A root is STABLE when it lives under an installation prefix (runtime or
//! package directories) and VOLATILE otherwise. Stable listings are taken from
//! the scan cache forever; volatile ones only while the newest directory mtime
//! in the subtree is unchanged.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::paths::{absolutize, join_normalized, normalize_path};
use crate::core::util::{hash64, path_mtime_secs};
use crate::load_path::scanner::{scan, ScanResult};
use crate::load_path::store::{ScanStore, StoredScan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    Stable,
    Volatile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoot {
    /// The entry as it appears in the load path
    pub path: PathBuf,
    /// `path` made absolute against the working directory at creation
    pub expanded: PathBuf,
    pub stability: Stability,
}

impl SearchRoot {
    pub fn new(path: impl Into<PathBuf>, cwd: &Path, stable_prefixes: &[PathBuf]) -> Self {
        let path = path.into();
        let expanded = absolutize(&path, cwd);
        let stability = if stable_prefixes.iter().any(|p| expanded.starts_with(p)) {
            Stability::Stable
        } else {
            Stability::Volatile
        };
        Self {
            path,
            expanded,
            stability,
        }
    }

    pub fn is_stable(&self) -> bool {
        self.stability == Stability::Stable
    }

    pub fn is_volatile(&self) -> bool {
        self.stability == Stability::Volatile
    }

    /// Requirable files and subdirectories of this root, via the scan cache when valid.
    ///
    /// A cached listing scanned under a different exclusion list is never reused.
    pub fn entries_and_dirs(&self, store: &ScanStore, excluded: &[PathBuf]) -> ScanResult {
        let exclusions = exclusion_fingerprint(excluded);
        let cached = store
            .get(&self.expanded)
            .filter(|c| c.exclusions == exclusions);

        if self.is_stable() {
            if let Some(cached) = cached {
                return cached.scan;
            }
            // mtime is unused for stable roots but recorded as 0 in case the
            // classification changes later.
            let fresh = scan(&self.expanded, excluded);
            store.set(
                &self.expanded,
                StoredScan {
                    mtime: 0,
                    exclusions,
                    scan: fresh.clone(),
                },
            );
            return fresh;
        }

        let dirs: Vec<&str> = cached
            .as_ref()
            .map(|c| c.scan.dirs.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let current = latest_mtime(&self.expanded, &dirs);
        if current == -1 {
            return ScanResult::default();
        }
        if let Some(cached) = cached {
            if cached.mtime == current {
                return cached.scan;
            }
        }

        let fresh = scan(&self.expanded, excluded);
        // Rescanning may have found new directories; validate against all of them.
        let dirs: Vec<&str> = fresh.dirs.iter().map(String::as_str).collect();
        let mtime = latest_mtime(&self.expanded, &dirs).max(current);
        store.set(
            &self.expanded,
            StoredScan {
                mtime,
                exclusions,
                scan: fresh.clone(),
            },
        );
        fresh
    }
}

/// Order-insensitive hash of an exclusion list; 0 when empty
pub fn exclusion_fingerprint(excluded: &[PathBuf]) -> u64 {
    if excluded.is_empty() {
        return 0;
    }
    let mut paths: Vec<String> = excluded.iter().map(|p| normalize_path(p)).collect();
    paths.sort();
    paths.dedup();
    hash64(paths.join("\0").as_bytes())
}

/// Newest mtime (seconds) over `root` and `root/<dir>` for each dir; -1 when `root` is missing
pub fn latest_mtime(root: &Path, dirs: &[&str]) -> i64 {
    let Some(root_mtime) = path_mtime_secs(root) else {
        return -1;
    };
    dirs.iter()
        .filter_map(|dir| path_mtime_secs(&join_normalized(root, dir)))
        .fold(root_mtime as i64, |max, m| max.max(m as i64))
}
