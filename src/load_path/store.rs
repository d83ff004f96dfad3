//! Persistent scan cache
//!
//! Scan results keyed by absolute search root, stored as one JSON document
//! under the cache directory. Writes go through [`atomic_write`], so
//! concurrent processes only ever lose updates, never corrupt the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::atomic::atomic_write;
use crate::load_path::scanner::ScanResult;

/// Bumped when the document shape changes; older files are discarded
pub const STORE_VERSION: u32 = 2;

/// One root's cached listing and the mtime it was validated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredScan {
    /// Max mtime over the root and its subdirectories; 0 for stable roots
    pub mtime: i64,
    /// Fingerprint of the exclusion list the listing was scanned with
    #[serde(default)]
    pub exclusions: u64,
    #[serde(flatten)]
    pub scan: ScanResult,
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    generated_at: DateTime<Utc>,
    entries: BTreeMap<String, StoredScan>,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, StoredScan>,
    dirty: bool,
}

#[derive(Debug)]
pub struct ScanStore {
    path: Option<PathBuf>,
    readonly: bool,
    state: Mutex<State>,
}

impl ScanStore {
    /// Load from `path`; a missing, malformed or foreign-version file yields an empty store
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Document>(&bytes) {
                Ok(doc) if doc.version == STORE_VERSION => doc.entries,
                Ok(doc) => {
                    tracing::debug!(
                        target: "prewarm::load_path",
                        path = %path.display(),
                        found = doc.version,
                        "discarding scan cache from another version"
                    );
                    BTreeMap::new()
                }
                Err(err) => {
                    tracing::debug!(
                        target: "prewarm::load_path",
                        path = %path.display(),
                        error = %err,
                        "discarding malformed scan cache"
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: Some(path),
            readonly: false,
            state: Mutex::new(State {
                entries,
                dirty: false,
            }),
        }
    }

    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            readonly: false,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_readonly(mut self, on: bool) -> Self {
        self.readonly = on;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, root: &Path) -> Option<StoredScan> {
        self.lock().entries.get(&key(root)).cloned()
    }

    pub fn set(&self, root: &Path, value: StoredScan) {
        let mut state = self.lock();
        let k = key(root);
        if state.entries.get(&k) != Some(&value) {
            state.entries.insert(k, value);
            state.dirty = true;
        }
    }

    /// Cached value for `root`, computing and storing it on a miss
    pub fn fetch(&self, root: &Path, compute: impl FnOnce() -> StoredScan) -> StoredScan {
        if let Some(found) = self.get(root) {
            return found;
        }
        let value = compute();
        self.set(root, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Persist pending changes. Write failures are logged and otherwise ignored.
    pub fn commit(&self) {
        let Some(path) = &self.path else { return };
        if self.readonly {
            return;
        }

        let mut state = self.lock();
        if !state.dirty {
            return;
        }
        let doc = Document {
            version: STORE_VERSION,
            generated_at: Utc::now(),
            entries: state.entries.clone(),
        };
        let bytes = match serde_json::to_vec(&doc) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(target: "prewarm::load_path", error = %err, "failed to encode scan cache");
                return;
            }
        };
        match atomic_write(path, &bytes) {
            Ok(()) => state.dirty = false,
            Err(err) => tracing::warn!(
                target: "prewarm::load_path",
                path = %path.display(),
                error = %err,
                "failed to write scan cache"
            ),
        }
    }

    /// Drop every cached listing
    pub fn clear(&self) {
        let mut state = self.lock();
        if !state.entries.is_empty() {
            state.entries.clear();
            state.dirty = true;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // State stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn key(root: &Path) -> String {
    crate::core::paths::normalize_path(root)
}
