//! Content-addressed cache file locations
//!
//! `<kind_dir>/<2 hex chars>/<14 hex chars>`, where the 16 hex chars are the
//! xxh3-64 of the absolute source path plus an optional secondary key.
//! Collisions are not detected.

use std::path::{Path, PathBuf};

use crate::core::util::hash_hex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheLocation {
    pub shard: String,
    pub rest: String,
}

impl CacheLocation {
    pub fn new(source_path: &Path, secondary: Option<&[u8]>) -> Self {
        let mut input = source_path.as_os_str().as_encoded_bytes().to_vec();
        if let Some(extra) = secondary {
            // Separator keeps ("a", "bc") apart from ("ab", "c").
            input.push(0);
            input.extend_from_slice(extra);
        }
        let hex = hash_hex(&input);
        let (shard, rest) = hex.split_at(2);
        Self {
            shard: shard.to_string(),
            rest: rest.to_string(),
        }
    }

    /// The full 16-char hex hash
    pub fn hash(&self) -> String {
        format!("{}{}", self.shard, self.rest)
    }

    /// Path of the entry under a kind directory
    pub fn path_in(&self, kind_dir: &Path) -> PathBuf {
        kind_dir.join(&self.shard).join(&self.rest)
    }
}
