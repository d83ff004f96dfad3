//! Already-loaded dedup index
//!
//! Mirrors the host's "already required" bookkeeping by short name. Without it,
//! requiring `a`, prepending a root that also has an `a.rb`, then requiring `a`
//! again would load a second file; the host itself would treat the second
//! require as a no-op.
//!
//! Names map to a hash of the absolute path they were registered against, so
//! purging a path removes every alias of it at once.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use regex::Regex;

use crate::core::paths::{extname, make_relative, normalize_path};
use crate::core::util::hash64;

/// Extensions the host lets callers omit
pub const ELIDABLE_EXTENSIONS: [&str; 6] = [".rb", ".so", ".o", ".dll", ".dylib", ".bundle"];

#[derive(Debug, Default)]
pub struct LoadedFeaturesIndex {
    map: Mutex<HashMap<String, u64>>,
}

impl LoadedFeaturesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the host's already-loaded list, inferring short names from
    /// every load-path entry that prefixes a loaded path
    pub fn from_loaded(loaded: &[PathBuf], load_path: &[PathBuf]) -> Self {
        let index = Self::new();
        {
            let mut map = index.lock();
            for feature in loaded {
                let hash = identity(feature);
                for root in load_path {
                    let Some(short) = make_relative(feature, root) else {
                        continue;
                    };
                    if short.is_empty() {
                        continue;
                    }
                    map.insert(strip_extension(&short).to_string(), hash);
                    map.insert(short, hash);
                }
            }
        }
        index
    }

    /// Whether `short` was registered against some loaded path
    pub fn contains(&self, short: &str) -> bool {
        self.lock().contains_key(short)
    }

    /// Record that requesting `short` loaded `long`
    pub fn register(&self, short: &str, long: &Path) {
        let hash = identity(long);
        let altname = if !extname(short).is_empty() {
            // 'bundler.rb' -> 'bundler'
            let stripped = strip_extension(short);
            (stripped != short).then(|| stripped.to_string())
        } else {
            // 'bundler' + '.rb' taken from the loaded path
            let ext = extname(long.to_str().unwrap_or_default());
            (!ext.is_empty()).then(|| format!("{short}{ext}"))
        };

        let mut map = self.lock();
        map.insert(short.to_string(), hash);
        if let Some(altname) = altname {
            map.insert(altname, hash);
        }
    }

    /// Register `short` when the loaded path was not known up front.
    ///
    /// `new_features` are the paths the host added to its loaded list while
    /// handling the request; the first one ending in `/<short>` with an
    /// optional extension is taken as the loaded path.
    pub fn register_unresolved(&self, short: &str, new_features: &[PathBuf]) -> Option<PathBuf> {
        let pattern = Regex::new(&format!(r"/{}(\.[^/]+)?$", regex::escape(short))).ok()?;
        let long = new_features
            .iter()
            .find(|f| pattern.is_match(&normalize_path(f)))?
            .clone();
        self.register(short, &long);
        Some(long)
    }

    /// Forget every name registered against `long`
    pub fn purge(&self, long: &Path) {
        let hash = identity(long);
        self.lock().retain(|_, h| *h != hash);
    }

    pub fn purge_many(&self, longs: &[PathBuf]) {
        let hashes: HashSet<u64> = longs.iter().map(|p| identity(p)).collect();
        self.lock().retain(|_, h| !hashes.contains(h));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.map.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn identity(path: &Path) -> u64 {
    hash64(normalize_path(path).as_bytes())
}

/// Drop an elidable extension (`descriptor.pb.rb` -> `descriptor.pb`); other names are unchanged
pub fn strip_extension(name: &str) -> &str {
    let ext = extname(name);
    if ELIDABLE_EXTENSIONS.contains(&ext) {
        &name[..name.len() - ext.len()]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("bundler.rb"), "bundler");
        assert_eq!(strip_extension("descriptor.pb.rb"), "descriptor.pb");
        assert_eq!(strip_extension("descriptor.pb"), "descriptor.pb");
        assert_eq!(strip_extension("ext.bundle"), "ext");
        assert_eq!(strip_extension("plain"), "plain");
    }

    #[test]
    fn test_register_with_extension_adds_stripped_alias() {
        let index = LoadedFeaturesIndex::new();
        index.register("bundlerlike.rb", Path::new("/a/b/bundlerlike.rb"));
        assert!(index.contains("bundlerlike.rb"));
        assert!(index.contains("bundlerlike"));
        assert!(!index.contains("foo"));
    }

    #[test]
    fn test_register_bare_name_adds_extension_alias() {
        let index = LoadedFeaturesIndex::new();
        index.register("bundlerlike", Path::new("/a/b/bundlerlike.ext"));
        assert!(index.contains("bundlerlike"));
        assert!(index.contains("bundlerlike.ext"));
        assert!(!index.contains("foo"));
    }

    #[test]
    fn test_from_loaded_infers_short_names() {
        let loaded = vec![PathBuf::from("/gems/x/lib/x/version.rb")];
        let load_path = vec![PathBuf::from("/gems/x/lib"), PathBuf::from("/other")];
        let index = LoadedFeaturesIndex::from_loaded(&loaded, &load_path);
        assert!(index.contains("x/version.rb"));
        assert!(index.contains("x/version"));
        assert!(!index.contains("version"));
    }

    #[test]
    fn test_purge_removes_all_aliases() {
        let index = LoadedFeaturesIndex::new();
        index.register("a.rb", Path::new("/r1/a.rb"));
        index.register("b", Path::new("/r1/b.rb"));
        index.purge(Path::new("/r1/a.rb"));
        assert!(!index.contains("a"));
        assert!(!index.contains("a.rb"));
        assert!(index.contains("b"));

        index.purge_many(&[PathBuf::from("/r1/b.rb")]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_same_basename_different_dirs_stay_distinct() {
        let index = LoadedFeaturesIndex::new();
        index.register("one/util", Path::new("/r/one/util.rb"));
        assert!(index.contains("one/util"));
        assert!(!index.contains("two/util"));
        assert!(!index.contains("util"));
    }

    #[test]
    fn test_register_unresolved_finds_new_feature() {
        let index = LoadedFeaturesIndex::new();
        let added = vec![
            PathBuf::from("/r/dep.rb"),
            PathBuf::from("/r/tasks/build.rake"),
        ];
        let long = index.register_unresolved("tasks/build", &added);
        assert_eq!(long, Some(PathBuf::from("/r/tasks/build.rake")));
        assert!(index.contains("tasks/build"));
        assert!(index.contains("tasks/build.rake"));

        assert_eq!(index.register_unresolved("missing", &added), None);
        assert!(!index.contains("missing"));
    }
}
