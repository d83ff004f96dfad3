//! Observed load path
//!
//! The ordered root list is owned here and every change is forwarded to the
//! resolution index. Appends and prepends are applied incrementally; anything
//! else rebuilds the index from the list's new contents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::load_path::index::{Mutation, ResolutionIndex};

#[derive(Debug)]
pub struct ObservedLoadPath {
    entries: Vec<PathBuf>,
    index: Arc<ResolutionIndex>,
}

impl ObservedLoadPath {
    /// Take ownership of `initial` and index it from scratch
    pub fn new(index: Arc<ResolutionIndex>, initial: Vec<PathBuf>) -> Self {
        index.observe(Mutation::Rebuild(initial.clone()));
        Self {
            entries: initial,
            index,
        }
    }

    pub fn index(&self) -> &Arc<ResolutionIndex> {
        &self.index
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.concat(vec![path.into()]);
    }

    pub fn concat(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        self.entries.extend(paths.iter().cloned());
        self.index.observe(Mutation::Append(paths));
    }

    /// Prepend `paths`; the first element ends up first in the list
    pub fn unshift(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        self.entries.splice(0..0, paths.iter().cloned());
        self.index.observe(Mutation::Prepend(paths));
    }

    /// Remove every occurrence of `path`; returns whether anything was removed
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p != path);
        let removed = self.entries.len() != before;
        if removed {
            self.rebuild();
        }
        removed
    }

    pub fn replace_all(&mut self, paths: Vec<PathBuf>) {
        self.entries = paths;
        self.rebuild();
    }

    /// Arbitrary in-place change (sort, dedup, map, ...); always rebuilds
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Vec<PathBuf>) -> R) -> R {
        let result = f(&mut self.entries);
        self.rebuild();
        result
    }

    fn rebuild(&self) {
        self.index.observe(Mutation::Rebuild(self.entries.clone()));
    }
}

impl<'a> IntoIterator for &'a ObservedLoadPath {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
