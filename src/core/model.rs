//! Unified Result Model
//!
//! Every CLI command maps its outcome to this model before rendering output.

use serde::{Deserialize, Serialize};

/// The kind of result item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// A requirable file found by a scan
    File,
    /// A directory found by a scan
    Dir,
    /// The answer to a resolve query
    Resolution,
    /// A compile cache entry
    Entry,
    /// A precompiled source file
    Compile,
    Error,
}

/// Metadata for a result item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Modification time in seconds since epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<u64>,

    /// File size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Content-addressed location hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Error information for a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub code: String,
    pub message: String,
}

impl ItemError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The unified result item that all commands produce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub kind: Kind,

    /// Path (relative for scan results, absolute otherwise), '/'-separated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// The requested name for resolve queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Short outcome label (e.g. `found`, `hit`, `revalidated`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Structured payload for commands like inspect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "is_default_meta")]
    pub meta: Meta,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ItemError>,
}

fn is_default_meta(meta: &Meta) -> bool {
    *meta == Meta::default()
}

impl ResultItem {
    fn bare(kind: Kind) -> Self {
        Self {
            kind,
            path: None,
            name: None,
            status: None,
            data: None,
            meta: Meta::default(),
            errors: Vec::new(),
        }
    }

    /// Create a new file result
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::bare(Kind::File)
        }
    }

    /// Create a new directory result
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::bare(Kind::Dir)
        }
    }

    /// Create a resolve answer
    pub fn resolution(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            status: Some(status.into()),
            ..Self::bare(Kind::Resolution)
        }
    }

    /// Create a cache entry description
    pub fn entry(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::bare(Kind::Entry)
        }
    }

    /// Create a precompile outcome
    pub fn compile(path: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            status: Some(status.into()),
            ..Self::bare(Kind::Compile)
        }
    }

    /// Create a new error result
    pub fn error(error: ItemError) -> Self {
        Self {
            errors: vec![error],
            ..Self::bare(Kind::Error)
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, error: ItemError) -> Self {
        self.errors.push(error);
        self
    }
}

/// Result set containing multiple result items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ResultItem>) {
        self.items.extend(items);
    }

    /// Sort items by kind then path for stable output
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| {
            (a.kind as u8)
                .cmp(&(b.kind as u8))
                .then_with(|| a.path.cmp(&b.path))
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultItem;
    type IntoIter = std::vec::IntoIter<ResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<ResultItem> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ResultItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_item_serialization_skips_empty() {
        let item = ResultItem::file("lib/a.rb");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["path"], "lib/a.rb");
        assert!(json.get("meta").is_none());
        assert!(json.get("errors").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_resolution_item() {
        let item = ResultItem::resolution("foo", "found").with_path("/lib/foo.rb");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "resolution");
        assert_eq!(json["name"], "foo");
        assert_eq!(json["status"], "found");
        assert_eq!(json["path"], "/lib/foo.rb");
    }

    #[test]
    fn test_sort_groups_by_kind_then_path() {
        let mut set: ResultSet = vec![
            ResultItem::dir("b"),
            ResultItem::file("z.rb"),
            ResultItem::file("a.rb"),
            ResultItem::dir("a"),
        ]
        .into_iter()
        .collect();
        set.sort();
        let paths: Vec<_> = set.items.iter().map(|i| i.path.clone().unwrap()).collect();
        assert_eq!(paths, vec!["a.rb", "z.rb", "a", "b"]);
    }
}
