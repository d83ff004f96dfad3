//! Compiled-artifact cache store
//!
//! One [`CompileCache`] per artifact kind. Entries live under
//! `<cache_dir>/compile-cache[-kind]/<shard>/<rest>` and are
//! `[64-byte header][payload]`; see [`crate::cache::key`] for the header.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::atomic::{atomic_write, read_file_limited, remove_file_best_effort, write_at};
use crate::cache::handler::Handler;
use crate::cache::key::{compute_key, CacheKey, EntryHeader, InvalidationContext, HEADER_LEN};
use crate::cache::location::CacheLocation;
use crate::cache::policy::{decide, Decision};
use crate::cache::stats::{Event, Stats, StatsSnapshot};
use crate::core::config::Config;
use crate::core::paths::absolutize;
use crate::error::{is_unwritable, CacheError, KeyError, Result};

/// Payloads above this size bypass the cache entirely
pub const MAX_PAYLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Artifact kinds, each isolated in its own directory under the cache root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Source,
    Yaml,
    Json,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Source, ArtifactKind::Yaml, ArtifactKind::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Source => "source",
            ArtifactKind::Yaml => "yaml",
            ArtifactKind::Json => "json",
        }
    }

    /// Directory name under the cache root
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Source => "compile-cache",
            ArtifactKind::Yaml => "compile-cache-yaml",
            ArtifactKind::Json => "compile-cache-json",
        }
    }

    /// Kind of a file by extension, `None` for files no kind handles
    pub fn for_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "rb" => Some(ArtifactKind::Source),
            "yml" | "yaml" => Some(ArtifactKind::Yaml),
            "json" => Some(ArtifactKind::Json),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "source" | "rb" | "iseq" => Ok(ArtifactKind::Source),
            "yaml" | "yml" => Ok(ArtifactKind::Yaml),
            "json" => Ok(ArtifactKind::Json),
            _ => Err(format!("Unknown artifact kind: {}", s)),
        }
    }
}

type EventCallback = Box<dyn Fn(Event, &Path) + Send + Sync>;

/// What `fetch` would do for a file, without doing it
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub kind: ArtifactKind,
    pub source: PathBuf,
    pub entry: PathBuf,
    pub hash: String,
    pub exists: bool,
    pub stored: Option<CacheKey>,
    pub payload_len: Option<u64>,
    pub current: CacheKey,
    pub decision: Decision,
}

pub struct CompileCache {
    kind: ArtifactKind,
    dir: PathBuf,
    context: Arc<InvalidationContext>,
    enabled: bool,
    revalidation: bool,
    readonly: bool,
    stats: Stats,
    on_event: Option<EventCallback>,
}

impl fmt::Debug for CompileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileCache")
            .field("kind", &self.kind)
            .field("dir", &self.dir)
            .field("enabled", &self.enabled)
            .field("revalidation", &self.revalidation)
            .field("readonly", &self.readonly)
            .finish()
    }
}

impl CompileCache {
    /// Cache for `kind` under `cache_root`
    pub fn new(cache_root: &Path, kind: ArtifactKind, context: Arc<InvalidationContext>) -> Self {
        Self {
            kind,
            dir: cache_root.join(kind.dir_name()),
            context,
            enabled: true,
            revalidation: false,
            readonly: false,
            stats: Stats::default(),
            on_event: None,
        }
    }

    /// Cache for `kind` honoring the revalidation and readonly settings of `config`
    pub fn from_config(config: &Config, kind: ArtifactKind, context: Arc<InvalidationContext>) -> Self {
        Self::new(&config.cache_dir, kind, context)
            .with_revalidation(config.revalidation)
            .with_readonly(config.readonly)
    }

    pub fn with_revalidation(mut self, on: bool) -> Self {
        self.revalidation = on;
        self
    }

    pub fn with_readonly(mut self, on: bool) -> Self {
        self.readonly = on;
        self
    }

    /// A disabled cache calls `direct` for every fetch
    pub fn with_enabled(mut self, on: bool) -> Self {
        self.enabled = on;
        self
    }

    pub fn on_event(mut self, callback: impl Fn(Event, &Path) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Box::new(callback));
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn context(&self) -> &InvalidationContext {
        &self.context
    }

    /// Change the compile options folded into every key's `invalidation_tag`
    pub fn set_compile_options(&self, options: &[u8]) {
        self.context.set_compile_options(options);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// On-disk path of the entry for `source_path`
    pub fn entry_path(&self, source_path: &Path, options: Option<&[u8]>) -> PathBuf {
        self.location(source_path, options).path_in(&self.dir)
    }

    fn location(&self, source_path: &Path, options: Option<&[u8]>) -> CacheLocation {
        CacheLocation::new(source_path, options)
    }

    /// Return the output for `source_path`, compiling on a miss.
    ///
    /// Only [`CacheError::SourceNotFound`], [`CacheError::Uncompilable`] and
    /// source read errors reach the caller; cache malfunctions are recovered.
    pub fn fetch<H: Handler>(
        &self,
        source_path: &Path,
        handler: &H,
        options: Option<&[u8]>,
    ) -> Result<H::Output> {
        let source_path = absolute(source_path)?;
        let source_path = source_path.as_path();

        if !self.enabled {
            let source = read_source(source_path)?;
            return self.direct(handler, &source, source_path);
        }

        let current = compute_key(source_path, &self.context)?;
        let entry_path = self.entry_path(source_path, options);
        let (exists, stored) = self.read_entry(&entry_path, !self.readonly);

        let decision = match &stored {
            None if exists => Decision::Stale,
            _ => decide(
                stored.as_ref().map(|(header, _)| &header.key),
                &current,
                self.revalidation,
            ),
        };

        if let (Decision::Hit | Decision::Revalidate, Some((header, payload))) = (decision, &stored) {
            match handler.deserialize(payload) {
                Ok(output) => {
                    if decision == Decision::Revalidate {
                        if !self.readonly {
                            self.refresh_header(&entry_path, header, &current);
                        }
                        self.emit(Event::Revalidated, source_path);
                    } else {
                        self.emit(Event::Hit, source_path);
                    }
                    return Ok(output);
                }
                Err(err) => {
                    self.stats.corrupt();
                    tracing::debug!(
                        target: "prewarm::cache",
                        path = %source_path.display(),
                        error = %err,
                        "stored payload is corrupt; recompiling"
                    );
                }
            }
            self.emit(Event::Stale, source_path);
        } else if decision == Decision::Miss {
            self.emit(Event::Miss, source_path);
        } else {
            self.emit(Event::Stale, source_path);
        }

        self.recompile(source_path, handler, &entry_path, current)
    }

    /// Describe the entry for `source_path` and the decision `fetch` would take
    pub fn inspect(&self, source_path: &Path, options: Option<&[u8]>) -> Result<Inspection> {
        let source_path = absolute(source_path)?;
        let current = compute_key(&source_path, &self.context)?;
        let location = self.location(&source_path, options);
        let entry = location.path_in(&self.dir);
        let (exists, stored) = self.read_entry(&entry, false);
        let stored_header = stored.map(|(header, _)| header);

        let decision = match &stored_header {
            None if exists => Decision::Stale,
            _ => decide(
                stored_header.as_ref().map(|h| &h.key),
                &current,
                self.revalidation,
            ),
        };

        Ok(Inspection {
            kind: self.kind,
            source: source_path,
            entry,
            hash: location.hash(),
            exists,
            stored: stored_header.map(|h| h.key),
            payload_len: stored_header.map(|h| h.payload_len),
            current,
            decision,
        })
    }

    /// Remove every entry of this kind
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Read and validate an entry. Returns whether a file existed, and the
    /// header + payload when it is complete and of the current format.
    /// Symlinks and oversize files are removed only when `discard` is set.
    fn read_entry(&self, entry_path: &Path, discard: bool) -> (bool, Option<(EntryHeader, Vec<u8>)>) {
        let limit = HEADER_LEN as u64 + MAX_PAYLOAD_BYTES;
        let Some(mut bytes) = read_file_limited(entry_path, limit, discard) else {
            return (false, None);
        };

        let header = match EntryHeader::decode(&bytes) {
            Ok(header) => header,
            Err(err @ KeyError::Truncated { .. }) => {
                self.stats.corrupt();
                tracing::debug!(
                    target: "prewarm::cache",
                    entry = %entry_path.display(),
                    error = %err,
                    "discarding truncated cache entry"
                );
                return (true, None);
            }
            Err(err) => {
                tracing::trace!(
                    target: "prewarm::cache",
                    entry = %entry_path.display(),
                    error = %err,
                    "ignoring cache entry from another format"
                );
                return (true, None);
            }
        };

        if bytes.len() as u64 - HEADER_LEN as u64 != header.payload_len {
            self.stats.corrupt();
            tracing::debug!(
                target: "prewarm::cache",
                entry = %entry_path.display(),
                expected = header.payload_len,
                found = bytes.len() - HEADER_LEN,
                "discarding cache entry with short payload"
            );
            return (true, None);
        }

        let payload = bytes.split_off(HEADER_LEN);
        (true, Some((header, payload)))
    }

    fn recompile<H: Handler>(
        &self,
        source_path: &Path,
        handler: &H,
        entry_path: &Path,
        key: CacheKey,
    ) -> Result<H::Output> {
        let source = read_source(source_path)?;
        let storage = match handler.compile(&source, source_path) {
            Ok(storage) => storage,
            Err(err) => {
                self.stats.uncompilable();
                return Err(CacheError::Uncompilable {
                    path: source_path.to_path_buf(),
                    message: err.message,
                });
            }
        };

        if storage.len() as u64 > MAX_PAYLOAD_BYTES {
            tracing::debug!(
                target: "prewarm::cache",
                path = %source_path.display(),
                size = storage.len(),
                "compiled payload too large to cache"
            );
            return self.direct(handler, &source, source_path);
        }

        let output = match handler.deserialize(&storage) {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(
                    target: "prewarm::cache",
                    path = %source_path.display(),
                    error = %err,
                    "fresh payload does not deserialize; bypassing cache"
                );
                if !self.readonly {
                    remove_file_best_effort(entry_path, "recompile.undeserializable");
                }
                return self.direct(handler, &source, source_path);
            }
        };

        if !self.readonly {
            self.persist(source_path, entry_path, key, &storage);
        }
        Ok(output)
    }

    fn persist(&self, source_path: &Path, entry_path: &Path, key: CacheKey, storage: &[u8]) {
        let header = EntryHeader {
            key,
            payload_len: storage.len() as u64,
        };
        let mut bytes = Vec::with_capacity(HEADER_LEN + storage.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(storage);

        if let Err(err) = atomic_write(entry_path, &bytes) {
            self.report_write_error(source_path, entry_path, &err);
        }
    }

    /// Revalidation rewrites only the header; the payload stays in place
    fn refresh_header(&self, entry_path: &Path, stored: &EntryHeader, current: &CacheKey) {
        let header = EntryHeader {
            key: *current,
            payload_len: stored.payload_len,
        };
        if let Err(err) = write_at(entry_path, 0, &header.encode()) {
            self.report_write_error(entry_path, entry_path, &err);
        }
    }

    fn report_write_error(&self, source_path: &Path, entry_path: &Path, err: &io::Error) {
        if is_unwritable(err) {
            self.stats.unwritable();
            tracing::warn!(
                target: "prewarm::cache",
                path = %source_path.display(),
                entry = %entry_path.display(),
                error = %err,
                "cache directory is not writable; serving uncached result"
            );
        } else {
            tracing::debug!(
                target: "prewarm::cache",
                path = %source_path.display(),
                entry = %entry_path.display(),
                error = %err,
                "failed to write cache entry"
            );
        }
    }

    fn direct<H: Handler>(&self, handler: &H, source: &[u8], source_path: &Path) -> Result<H::Output> {
        handler.direct(source, source_path).map_err(|err| {
            self.stats.uncompilable();
            CacheError::Uncompilable {
                path: source_path.to_path_buf(),
                message: err.message,
            }
        })
    }

    fn emit(&self, event: Event, source_path: &Path) {
        self.stats.record(event);
        tracing::debug!(
            target: "prewarm::cache",
            kind = self.kind.as_str(),
            event = event.as_str(),
            path = %source_path.display(),
            "fetch"
        );
        if let Some(callback) = &self.on_event {
            callback(event, source_path);
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    Ok(absolutize(path, &cwd))
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| CacheError::from_source_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::handler::{JsonHandler, PassthroughHandler};
    use crate::error::{Corrupt, Uncompilable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Passthrough compiler that counts invocations
    #[derive(Default)]
    struct Counting {
        compiles: AtomicUsize,
    }

    impl Handler for Counting {
        type Output = String;

        fn compile(&self, source: &[u8], path: &Path) -> std::result::Result<Vec<u8>, Uncompilable> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            if source.starts_with(b"syntax error") {
                return Err(Uncompilable::new("unexpected end-of-input"));
            }
            PassthroughHandler.compile(source, path)
        }

        fn deserialize(&self, storage: &[u8]) -> std::result::Result<String, Corrupt> {
            PassthroughHandler.deserialize(storage)
        }

        fn direct(&self, source: &[u8], path: &Path) -> std::result::Result<String, Uncompilable> {
            PassthroughHandler.direct(source, path)
        }
    }

    fn cache(root: &Path) -> CompileCache {
        CompileCache::new(
            root,
            ArtifactKind::Source,
            Arc::new(InvalidationContext::new("test")),
        )
    }

    #[test]
    fn test_kind_dirs_and_parse() {
        assert_eq!(ArtifactKind::Source.dir_name(), "compile-cache");
        assert_eq!(ArtifactKind::Yaml.dir_name(), "compile-cache-yaml");
        assert_eq!("yml".parse::<ArtifactKind>().unwrap(), ArtifactKind::Yaml);
        assert!("toml".parse::<ArtifactKind>().is_err());
        assert_eq!(
            ArtifactKind::for_path(Path::new("config/app.yaml")),
            Some(ArtifactKind::Yaml)
        );
        assert_eq!(ArtifactKind::for_path(Path::new("README")), None);
    }

    #[test]
    fn test_miss_then_hit() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let cache = cache(&temp.path().join("cache"));
        let handler = Counting::default();

        assert_eq!(cache.fetch(&src, &handler, None).unwrap(), "x = 1");
        assert_eq!(cache.fetch(&src, &handler, None).unwrap(), "x = 1");
        assert_eq!(handler.compiles.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.miss, 1);
        assert_eq!(stats.hit, 1);
        assert!(cache.entry_path(&src, None).starts_with(cache.dir()));
    }

    #[test]
    fn test_uncompilable_propagates_and_is_not_cached() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("bad.rb");
        fs::write(&src, "syntax error here").unwrap();
        let cache = cache(temp.path());
        let handler = Counting::default();

        let err = cache.fetch(&src, &handler, None).unwrap_err();
        assert!(matches!(err, CacheError::Uncompilable { .. }));
        assert!(err.to_string().contains("unexpected end-of-input"));
        assert!(!cache.entry_path(&src, None).exists());

        assert!(cache.fetch(&src, &handler, None).is_err());
        assert_eq!(handler.compiles.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().uncompilable, 2);
    }

    #[test]
    fn test_missing_source() {
        let temp = tempdir().unwrap();
        let cache = cache(temp.path());
        let err = cache
            .fetch(&temp.path().join("gone.rb"), &PassthroughHandler, None)
            .unwrap_err();
        assert!(matches!(err, CacheError::SourceNotFound { .. }));
    }

    #[test]
    fn test_foreign_format_version_is_regenerated() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let cache = cache(&temp.path().join("cache"));
        let handler = Counting::default();
        cache.fetch(&src, &handler, None).unwrap();

        let entry = cache.entry_path(&src, None);
        let mut bytes = fs::read(&entry).unwrap();
        bytes[0..4].copy_from_slice(&1u32.to_le_bytes());
        fs::write(&entry, &bytes).unwrap();

        assert_eq!(cache.fetch(&src, &handler, None).unwrap(), "x = 1");
        assert_eq!(handler.compiles.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().stale, 1);
        assert_eq!(cache.inspect(&src, None).unwrap().decision, Decision::Hit);
    }

    #[test]
    fn test_compile_options_invalidate() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let cache = cache(&temp.path().join("cache"));
        let handler = Counting::default();

        cache.fetch(&src, &handler, None).unwrap();
        cache.set_compile_options(b"frozen_string_literal=true");
        cache.fetch(&src, &handler, None).unwrap();
        assert_eq!(handler.compiles.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_secondary_key_separates_entries() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.json");
        fs::write(&src, r#"{"a":1}"#).unwrap();
        let cache = CompileCache::new(
            &temp.path().join("cache"),
            ArtifactKind::Json,
            Arc::new(InvalidationContext::new("test")),
        );

        cache.fetch(&src, &JsonHandler, None).unwrap();
        cache.fetch(&src, &JsonHandler, Some(b"symbolize")).unwrap();
        assert_ne!(
            cache.entry_path(&src, None),
            cache.entry_path(&src, Some(b"symbolize"))
        );
        assert_eq!(cache.stats().miss, 2);
    }

    #[test]
    fn test_readonly_never_writes() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let cache = cache(&temp.path().join("cache")).with_readonly(true);
        let handler = Counting::default();

        assert_eq!(cache.fetch(&src, &handler, None).unwrap(), "x = 1");
        assert!(!cache.dir().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_readonly_leaves_invalid_entries_in_place() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let target = temp.path().join("elsewhere");
        fs::write(&target, "not an entry").unwrap();

        let readonly = cache(&temp.path().join("cache")).with_readonly(true);
        let entry = readonly.entry_path(&src, None);
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&target, &entry).unwrap();

        let handler = Counting::default();
        assert_eq!(readonly.fetch(&src, &handler, None).unwrap(), "x = 1");
        assert_eq!(handler.compiles.load(Ordering::SeqCst), 1);
        assert!(fs::symlink_metadata(&entry).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&target).unwrap(), b"not an entry");

        let writable = cache(&temp.path().join("cache"));
        assert_eq!(writable.inspect(&src, None).unwrap().decision, Decision::Miss);
        assert!(fs::symlink_metadata(&entry).is_ok());

        writable.fetch(&src, &handler, None).unwrap();
        assert!(!fs::symlink_metadata(&entry).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&target).unwrap(), b"not an entry");
    }

    #[test]
    fn test_disabled_uses_direct() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let cache = cache(&temp.path().join("cache")).with_enabled(false);
        let handler = Counting::default();

        assert_eq!(cache.fetch(&src, &handler, None).unwrap(), "x = 1");
        assert_eq!(handler.compiles.load(Ordering::SeqCst), 0);
        assert!(!cache.dir().exists());
    }

    #[test]
    fn test_undeserializable_fresh_storage_falls_back_to_direct() {
        struct Broken;
        impl Handler for Broken {
            type Output = String;
            fn compile(&self, _: &[u8], _: &Path) -> std::result::Result<Vec<u8>, Uncompilable> {
                Ok(vec![0xff])
            }
            fn deserialize(&self, storage: &[u8]) -> std::result::Result<String, Corrupt> {
                PassthroughHandler.deserialize(storage)
            }
            fn direct(&self, source: &[u8], path: &Path) -> std::result::Result<String, Uncompilable> {
                PassthroughHandler.direct(source, path)
            }
        }

        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let cache = cache(&temp.path().join("cache"));
        assert_eq!(cache.fetch(&src, &Broken, None).unwrap(), "x = 1");
        assert!(!cache.entry_path(&src, None).exists());
    }

    #[test]
    fn test_on_event_callback() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cache = cache(&temp.path().join("cache")).on_event(move |event, _| {
            sink.lock().unwrap().push(event);
        });

        cache.fetch(&src, &PassthroughHandler, None).unwrap();
        cache.fetch(&src, &PassthroughHandler, None).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Event::Miss, Event::Hit]);
    }

    #[test]
    fn test_inspect_and_clear() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.rb");
        fs::write(&src, "x = 1").unwrap();
        let cache = cache(&temp.path().join("cache"));

        let before = cache.inspect(&src, None).unwrap();
        assert!(!before.exists);
        assert_eq!(before.decision, Decision::Miss);

        cache.fetch(&src, &PassthroughHandler, None).unwrap();
        let after = cache.inspect(&src, None).unwrap();
        assert!(after.exists);
        assert_eq!(after.stored, Some(after.current));
        assert_eq!(after.payload_len, Some(5));
        assert_eq!(after.decision, Decision::Hit);

        cache.clear().unwrap();
        assert!(!cache.dir().exists());
        cache.clear().unwrap();
    }
}
