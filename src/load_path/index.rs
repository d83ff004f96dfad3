//! Load-path resolution index
//!
//! Maps relative feature names (`"foo.rb"`, `"a/b.so"`) and directories to the
//! highest-precedence search root providing them.
//!
//! Every root gets a position: pushed roots count up from the right bound,
//! unshifted roots count down from the left bound, and a lower position wins.
//! Merging a root therefore overwrites names held by higher positions and
//! leaves lower ones alone, which gives "last unshift, else first push".
//!
//! Filesystem scans run outside the state mutex. A generation counter, bumped
//! by every rebuild, lets a late merge detect that its results are obsolete.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::core::config::{Config, DEVELOPMENT_AGE_THRESHOLD};
use crate::core::paths::{absolutize, extname, is_explicit_relative, join_normalized};
use crate::load_path::root::SearchRoot;
use crate::load_path::scanner::ScanResult;
use crate::load_path::store::ScanStore;
use crate::load_path::{BUILTIN_FEATURES, DLEXT, DOT_SO, REQUIRABLE_EXTENSIONS};

/// Answer to a resolve query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Absolute path of the file providing the feature
    Found(PathBuf),
    /// A builtin the host treats as already loaded; succeed without loading
    Suppressed,
    /// The index cannot answer; the caller must search the roots linearly
    NeedsFallbackScan,
    NotFound,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Found(_) => "found",
            Resolution::Suppressed => "suppressed",
            Resolution::NeedsFallbackScan => "fallback",
            Resolution::NotFound => "not_found",
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Found(path) => Some(path),
            _ => None,
        }
    }
}

/// A change to the observed root list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Roots added at the end (lowest precedence)
    Append(Vec<PathBuf>),
    /// Roots added at the front, first element highest
    Prepend(Vec<PathBuf>),
    /// Any other change; carries the full new list
    Rebuild(Vec<PathBuf>),
}

/// Time source for development-mode staleness
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct Slot {
    position: i64,
    root: Arc<Path>,
}

struct IndexState {
    roots: Vec<PathBuf>,
    features: HashMap<String, Slot>,
    dirs: HashMap<String, Slot>,
    lbound: i64,
    rbound: i64,
    generation: u64,
    cwd: Option<PathBuf>,
    has_relative: bool,
    has_volatile: bool,
    generated_at: Instant,
}

/// A root queued for scanning with its reserved position
struct Pending {
    root: SearchRoot,
    position: i64,
}

pub struct ResolutionIndex {
    store: ScanStore,
    stable_prefixes: Vec<PathBuf>,
    excluded: Vec<PathBuf>,
    development_mode: bool,
    age_threshold: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<IndexState>,
}

impl fmt::Debug for ResolutionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ResolutionIndex")
            .field("roots", &state.roots)
            .field("features", &state.features.len())
            .field("dirs", &state.dirs.len())
            .field("generation", &state.generation)
            .field("development_mode", &self.development_mode)
            .finish()
    }
}

impl ResolutionIndex {
    /// Empty index backed by `store`
    pub fn new(store: ScanStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: ScanStore, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            store,
            stable_prefixes: Vec::new(),
            excluded: Vec::new(),
            development_mode: false,
            age_threshold: DEVELOPMENT_AGE_THRESHOLD,
            clock,
            state: Mutex::new(IndexState {
                roots: Vec::new(),
                features: HashMap::new(),
                dirs: HashMap::new(),
                lbound: 0,
                rbound: 0,
                generation: 0,
                cwd: None,
                has_relative: false,
                has_volatile: false,
                generated_at: now,
            }),
        }
    }

    /// Index using the persistent scan cache and policies from `config`
    pub fn from_config(config: &Config) -> Self {
        let store = ScanStore::load(config.load_path_cache_file()).with_readonly(config.readonly);
        Self::new(store)
            .with_development_mode(config.development_mode)
            .with_stable_prefixes(config.stable_prefixes.clone())
    }

    pub fn with_development_mode(mut self, on: bool) -> Self {
        self.development_mode = on;
        self
    }

    pub fn with_stable_prefixes(mut self, prefixes: Vec<PathBuf>) -> Self {
        self.stable_prefixes = prefixes;
        self
    }

    /// Subtrees never descended into while scanning any root
    pub fn with_excluded(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_age_threshold(mut self, threshold: Duration) -> Self {
        self.age_threshold = threshold;
        self
    }

    pub fn store(&self) -> &ScanStore {
        &self.store
    }

    /// Current root list as last observed
    pub fn roots(&self) -> Vec<PathBuf> {
        self.lock().roots.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Feed a change of the observed root list into the index
    pub fn observe(&self, mutation: Mutation) {
        match mutation {
            Mutation::Append(paths) => self.add_roots(paths, false),
            Mutation::Prepend(paths) => self.add_roots(paths, true),
            Mutation::Rebuild(paths) => self.rebuild(paths),
        }
    }

    /// Push (`front == false`) or unshift (`front == true`) a batch of roots
    pub fn add_roots(&self, paths: Vec<PathBuf>, front: bool) {
        if paths.is_empty() {
            return;
        }
        let (generation, pending) = {
            let mut state = self.lock();
            let cwd = state_cwd(&mut state);
            let n = paths.len() as i64;
            let start = if front {
                state.lbound -= n;
                state.lbound
            } else {
                let start = state.rbound;
                state.rbound += n;
                start
            };

            let pending: Vec<Pending> = paths
                .iter()
                .enumerate()
                .map(|(i, path)| Pending {
                    root: SearchRoot::new(path, &cwd, &self.stable_prefixes),
                    position: start + i as i64,
                })
                .collect();

            state.has_relative |= paths.iter().any(|p| p.is_relative());
            state.has_volatile |= pending.iter().any(|p| p.root.is_volatile());
            if front {
                state.roots.splice(0..0, paths);
            } else {
                state.roots.extend(paths);
            }
            (state.generation, pending)
        };

        let scanned = self.scan_all(&pending);
        self.merge(generation, &pending, scanned);
        self.store.commit();
    }

    /// Discard all state and re-index `paths` in order
    pub fn rebuild(&self, paths: Vec<PathBuf>) {
        {
            let mut state = self.lock();
            state.generation += 1;
            state.features.clear();
            state.dirs.clear();
            state.lbound = 0;
            state.rbound = 0;
            state.roots.clear();
            state.has_relative = false;
            state.has_volatile = false;
            state.cwd = std::env::current_dir().ok();
            state.generated_at = self.clock.now();
            tracing::debug!(
                target: "prewarm::load_path",
                generation = state.generation,
                roots = paths.len(),
                "rebuilding resolution index"
            );
        }
        self.add_roots(paths, false);
    }

    /// Resolve a requested feature name
    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(direct) = self.bypass(name) {
            return direct;
        }
        self.refresh_if_stale();

        let state = self.lock();
        if let Some(found) = search_index(&state, name) {
            return Resolution::Found(found);
        }
        if BUILTIN_FEATURES.contains(name) {
            return Resolution::Suppressed;
        }

        let ext = extname(name);
        if ext == DOT_SO && DLEXT != DOT_SO {
            let stem = &name[..name.len() - DOT_SO.len()];
            if let Some(found) = try_index(&state, &format!("{stem}{DLEXT}")) {
                return Resolution::Found(found);
            }
        } else if !ext.is_empty() && !REQUIRABLE_EXTENSIONS.contains(&ext) {
            // Only indexed extensions can be answered definitively.
            return Resolution::NeedsFallbackScan;
        }
        drop(state);
        self.miss()
    }

    /// Resolve a name without extension expansion
    pub fn resolve_exact(&self, name: &str) -> Resolution {
        if let Some(direct) = self.bypass(name) {
            return direct;
        }
        self.refresh_if_stale();

        let state = self.lock();
        if let Some(found) = try_index(&state, name) {
            return Resolution::Found(found);
        }
        if BUILTIN_FEATURES.contains(name) {
            return Resolution::Suppressed;
        }
        if !REQUIRABLE_EXTENSIONS.contains(&extname(name)) {
            return Resolution::NeedsFallbackScan;
        }
        drop(state);
        self.miss()
    }

    /// Whether any root has the relative directory `dir`
    pub fn has_directory(&self, dir: &str) -> bool {
        self.load_dir(dir).is_some()
    }

    /// Absolute path of `dir` under the highest-precedence root providing it
    pub fn load_dir(&self, dir: &str) -> Option<PathBuf> {
        self.refresh_if_stale();
        let dir = dir.trim_end_matches('/');
        let state = self.lock();
        state
            .dirs
            .get(dir)
            .map(|slot| join_normalized(&slot.root, dir))
    }

    /// Number of indexed feature names
    pub fn len(&self) -> usize {
        self.lock().features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bypass(&self, name: &str) -> Option<Resolution> {
        let path = Path::new(name);
        if path.is_absolute() {
            return Some(Resolution::Found(path.to_path_buf()));
        }
        if is_explicit_relative(name) {
            let cwd = std::env::current_dir().unwrap_or_default();
            return Some(Resolution::Found(absolutize(path, &cwd)));
        }
        None
    }

    fn miss(&self) -> Resolution {
        if self.development_mode {
            Resolution::NeedsFallbackScan
        } else {
            Resolution::NotFound
        }
    }

    fn refresh_if_stale(&self) {
        let roots = {
            let state = self.lock();
            let expired = self.development_mode
                && state.has_volatile
                && self.clock.now().saturating_duration_since(state.generated_at) > self.age_threshold;
            let moved = state.has_relative && std::env::current_dir().ok() != state.cwd;
            if !(expired || moved) {
                return;
            }
            tracing::debug!(
                target: "prewarm::load_path",
                expired,
                cwd_changed = moved,
                "resolution index is stale"
            );
            state.roots.clone()
        };
        self.rebuild(roots);
    }

    fn scan_all(&self, pending: &[Pending]) -> Vec<ScanResult> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            pending
                .par_iter()
                .map(|p| p.root.entries_and_dirs(&self.store, &self.excluded))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            pending
                .iter()
                .map(|p| p.root.entries_and_dirs(&self.store, &self.excluded))
                .collect()
        }
    }

    fn merge(&self, generation: u64, pending: &[Pending], scanned: Vec<ScanResult>) {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(
                target: "prewarm::load_path",
                expected = generation,
                current = state.generation,
                "discarding scan results from before a rebuild"
            );
            return;
        }

        for (p, result) in pending.iter().zip(scanned) {
            let slot = Slot {
                position: p.position,
                root: Arc::from(p.root.expanded.as_path()),
            };
            for feature in result.requirables {
                claim(&mut state.features, feature, &slot);
            }
            for dir in result.dirs {
                claim(&mut state.dirs, dir, &slot);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn claim(map: &mut HashMap<String, Slot>, name: String, slot: &Slot) {
    match map.get(&name) {
        Some(existing) if existing.position < slot.position => {}
        _ => {
            map.insert(name, slot.clone());
        }
    }
}

fn state_cwd(state: &mut IndexState) -> PathBuf {
    if state.cwd.is_none() {
        state.cwd = std::env::current_dir().ok();
    }
    state.cwd.clone().unwrap_or_default()
}

fn try_index(state: &IndexState, feature: &str) -> Option<PathBuf> {
    state
        .features
        .get(feature)
        .map(|slot| join_normalized(&slot.root, feature))
}

/// Verbatim first, then each requirable extension in order
fn search_index(state: &IndexState, name: &str) -> Option<PathBuf> {
    try_index(state, name).or_else(|| {
        REQUIRABLE_EXTENSIONS
            .iter()
            .find_map(|ext| try_index(state, &format!("{name}{ext}")))
    })
}
