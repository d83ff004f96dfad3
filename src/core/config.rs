//! Runtime configuration
//!
//! Only the cache root and the development flag are required inputs; everything
//! else has a compiled-in default. Values are read from the environment so an
//! embedding runtime can configure the engines without threading options around.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::util::truthy;

pub const ENV_CACHE_DIR: &str = "PREWARM_CACHE_DIR";
pub const ENV_ENV: &str = "PREWARM_ENV";
pub const ENV_DEVELOPMENT: &str = "PREWARM_DEVELOPMENT";
pub const ENV_REVALIDATE: &str = "PREWARM_REVALIDATE";
pub const ENV_READONLY: &str = "PREWARM_READONLY";
pub const ENV_STABLE_PATHS: &str = "PREWARM_STABLE_PATHS";
pub const ENV_LOAD_PATH: &str = "PREWARM_LOAD_PATH";
pub const ENV_COMPILER: &str = "PREWARM_COMPILER";
pub const ENV_LOG: &str = "PREWARM_LOG";

/// Default cache root, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = "tmp/cache";

/// How long a volatile root's listing stays fresh in development mode
pub const DEVELOPMENT_AGE_THRESHOLD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all on-disk caches
    pub cache_dir: PathBuf,

    /// Development mode: volatile roots expire and index misses fall back to a scan
    pub development_mode: bool,

    /// Refresh only the mtime of an entry whose size is unchanged
    pub revalidation: bool,

    /// Never write to the cache directory
    pub readonly: bool,

    /// Prefixes under which search roots are considered STABLE
    pub stable_prefixes: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            development_mode: false,
            revalidation: false,
            readonly: false,
            stable_prefixes: Vec::new(),
        }
    }
}

impl Config {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from `PREWARM_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (used by tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cache_dir = lookup(ENV_CACHE_DIR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

        let development_mode = lookup(ENV_ENV)
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false)
            || lookup(ENV_DEVELOPMENT).map(|v| truthy(&v)).unwrap_or(false);

        Self {
            cache_dir,
            development_mode,
            revalidation: lookup(ENV_REVALIDATE).map(|v| truthy(&v)).unwrap_or(false),
            readonly: lookup(ENV_READONLY).map(|v| truthy(&v)).unwrap_or(false),
            stable_prefixes: lookup(ENV_STABLE_PATHS)
                .map(|v| split_path_list(&v))
                .unwrap_or_default(),
        }
    }

    pub fn with_development_mode(mut self, on: bool) -> Self {
        self.development_mode = on;
        self
    }

    pub fn with_revalidation(mut self, on: bool) -> Self {
        self.revalidation = on;
        self
    }

    pub fn with_readonly(mut self, on: bool) -> Self {
        self.readonly = on;
        self
    }

    pub fn with_stable_prefixes(mut self, prefixes: Vec<PathBuf>) -> Self {
        self.stable_prefixes = prefixes;
        self
    }

    /// Location of the persistent load-path scan cache
    pub fn load_path_cache_file(&self) -> PathBuf {
        self.cache_dir.join("load-path-cache")
    }

    /// Whether `path` lives under one of the stable prefixes
    pub fn is_stable_path(&self, path: &Path) -> bool {
        self.stable_prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Split a `:`-separated path list, dropping empty segments
pub fn split_path_list(value: &str) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}
