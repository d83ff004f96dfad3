//! Loader capability
//!
//! [`BootContext`] owns the long-lived engines for one cache directory: the
//! observed load path with its resolution index, the dedup index, the host's
//! loaded list and one compile cache per artifact kind. [`CachedLoader`]
//! answers `require` by wiring resolve and fetch together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::handler::Handler;
use crate::cache::key::InvalidationContext;
use crate::cache::store::{ArtifactKind, CompileCache};
use crate::core::config::Config;
use crate::core::paths::{extname, join_normalized};
use crate::error::LoadError;
use crate::load_path::index::{Resolution, ResolutionIndex};
use crate::load_path::loaded_features::LoadedFeaturesIndex;
use crate::load_path::observer::ObservedLoadPath;
use crate::load_path::{DLEXT, REQUIRABLE_EXTENSIONS};

/// Outcome of a successful `require`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Required<T> {
    /// A source file was fetched through the compile cache
    Loaded { path: PathBuf, output: T },
    /// A native library; the host's dynamic loader takes it from here
    Native(PathBuf),
    /// Already loaded (or a builtin); nothing to do
    AlreadyLoaded,
}

pub trait Loader {
    type Output;

    fn require(&mut self, name: &str) -> Result<Required<Self::Output>, LoadError>;
}

pub struct BootContext {
    config: Config,
    load_path: ObservedLoadPath,
    loaded_features: LoadedFeaturesIndex,
    loaded: Vec<PathBuf>,
    caches: HashMap<ArtifactKind, CompileCache>,
}

impl BootContext {
    /// Build every engine for `config` and index `roots`.
    ///
    /// `loaded` is the host's list of files loaded before boot.
    pub fn new(
        config: Config,
        roots: Vec<PathBuf>,
        loaded: Vec<PathBuf>,
        context: Arc<InvalidationContext>,
    ) -> Self {
        let index = Arc::new(ResolutionIndex::from_config(&config));
        let load_path = ObservedLoadPath::new(index, roots);
        let loaded_features = LoadedFeaturesIndex::from_loaded(&loaded, load_path.as_slice());
        let caches = ArtifactKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    CompileCache::from_config(&config, kind, Arc::clone(&context)),
                )
            })
            .collect();

        Self {
            config,
            load_path,
            loaded_features,
            loaded,
            caches,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load_path(&self) -> &ObservedLoadPath {
        &self.load_path
    }

    /// Mutations go through the observed list so the index stays in sync
    pub fn load_path_mut(&mut self) -> &mut ObservedLoadPath {
        &mut self.load_path
    }

    pub fn index(&self) -> &ResolutionIndex {
        self.load_path.index()
    }

    pub fn loaded_features(&self) -> &LoadedFeaturesIndex {
        &self.loaded_features
    }

    /// The host's loaded list, in load order
    pub fn loaded(&self) -> &[PathBuf] {
        &self.loaded
    }

    pub fn cache(&self, kind: ArtifactKind) -> Option<&CompileCache> {
        self.caches.get(&kind)
    }

    /// Forget a loaded file so it can be required again
    pub fn unload(&mut self, path: &Path) {
        self.loaded.retain(|p| p != path);
        self.loaded_features.purge(path);
    }

    /// Linear search of the roots, for names the index cannot answer
    fn fallback_scan(&self, name: &str) -> Option<PathBuf> {
        let ext = extname(name);
        let mut candidates = Vec::new();
        if !ext.is_empty() {
            candidates.push(name.to_string());
        }
        // `descriptor.pb` may still name `descriptor.pb.rb`.
        if !REQUIRABLE_EXTENSIONS.contains(&ext) {
            candidates.extend(REQUIRABLE_EXTENSIONS.iter().map(|e| format!("{name}{e}")));
        }

        self.load_path.iter().find_map(|root| {
            candidates
                .iter()
                .map(|c| join_normalized(root, c))
                .find(|p| p.is_file())
        })
    }
}

/// Loads source files of one artifact kind through its compile cache
pub struct CachedLoader<H> {
    context: BootContext,
    handler: H,
    kind: ArtifactKind,
}

impl<H: Handler> CachedLoader<H> {
    pub fn new(context: BootContext, handler: H, kind: ArtifactKind) -> Self {
        Self {
            context,
            handler,
            kind,
        }
    }

    pub fn context(&self) -> &BootContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut BootContext {
        &mut self.context
    }

    fn load(&mut self, path: PathBuf) -> Result<Required<H::Output>, LoadError> {
        if self.context.loaded.contains(&path) {
            return Ok(Required::AlreadyLoaded);
        }
        if extname(&path.to_string_lossy()) == DLEXT {
            self.context.loaded.push(path.clone());
            return Ok(Required::Native(path));
        }

        let cache = self
            .context
            .caches
            .get(&self.kind)
            .ok_or_else(|| LoadError::NotFound(path.display().to_string()))?;
        let output = cache.fetch(&path, &self.handler, None)?;
        self.context.loaded.push(path.clone());
        Ok(Required::Loaded { path, output })
    }
}

impl<H: Handler> Loader for CachedLoader<H> {
    type Output = H::Output;

    fn require(&mut self, name: &str) -> Result<Required<H::Output>, LoadError> {
        if self.context.loaded_features.contains(name) {
            return Ok(Required::AlreadyLoaded);
        }

        match self.context.index().resolve(name) {
            Resolution::Found(path) => {
                let result = self.load(path.clone())?;
                self.context.loaded_features.register(name, &path);
                Ok(result)
            }
            Resolution::Suppressed => Ok(Required::AlreadyLoaded),
            Resolution::NotFound => Err(LoadError::NotFound(name.to_string())),
            Resolution::NeedsFallbackScan => {
                tracing::debug!(target: "prewarm::load_path", name, "falling back to linear scan");
                let path = self
                    .context
                    .fallback_scan(name)
                    .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
                let before = self.context.loaded.len();
                let result = self.load(path)?;
                let added = self.context.loaded[before..].to_vec();
                self.context
                    .loaded_features
                    .register_unresolved(name, &added);
                Ok(result)
            }
        }
    }
}
