//! prewarm - Startup accelerator for interpreted-language runtimes
//!
//! prewarm provides:
//! - A compiled-artifact cache keyed by a fixed-layout fingerprint (`cache`)
//! - A load-path resolution index over an ordered list of search roots (`load_path`)
//! - A `Loader` capability wiring the two together (`loader`)
//! - Batch precompilation across a pool of worker processes (`precompile`)

pub mod cache;
pub mod core;
pub mod error;
pub mod load_path;
pub mod loader;
pub mod precompile;

pub use cache::{ArtifactKind, CompileCache, Handler, InvalidationContext};
pub use crate::core::config::Config;
pub use error::{CacheError, LoadError};
pub use load_path::{LoadedFeaturesIndex, ObservedLoadPath, Resolution, ResolutionIndex};
pub use loader::{BootContext, CachedLoader, Loader, Required};
