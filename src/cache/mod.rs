//! Cache module - Compiled-artifact cache
//!
//! Provides:
//! - Fixed-layout key codec and invalidation context (`key`)
//! - Content-addressed, sharded entry locations (`location`)
//! - Hit / revalidate / stale / miss decisions (`policy`)
//! - Collaborator trait and built-in handlers (`handler`)
//! - Atomic temp-file + rename writes (`atomic`)
//! - Per-process counters and events (`stats`)
//! - The fetch pipeline tying them together (`store`)

pub mod atomic;
pub mod handler;
pub mod key;
pub mod location;
pub mod policy;
pub mod stats;
pub mod store;

pub use handler::{CommandHandler, Handler, JsonHandler, PassthroughHandler, YamlHandler};
pub use key::{compute_key, CacheKey, InvalidationContext};
pub use policy::Decision;
pub use stats::{Event, StatsSnapshot};
pub use store::{ArtifactKind, CompileCache, Inspection};
