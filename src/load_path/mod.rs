//! Load-path module - Short-name resolution over an ordered list of search roots
//!
//! Provides:
//! - Directory scanning for requirable files (`scanner`)
//! - Search roots with STABLE / VOLATILE classification (`root`)
//! - Persistent scan cache (`store`)
//! - The resolution index with push/unshift precedence (`index`)
//! - An observed, mutable root list feeding the index (`observer`)
//! - The already-loaded dedup index (`loaded_features`)

use std::collections::HashSet;

use once_cell::sync::Lazy;

pub mod index;
pub mod loaded_features;
pub mod observer;
pub mod root;
pub mod scanner;
pub mod store;

pub use index::{Clock, Mutation, Resolution, ResolutionIndex, SystemClock};
pub use loaded_features::LoadedFeaturesIndex;
pub use observer::ObservedLoadPath;
pub use root::{SearchRoot, Stability};
pub use scanner::{scan, ScanResult};
pub use store::ScanStore;

pub const DOT_RB: &str = ".rb";
pub const DOT_SO: &str = ".so";

/// The platform's native-library extension
#[cfg(target_os = "macos")]
pub const DLEXT: &str = ".bundle";
#[cfg(windows)]
pub const DLEXT: &str = ".dll";
#[cfg(not(any(target_os = "macos", windows)))]
pub const DLEXT: &str = ".so";

/// Extensions the scanner indexes, in lookup order
pub const REQUIRABLE_EXTENSIONS: [&str; 2] = [DOT_RB, DLEXT];

/// Names the host runtime reports as already loaded although no file backs them
pub static BUILTIN_FEATURES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "enumerator",
        "enumerator.so",
        "thread",
        "thread.rb",
        "fiber",
        "fiber.so",
        "rational",
        "rational.so",
        "complex",
        "complex.so",
        "ruby2_keywords",
        "ruby2_keywords.rb",
    ]
    .into_iter()
    .collect()
});

pub fn is_requirable(path: &str) -> bool {
    let ext = crate::core::paths::extname(path);
    REQUIRABLE_EXTENSIONS.contains(&ext)
}
