//! Error taxonomy shared by the compile cache, the load-path index and the loader.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by [`crate::cache::store::CompileCache::fetch`].
///
/// Cache-layer malfunctions (corrupt entries, unwritable cache directories) never
/// appear here: they are recovered locally and only logged.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot load such file -- {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("{}: {message}", path.display())]
    Uncompilable { path: PathBuf, message: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl CacheError {
    pub(crate) fn from_source_io(path: &std::path::Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            CacheError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CacheError::Io(err)
        }
    }
}

/// Errors decoding a fixed-width cache key header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("cache key truncated: got {len} bytes, need {need}")]
    Truncated { len: usize, need: usize },

    #[error("incompatible cache format version: expected {expected}, found {found}")]
    Version { expected: u32, found: u32 },
}

/// The compiler collaborator rejected its input (e.g. a syntax error).
///
/// Propagated to the caller unchanged and never cached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Uncompilable {
    pub message: String,
}

impl Uncompilable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Stored storage bytes could not be turned back into an output value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("corrupt cache payload: {reason}")]
pub struct Corrupt {
    pub reason: String,
}

impl Corrupt {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by [`crate::loader::Loader::require`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot load such file -- {0}")]
    NotFound(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// True for write failures the cache swallows: the cache is a pure optimization.
pub(crate) fn is_unwritable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
    )
}
