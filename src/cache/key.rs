//! Fingerprint & key codec
//!
//! A [`CacheKey`] is a metadata snapshot of a source file plus the process
//! configuration that affects compiled output. It is derived from `stat` only;
//! file contents are never read to build it.
//!
//! On-disk header layout (little-endian, [`HEADER_LEN`] bytes):
//!
//! ```text
//! [0..4)   format_version
//! [4..8)   platform_tag
//! [8..12)  invalidation_tag
//! [12..16) host_revision
//! [16..24) source_size
//! [24..32) source_mtime (seconds)
//! [32..40) payload_len
//! [40..64) reserved, zero
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::core::util::{mtime_secs, tag32};
use crate::error::{CacheError, KeyError};

/// Bumped whenever the header or payload conventions change; old entries are
/// then regenerated silently.
pub const FORMAT_VERSION: u32 = 6;

/// Encoded size of the key fields alone
pub const KEY_LEN: usize = 32;

/// Full header size; the payload starts right after it
pub const HEADER_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub format_version: u32,
    pub platform_tag: u32,
    pub invalidation_tag: u32,
    pub host_revision: u32,
    pub source_size: u64,
    pub source_mtime: u64,
}

impl CacheKey {
    /// Encode the key fields (without payload length)
    pub fn encode(&self) -> [u8; KEY_LEN] {
        let mut out = [0u8; KEY_LEN];
        out[0..4].copy_from_slice(&self.format_version.to_le_bytes());
        out[4..8].copy_from_slice(&self.platform_tag.to_le_bytes());
        out[8..12].copy_from_slice(&self.invalidation_tag.to_le_bytes());
        out[12..16].copy_from_slice(&self.host_revision.to_le_bytes());
        out[16..24].copy_from_slice(&self.source_size.to_le_bytes());
        out[24..32].copy_from_slice(&self.source_mtime.to_le_bytes());
        out
    }

    /// Decode key fields from the front of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() < KEY_LEN {
            return Err(KeyError::Truncated {
                len: bytes.len(),
                need: KEY_LEN,
            });
        }
        let key = Self {
            format_version: read_u32(bytes, 0),
            platform_tag: read_u32(bytes, 4),
            invalidation_tag: read_u32(bytes, 8),
            host_revision: read_u32(bytes, 12),
            source_size: read_u64(bytes, 16),
            source_mtime: read_u64(bytes, 24),
        };
        if key.format_version != FORMAT_VERSION {
            return Err(KeyError::Version {
                expected: FORMAT_VERSION,
                found: key.format_version,
            });
        }
        Ok(key)
    }

    /// Equal in every field except `source_mtime`
    pub fn same_except_mtime(&self, other: &CacheKey) -> bool {
        self.format_version == other.format_version
            && self.platform_tag == other.platform_tag
            && self.invalidation_tag == other.invalidation_tag
            && self.host_revision == other.host_revision
            && self.source_size == other.source_size
    }
}

/// Header = key + payload length + reserved padding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub key: CacheKey,
    pub payload_len: u64,
}

impl EntryHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..KEY_LEN].copy_from_slice(&self.key.encode());
        out[KEY_LEN..KEY_LEN + 8].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() < HEADER_LEN {
            return Err(KeyError::Truncated {
                len: bytes.len(),
                need: HEADER_LEN,
            });
        }
        Ok(Self {
            key: CacheKey::decode(bytes)?,
            payload_len: read_u64(bytes, KEY_LEN),
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// The process-wide part of a key.
///
/// `invalidation_tag` is adjustable at runtime: any change to compiler options
/// that alters compiled output must go through [`set_compile_options`].
///
/// [`set_compile_options`]: InvalidationContext::set_compile_options
#[derive(Debug)]
pub struct InvalidationContext {
    platform_tag: u32,
    host_revision: u32,
    invalidation_tag: AtomicU32,
}

impl InvalidationContext {
    /// `host_revision` identifies the runtime build whose compiled output we cache
    pub fn new(host_revision: &str) -> Self {
        Self {
            platform_tag: platform_tag(),
            host_revision: tag32(host_revision.as_bytes()),
            invalidation_tag: AtomicU32::new(0),
        }
    }

    pub fn with_compile_options(self, options: &[u8]) -> Self {
        self.set_compile_options(options);
        self
    }

    pub fn set_compile_options(&self, options: &[u8]) {
        let tag = if options.is_empty() { 0 } else { tag32(options) };
        self.invalidation_tag.store(tag, Ordering::Relaxed);
    }

    pub fn platform_tag(&self) -> u32 {
        self.platform_tag
    }

    pub fn host_revision(&self) -> u32 {
        self.host_revision
    }

    pub fn invalidation_tag(&self) -> u32 {
        self.invalidation_tag.load(Ordering::Relaxed)
    }

    /// Key for a file with the given size and mtime under this context
    pub fn key_for(&self, source_size: u64, source_mtime: u64) -> CacheKey {
        CacheKey {
            format_version: FORMAT_VERSION,
            platform_tag: self.platform_tag,
            invalidation_tag: self.invalidation_tag(),
            host_revision: self.host_revision,
            source_size,
            source_mtime,
        }
    }
}

impl Default for InvalidationContext {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

/// Tag for the OS/architecture pair compiled artifacts are valid on
pub fn platform_tag() -> u32 {
    let platform = format!(
        "{}-{}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        usize::BITS
    );
    tag32(platform.as_bytes())
}

/// Fingerprint `source_path` from its metadata without opening it for read
pub fn compute_key(source_path: &Path, context: &InvalidationContext) -> Result<CacheKey, CacheError> {
    let metadata =
        std::fs::metadata(source_path).map_err(|e| CacheError::from_source_io(source_path, e))?;
    Ok(context.key_for(metadata.len(), mtime_secs(&metadata)))
}
