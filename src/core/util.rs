//! Common utilities

use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;
use xxhash_rust::xxh3::xxh3_64;

/// 64-bit content-addressing hash
pub fn hash64(data: &[u8]) -> u64 {
    xxh3_64(data)
}

/// Hex rendering of [`hash64`] (always 16 chars)
pub fn hash_hex(data: &[u8]) -> String {
    format!("{:016x}", hash64(data))
}

/// Fold a byte string into a 32-bit tag (upper half of the 64-bit hash)
pub fn tag32(data: &[u8]) -> u32 {
    (hash64(data) >> 32) as u32
}

/// Modification time in whole seconds since epoch (0 for pre-epoch times)
pub fn mtime_secs(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Modification time of a path in seconds, `None` if it cannot be stat'ed
pub fn path_mtime_secs(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| mtime_secs(&m))
}

/// Parse a boolean-ish environment value ("1", "true", "yes", "on")
pub fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex() {
        let hash = hash_hex(b"hello world");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, hash_hex(b"hello world"));
        assert_ne!(hash, hash_hex(b"hello world!"));
    }

    #[test]
    fn test_tag32_is_upper_half() {
        let h = hash64(b"abc");
        assert_eq!(tag32(b"abc"), (h >> 32) as u32);
    }

    #[test]
    fn test_mtime_secs() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        let secs = path_mtime_secs(&file).unwrap();
        assert!(secs > 0);
        assert!(path_mtime_secs(&temp.path().join("missing")).is_none());
    }

    #[test]
    fn test_truthy() {
        assert!(truthy("1"));
        assert!(truthy("TRUE"));
        assert!(truthy(" yes "));
        assert!(!truthy("0"));
        assert!(!truthy(""));
    }
}
