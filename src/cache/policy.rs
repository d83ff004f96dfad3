//! Revalidation & staleness policy

use serde::Serialize;

use crate::cache::key::CacheKey;

/// What `fetch` does with a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Keys match exactly; serve the stored payload
    Hit,
    /// Only the mtime moved; refresh the header and serve the stored payload
    Revalidate,
    /// Stored entry exists but does not match; recompile and overwrite
    Stale,
    /// No usable entry; compile and store
    Miss,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Hit => "hit",
            Decision::Revalidate => "revalidate",
            Decision::Stale => "stale",
            Decision::Miss => "miss",
        }
    }
}

/// Evaluate the decision table in precedence order:
/// exact match, then mtime-only revalidation (if allowed), then recompute.
pub fn decide(stored: Option<&CacheKey>, current: &CacheKey, revalidation: bool) -> Decision {
    match stored {
        None => Decision::Miss,
        Some(stored) if stored == current => Decision::Hit,
        Some(stored) if revalidation && stored.same_except_mtime(current) => Decision::Revalidate,
        Some(_) => Decision::Stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::FORMAT_VERSION;

    fn key(size: u64, mtime: u64) -> CacheKey {
        CacheKey {
            format_version: FORMAT_VERSION,
            platform_tag: 1,
            invalidation_tag: 2,
            host_revision: 3,
            source_size: size,
            source_mtime: mtime,
        }
    }

    #[test]
    fn test_exact_match_is_hit() {
        assert_eq!(decide(Some(&key(5, 100)), &key(5, 100), false), Decision::Hit);
        assert_eq!(decide(Some(&key(5, 100)), &key(5, 100), true), Decision::Hit);
    }

    #[test]
    fn test_mtime_only_change() {
        assert_eq!(
            decide(Some(&key(5, 100)), &key(5, 200), true),
            Decision::Revalidate
        );
        assert_eq!(decide(Some(&key(5, 100)), &key(5, 200), false), Decision::Stale);
    }

    #[test]
    fn test_other_field_forces_recompute() {
        assert_eq!(decide(Some(&key(5, 100)), &key(6, 200), true), Decision::Stale);

        let mut tagged = key(5, 200);
        tagged.invalidation_tag = 9;
        assert_eq!(decide(Some(&key(5, 100)), &tagged, true), Decision::Stale);
    }

    #[test]
    fn test_absent_is_miss() {
        assert_eq!(decide(None, &key(5, 100), true), Decision::Miss);
    }
}
