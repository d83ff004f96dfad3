//! Path normalization utilities
//!
//! Relative feature names always use '/' as separator, independent of platform.

use std::path::{Component, Path, PathBuf};

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Join a '/'-separated relative name onto a base directory
pub fn join_normalized(base: &Path, relative: &str) -> PathBuf {
    base.join(relative.replace('/', std::path::MAIN_SEPARATOR_STR))
}

/// Check if a path is hidden (starts with '.')
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Lexically absolutize `path` against `cwd`, folding `.` and `..` components.
///
/// Never touches the filesystem, so symlinks are not resolved.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether a requested feature name is an explicit relative path (`./x`, `../x`)
pub fn is_explicit_relative(name: &str) -> bool {
    name.starts_with("./") || name.starts_with("../")
}

/// Extension of the final component including the dot (`"a/b.rb"` → `".rb"`)
///
/// Returns `""` for names without an extension, matching the host convention
/// that a leading dot (`.rc`) is not an extension.
pub fn extname(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(idx) if idx + 1 == base.len() => "",
        Some(idx) => &base[idx..],
    }
}
