//! Path containment: keeps client-supplied paths inside the configured base
//! directory when enforcement is enabled.

use std::path::{Path, PathBuf};

/// Checks a candidate path for malicious traversal outside `basepath`.
///
/// With no base path configured the guard is disabled and every path is
/// safe. Otherwise the candidate is resolved — through symlinks when
/// `follow_symlinks` is set, plain absolutization otherwise — and tested
/// for the base-path prefix.
///
/// This is deliberately a prefix test on the resolved path string, not a
/// component-wise comparison; deployed configurations may rely on sibling
/// prefixes like `/base` matching `/base-backup`.
pub fn is_safe_path(basepath: Option<&str>, candidate: &Path, follow_symlinks: bool) -> bool {
    let Some(basepath) = basepath else {
        return true;
    };
    let resolved = if follow_symlinks {
        match candidate.canonicalize() {
            Ok(path) => path,
            // An unresolvable path cannot be proven inside the base.
            Err(_) => absolutize(candidate),
        }
    } else {
        absolutize(candidate)
    };
    resolved.to_string_lossy().starts_with(basepath)
}

/// Resolves a path to absolute form without touching symlinks, folding out
/// `.` and `..` components lexically.
fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };
    let mut result = PathBuf::new();
    for component in joined.components() {
        match component {
            std::path::Component::ParentDir => {
                result.pop();
            }
            std::path::Component::CurDir => {}
            other => result.push(other),
        }
    }
    result
}
