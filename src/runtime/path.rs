//! Lexical path helpers used when resolving entry points and configured roots.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the root stays at the root; above a relative start it is kept
                match result.components().next_back() {
                    Some(Component::Normal(_)) => {
                        result.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => result.push(component),
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Resolve `path` against `base` when it is relative, then normalize it.
///
/// Absolute inputs are only normalized, so `..` segments in a configured
/// path never survive into cache or entry paths.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_entry_with_dot() {
        assert_eq!(
            normalize_path(Path::new("/store/_cmd@1.0.0@cmd/./lib/index.js")),
            PathBuf::from("/store/_cmd@1.0.0@cmd/lib/index.js")
        );
    }

    #[test]
    fn test_normalize_path_entry_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/store/_cmd@1.0.0@cmd/bin/../lib/index.js")),
            PathBuf::from("/store/_cmd@1.0.0@cmd/lib/index.js")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_path_parent_above_root() {
        assert_eq!(
            normalize_path(Path::new("/usr/../../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[test]
    fn test_normalize_path_relative_keeps_leading_parent() {
        assert_eq!(
            normalize_path(Path::new("../a/./b/../c")),
            PathBuf::from("../a/c")
        );
    }

    #[test]
    fn test_normalize_path_only_dots() {
        assert_eq!(normalize_path(Path::new("./././.")), PathBuf::from(""));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_against_relative() {
        assert_eq!(
            resolve_against(Path::new("/home/user/project"), Path::new("../plugin")),
            PathBuf::from("/home/user/plugin")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_against_absolute_passthrough() {
        assert_eq!(
            resolve_against(Path::new("/ignored"), Path::new("/opt/./plugin")),
            PathBuf::from("/opt/plugin")
        );
    }

    #[cfg(windows)]
    #[test]
    fn test_normalize_path_windows_with_dots() {
        assert_eq!(
            normalize_path(Path::new("C:\\Users\\test\\..\\other")),
            PathBuf::from("C:\\Users\\other")
        );
    }
}
