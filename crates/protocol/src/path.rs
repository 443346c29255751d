//! Path handling for received relative paths.
//!
//! The wire carries paths in the sender's native separator convention.
//! Conversion happens exactly once, on receipt; outgoing paths are never
//! rewritten.

use std::path::{Component, Path, PathBuf};

/// Rewrites a received path to the local platform's separator convention.
#[must_use]
pub fn to_local_separators(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        path.replace('\\', "/")
    } else {
        path.replace('/', "\\")
    }
}

/// Joins a normalised relative path under `base`, refusing paths that could
/// land outside it.
///
/// Returns `None` when the path is absolute, names a drive prefix, or
/// contains a `..` component. `.` components are dropped.
#[must_use]
pub fn safe_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    let mut pushed = false;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::ParentDir => return None,
        }
    }
    pushed.then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn backslashes_become_local_separators() {
        assert_eq!(to_local_separators("docs\\sub\\a.txt"), "docs/sub/a.txt");
        assert_eq!(to_local_separators("plain.txt"), "plain.txt");
    }

    #[test]
    fn join_accepts_nested_relative_paths() {
        let base = Path::new("/srv/incoming");
        let joined = safe_join(base, "photos/cat.jpg").unwrap();
        assert_eq!(joined, base.join("photos").join("cat.jpg"));
    }

    #[test]
    fn join_drops_curdir_components() {
        let base = Path::new("/srv/incoming");
        let joined = safe_join(base, "./photos/./cat.jpg").unwrap();
        assert_eq!(joined, base.join("photos").join("cat.jpg"));
    }

    #[test]
    fn join_refuses_parent_escapes() {
        let base = Path::new("/srv/incoming");
        assert_eq!(safe_join(base, "../../etc/passwd"), None);
        assert_eq!(safe_join(base, "photos/../../../etc/passwd"), None);
    }

    #[test]
    fn join_refuses_absolute_paths() {
        let base = Path::new("/srv/incoming");
        assert_eq!(safe_join(base, "/etc/passwd"), None);
    }

    #[test]
    fn join_refuses_empty_input() {
        assert_eq!(safe_join(Path::new("/srv"), ""), None);
        assert_eq!(safe_join(Path::new("/srv"), "."), None);
    }
}
