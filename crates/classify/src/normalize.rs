use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: repeated separators collapse, `.` segments
/// vanish and `..` consumes the segment before it. Symlinks are never
/// consulted, so `a/link/..` becomes `a` whatever `link` points at.
///
/// An empty result is `.`. A `..` directly under the root is dropped; a
/// leading `..` on a relative path is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }

    parts.iter().collect()
}
