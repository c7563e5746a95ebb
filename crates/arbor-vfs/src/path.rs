//! Path handling shared by the views.
//!
//! Filesystem callers may pass `"/a/b"`, `"a/b/"` or `"./a"`; internally every
//! path is the slash-joined segment list with no leading slash, and the root
//! is `""`.

pub use arbor_index::join_path;

use crate::error::{VfsError, VfsResult};

/// Canonical form of `path`. Empty and `.` segments are dropped; `..` is
/// rejected.
pub fn normalize(op: &'static str, path: &str) -> VfsResult<String> {
    let mut segments = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                return Err(VfsError::InvalidPath {
                    op,
                    path: path.to_string(),
                    reason: "parent segments are not supported".into(),
                })
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// `("a/b", "c")` for `"a/b/c"`, `("", "c")` for `"c"`.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Last segment, `/` for the root.
pub fn file_name(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        split_parent(path).1
    }
}

/// Proper ancestors of `path`, shortest first, excluding the root.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

/// Whether `path` is `dir` or lies beneath it.
pub fn is_within(path: &str, dir: &str) -> bool {
    dir.is_empty()
        || path == dir
        || (path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/')
}

/// For display: `/` for the root, the path otherwise.
pub(crate) fn display(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_slashes_and_dots() {
        assert_eq!(normalize("t", "/a//b/./c/").unwrap(), "a/b/c");
        assert_eq!(normalize("t", "/").unwrap(), "");
        assert_eq!(normalize("t", "").unwrap(), "");
        assert!(matches!(
            normalize("t", "a/../b"),
            Err(VfsError::InvalidPath { op: "t", .. })
        ));
    }

    #[test]
    fn parents_and_names() {
        assert_eq!(split_parent("a/b/c"), ("a/b", "c"));
        assert_eq!(split_parent("c"), ("", "c"));
        assert_eq!(file_name(""), "/");
        assert_eq!(ancestors("a/b/c").collect::<Vec<_>>(), ["a", "a/b"]);
        assert_eq!(ancestors("a").count(), 0);
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("a/b", "a"));
        assert!(is_within("a", "a"));
        assert!(is_within("anything", ""));
        assert!(!is_within("ab", "a"));
        assert!(!is_within("a", "a/b"));
    }
}
