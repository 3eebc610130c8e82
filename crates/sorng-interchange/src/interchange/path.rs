//! Folder path grammar.
//!
//! Paths are flat, `/`-delimited strings of *escaped* folder names. A
//! separator is only a separator when it is not touching a space, which
//! lets a folder name carry a literal slash written as `" / "`:
//!
//! ```text
//! Work/Clients / Partners/Acme   ->   ["Work", "Clients / Partners", "Acme"]
//! ```
//!
//! A slash at the edge of a name loses its outer space, so the separator
//! next to it never touches a space:
//!
//! ```text
//! "/etc" under "Root"   ->   "Root// etc"   ->   ["Root", "/ etc"]
//! "Dev/" under "Root"   ->   "Root/Dev /"   ->   ["Root", "Dev /"]
//! ```
//!
//! A name that is a single slash has no inner space to lean on and is
//! written as `"/ /"`, a form no other name escapes to.

/// Path separator.
pub const SEPARATOR: char = '/';

const ESCAPED_SEPARATOR: &str = " / ";

const ESCAPED_LONE_SEPARATOR: &str = "/ /";

/// Split a path on every separator that is not adjacent to a space.
///
/// Empty segments are kept; use [`sanitize_path`] first when they must go.
pub fn split_raw(path: &str) -> Vec<&str> {
    let bytes = path.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;

    for (i, b) in bytes.iter().enumerate() {
        if *b != b'/' {
            continue;
        }
        let spaced_before = i > 0 && bytes[i - 1] == b' ';
        let spaced_after = i + 1 < bytes.len() && bytes[i + 1] == b' ';
        if !spaced_before && !spaced_after {
            segments.push(&path[start..i]);
            start = i + 1;
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Split a path into its trimmed, non-empty segments.
pub fn split_folder_path(path: &str) -> Vec<String> {
    split_raw(path)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Collapse separator runs and drop leading/trailing separators.
///
/// Escaped separators (`" / "`) are left untouched. Idempotent.
pub fn sanitize_path(path: &str) -> String {
    join_segments(&split_folder_path(path))
}

pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}

/// Escape a folder name so it can sit inside a path as one segment.
pub fn escape_name(name: &str) -> String {
    if name == "/" {
        return ESCAPED_LONE_SEPARATOR.to_string();
    }
    let mut escaped = name.replace(SEPARATOR, ESCAPED_SEPARATOR);
    if name.starts_with(SEPARATOR) {
        escaped.remove(0);
    }
    if name.ends_with(SEPARATOR) {
        escaped.pop();
    }
    escaped
}

/// Inverse of [`escape_name`].
pub fn resolve_escaped_name(escaped: &str) -> String {
    if escaped == ESCAPED_LONE_SEPARATOR {
        return "/".to_string();
    }
    let mut padded = String::with_capacity(escaped.len() + 2);
    if escaped.starts_with("/ ") {
        padded.push(' ');
    }
    padded.push_str(escaped);
    if escaped.ends_with(" /") {
        padded.push(' ');
    }
    padded.replace(ESCAPED_SEPARATOR, "/")
}

/// Append an (unescaped) name to a parent path.
pub fn child_path(parent_path: &str, name: &str) -> String {
    let parent = sanitize_path(parent_path);
    let name = escape_name(name.trim());
    if parent.is_empty() {
        name
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Prefix `path` with `root`; both are already-escaped paths.
pub fn prefix_path(root: &str, path: &str) -> String {
    let root = sanitize_path(root);
    let path = sanitize_path(path);
    match (root.is_empty(), path.is_empty()) {
        (true, _) => path,
        (false, true) => root,
        (false, false) => format!("{}/{}", root, path),
    }
}

/// Number of segments in a path. The depth of a folder is the depth of
/// its parent path.
pub fn depth(path: &str) -> usize {
    split_folder_path(path).len()
}

/// Split a path into `(parent_path, escaped_last_segment)`.
pub fn split_parent(path: &str) -> Option<(String, String)> {
    let mut segments = split_folder_path(path);
    let last = segments.pop()?;
    Some((join_segments(&segments), last))
}

/// Whether `path` is `ancestor` itself or lies beneath it.
pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    let path = split_folder_path(path);
    let ancestor = split_folder_path(ancestor);
    !ancestor.is_empty() && path.len() >= ancestor.len() && path[..ancestor.len()] == ancestor[..]
}

/// Every proper prefix of `path` followed by the path itself, shortest first.
pub fn prefixes(path: &str) -> Vec<String> {
    let segments = split_folder_path(path);
    (1..=segments.len())
        .map(|n| join_segments(&segments[..n]))
        .collect()
}
