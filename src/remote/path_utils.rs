//! Share URL utilities
//!
//! Remote objects are addressed by server-qualified URLs of the form
//! `scheme://host/share/segment/.../`. Directories conventionally carry a
//! trailing `/`; every helper here accepts either form.

/// Separator used in share URLs, regardless of local or remote OS.
pub const SEPARATOR: char = '/';

/// Build the root URL of a share: `scheme://host/share/`
pub fn share_root_url(scheme: &str, host: &str, share: &str) -> String {
    format!(
        "{}://{}/{}/",
        scheme,
        host.trim_matches(SEPARATOR),
        share.trim_matches(SEPARATOR)
    )
}

/// Append a separator unless the path already ends with one.
pub fn ensure_trailing_separator(path: &str) -> String {
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{}{}", path, SEPARATOR)
    }
}

/// Remove every trailing separator.
pub fn strip_trailing_separator(name: &str) -> &str {
    name.trim_end_matches(SEPARATOR)
}

/// Join share URL components using `/`.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.ends_with(SEPARATOR) {
        format!("{}{}", base, component)
    } else {
        format!("{}{}{}", base, SEPARATOR, component)
    }
}

/// Length of the `scheme://` prefix, if any.
fn authority_start(path: &str) -> usize {
    path.find("://").map(|i| i + 3).unwrap_or(0)
}

/// Parent directory of a path, always with a trailing separator.
///
/// `smb://h/s/a/b/` and `smb://h/s/a/b` both yield `smb://h/s/a/`.
/// The parent of a share root is the server (`smb://h/`); the server has no
/// parent and is returned unchanged.
pub fn parent_path(path: &str) -> String {
    let start = authority_start(path);
    let trimmed = strip_trailing_separator(path);
    match trimmed[start..].rfind(SEPARATOR) {
        Some(idx) => trimmed[..start + idx + 1].to_string(),
        None => ensure_trailing_separator(trimmed),
    }
}

/// Trailing segment of a path with separators removed.
///
/// Works for local resource addresses too (`file:///tmp/a.txt` -> `a.txt`).
pub fn last_segment(path: &str) -> &str {
    let trimmed = strip_trailing_separator(path);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// A share URL decomposed into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLocation {
    pub host: String,
    pub share: String,
    /// Path below the share root, without leading/trailing separators.
    /// Empty for the share root itself.
    pub relative: String,
}

/// Split `scheme://host/share/rel...` into its parts.
///
/// Returns `None` when the URL has no host or share, or when a segment is
/// `..` (paths never escape the share).
pub fn split_share_url(url: &str) -> Option<ShareLocation> {
    let start = url.find("://")? + 3;
    let mut segments = url[start..]
        .split(SEPARATOR)
        .filter(|s| !s.is_empty() && *s != ".");

    let host = segments.next()?.to_string();
    let share = segments.next()?.to_string();

    let mut rest = Vec::new();
    for segment in segments {
        if segment == ".." {
            return None;
        }
        rest.push(segment);
    }

    Some(ShareLocation {
        host,
        share,
        relative: rest.join("/"),
    })
}
