//! Object key and digest normalization

use std::path::{Component, Path};

/// Build an object key from a path relative to the publish root.
///
/// Keys always use `/` separators whatever the host convention, so a file
/// scanned on Windows compares equal to the key the provider lists.
/// Returns `None` for paths that escape the root or are not valid UTF-8.
pub fn object_key(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Normalize a key given as a string: backslashes become `/`, and leading
/// `./` or `/` segments are dropped.
pub fn normalize_key(key: &str) -> String {
    let key = key.replace('\\', "/");
    let mut key = key.as_str();
    loop {
        if let Some(rest) = key.strip_prefix("./") {
            key = rest;
        } else if let Some(rest) = key.strip_prefix('/') {
            key = rest;
        } else {
            break;
        }
    }
    key.to_string()
}

/// Canonical form of a content digest: unquoted, lowercase hex.
///
/// Providers return ETags wrapped in double quotes (`"abc123"`), sometimes
/// with a weak validator prefix (`W/"abc123"`).
pub fn normalize_digest(digest: &str) -> String {
    let digest = digest.trim();
    let digest = digest.strip_prefix("W/").unwrap_or(digest);
    digest
        .trim_matches(|c: char| c == '"' || c == '\'')
        .to_ascii_lowercase()
}

/// Whether a provider digest is a multipart upload ETag (`<md5>-<parts>`),
/// which is not the MD5 of the object content.
pub fn is_multipart_digest(digest: &str) -> bool {
    let digest = normalize_digest(digest);
    match digest.rsplit_once('-') {
        Some((hash, parts)) => {
            !hash.is_empty() && !parts.is_empty() && parts.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Compare a provider digest with a locally computed one.
pub fn digests_match(remote: &str, local: &str) -> bool {
    let remote = normalize_digest(remote);
    !remote.is_empty() && remote == normalize_digest(local)
}
