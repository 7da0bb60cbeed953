//! Helpers for URIs that originate from the backend.

/// Length of the resource tag some backend-originated participant and
/// sender URIs carry, including its leading `/`.
pub const RESOURCE_SUFFIX_LEN: usize = 35;

/// Strip the trailing resource tag from a backend-originated URI.
///
/// Only strips when the character exactly [`RESOURCE_SUFFIX_LEN`] bytes from
/// the end is `/`. The tag format is not documented, so this is intentionally
/// limited to that one shape.
pub fn strip_resource_suffix(uri: &str) -> &str {
    let len = uri.len();
    if len > RESOURCE_SUFFIX_LEN && uri.as_bytes()[len - RESOURCE_SUFFIX_LEN] == b'/' {
        &uri[..len - RESOURCE_SUFFIX_LEN]
    } else {
        uri
    }
}
