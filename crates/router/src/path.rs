//! Path segmentation used by both route registration and dispatch.
//!
//! A path is split into an ordered list of decoded segments. The list always
//! starts with the synthetic root segment [`ROOT`], empty components are
//! dropped, and a component decoding to [`WILDCARD`] ends the list.
//!
//! ```
//! use micro_router::path::segment;
//!
//! assert_eq!(segment("/a//b/").unwrap(), vec!["/", "a", "b"]);
//! assert_eq!(segment("/posts/*/ignored").unwrap(), vec!["/", "posts", "*"]);
//! assert!(segment("relative").is_none());
//! ```

use std::borrow::Cow;

/// The synthetic first segment emitted for every valid path.
pub const ROOT: &str = "/";

/// The segment that captures the rest of a path.
pub const WILDCARD: &str = "*";

const SEPARATOR: char = '/';

/// Splits `path` into decoded segments.
///
/// Returns `None` when the path is empty, does not start with `/`, or one of
/// its components is not a valid percent-encoded utf-8 string.
pub fn segment(path: &str) -> Option<Vec<Cow<'_, str>>> {
    let rest = path.strip_prefix(SEPARATOR)?;

    let mut segments = Vec::with_capacity(8);
    segments.push(Cow::Borrowed(ROOT));

    for component in rest.split(SEPARATOR).filter(|c| !c.is_empty()) {
        let decoded = unescape(component)?;
        let is_wildcard = decoded == WILDCARD;
        segments.push(decoded);
        if is_wildcard {
            break;
        }
    }

    Some(segments)
}

/// Percent-decodes a single path component.
///
/// Unlike form decoding, `+` is kept as is. A `%` must be followed by two hex
/// digits, and the decoded bytes must be valid utf-8.
pub(crate) fn unescape(component: &str) -> Option<Cow<'_, str>> {
    if !component.contains('%') {
        return Some(Cow::Borrowed(component));
    }

    let bytes = component.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            decoded.push((hi << 4) | lo);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).ok().map(Cow::Owned)
}

#[inline]
fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
