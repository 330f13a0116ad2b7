//! Best-effort conversions shared by path, query and form accessors.
//!
//! Every function returns the zero value of its type when the input is
//! missing or malformed.

/// Parses into the platform word, 64 bits wide on 64-bit targets
#[inline]
pub(crate) fn to_int(value: Option<&str>) -> isize {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

#[inline]
pub(crate) fn to_int64(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

#[inline]
pub(crate) fn to_float(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

/// Accepts the spellings `1 t T TRUE true True` and `0 f F FALSE false False`.
pub(crate) fn to_bool(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "t" | "T" | "TRUE" | "true" | "True"))
}
