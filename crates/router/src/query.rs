//! Query string and urlencoded form values.

use crate::convert;
use std::collections::HashMap;
use tracing::debug;

/// A multi-valued map parsed from `a=1&b=2&b=3` style input.
///
/// Only the first value of a key is used by the typed getters, which return
/// the zero value for absent keys or unparseable values. A key without `=`
/// (`?wsdl`) is present with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    inner: HashMap<String, Vec<String>>,
}

impl Query {
    /// Parses an urlencoded string, `+` decodes to a space
    pub fn parse(raw: &str) -> Self {
        let mut query = Self::default();
        query.extend_from(raw);
        query
    }

    /// Appends the pairs of `raw` after the values already present
    pub(crate) fn extend_from(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }

        match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
            Ok(pairs) => {
                for (key, value) in pairs {
                    self.push(key, value);
                }
            }
            Err(e) => debug!(cause = %e, "ignore malformed urlencoded input"),
        }
    }

    pub(crate) fn push(&mut self, key: String, value: String) {
        self.inner.entry(key).or_default().push(value);
    }

    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Returns the first value of `name`
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    /// Returns every value of `name`, in input order
    pub fn values(&self, name: &str) -> &[String] {
        self.inner.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn string(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    pub fn int(&self, name: &str) -> isize {
        convert::to_int(self.get(name))
    }

    pub fn int64(&self, name: &str) -> i64 {
        convert::to_int64(self.get(name))
    }

    pub fn float(&self, name: &str) -> f64 {
        convert::to_float(self.get(name))
    }

    pub fn bool(&self, name: &str) -> bool {
        convert::to_bool(self.get(name))
    }
}
