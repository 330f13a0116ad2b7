//! Path parameters bound while walking the route trie.

use crate::convert;
use crate::path::WILDCARD;
use std::collections::HashMap;

/// Path parameters extracted from the request path.
///
/// Named parameters (`/user/:name`) are stored under their name, the tail
/// captured by a wildcard route (`/files/*`) under `*`. The typed getters
/// never fail: an absent name or an unparseable value yields the zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: HashMap<String, String>,
}

impl PathParams {
    /// Creates an empty parameter set
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(name.into(), value.into());
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns the raw value bound to `name`, if any
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(String::as_str)
    }

    /// Returns the tail captured by a wildcard route, e.g. `/1/2/3` for `/tail/*`
    #[inline]
    pub fn wildcard(&self) -> Option<&str> {
        self.get(WILDCARD)
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { inner: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
