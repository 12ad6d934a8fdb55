//! Request header map keyed by lower-cased header name.
//!
//! Header names are case-insensitive per [RFC 9110 §5.1]. A name that appears
//! more than once keeps only its last value.

use std::collections::HashMap;

/// A case-insensitive, single-value HTTP header map.
///
/// Names are stored lower-cased. Inserting a name that is already present
/// overwrites the previous value (last one wins).
///
/// # Examples
///
/// ```
/// use pingmon::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html");
/// headers.insert("X-Custom", "first");
/// headers.insert("x-custom", "second");
///
/// assert_eq!(headers.get("content-type"), Some("text/html"));
/// assert_eq!(headers.get("X-CUSTOM"), Some("second"));
/// assert_eq!(headers.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: HashMap::with_capacity(capacity),
        }
    }

    /// Stores `value` under the lower-cased `name`, replacing any earlier value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.inner.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Returns the value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.inner.get(name) {
            Some(value) => Some(value.as_str()),
            None => self
                .inner
                .get(&name.to_ascii_lowercase())
                .map(String::as_str),
        }
    }

    /// Returns `true` if the map contains the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of distinct header names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(h.get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn last_value_wins() {
        let mut h = Headers::new();
        h.insert("Host", "first");
        h.insert("HOST", "second");
        assert_eq!(h.get("host"), Some("second"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn names_are_stored_lower_cased() {
        let mut h = Headers::new();
        h.insert("X-Request-Id", "abc");
        let names: Vec<_> = h.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["x-request-id"]);
    }

    #[test]
    fn contains() {
        let mut h = Headers::new();
        h.insert("Authorization", "Bearer token");
        assert!(h.contains("authorization"));
        assert!(!h.contains("x-missing"));
    }
}
