//! Decoded URL query parameters.

use std::collections::HashMap;

use url::form_urlencoded;

/// Query-string parameters: each key maps to every value it was given, in order.
///
/// Keys and values are percent-decoded and `+` is decoded as a space, the way
/// HTML forms encode them.
///
/// # Examples
///
/// ```
/// use pingmon::http::QueryParams;
///
/// let params = QueryParams::parse("host=a&host=b&duration=3600&q=two+words");
/// assert_eq!(params.get_all("host"), &["a", "b"]);
/// assert_eq!(params.first("duration"), Some("3600"));
/// assert_eq!(params.first("q"), Some("two words"));
/// assert!(params.first("missing").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    map: HashMap<String, Vec<String>>,
}

impl QueryParams {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params.append(key.into_owned(), value.into_owned());
        }
        params
    }

    /// Adds `value` after any existing values for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.entry(key.into()).or_default().push(value.into());
    }

    /// Returns the first value given for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.map.get(key)?.first().map(String::as_str)
    }

    /// Returns every value given for `key`, empty if the key is absent.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_keep_order() {
        let p = QueryParams::parse("a=1&b=2&a=3");
        assert_eq!(p.get_all("a"), &["1", "3"]);
        assert_eq!(p.get_all("b"), &["2"]);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn percent_decoding() {
        let p = QueryParams::parse("group=core%20routers&x=%2Fpath");
        assert_eq!(p.first("group"), Some("core routers"));
        assert_eq!(p.first("x"), Some("/path"));
    }

    #[test]
    fn key_without_value() {
        let p = QueryParams::parse("flag&k=");
        assert_eq!(p.first("flag"), Some(""));
        assert_eq!(p.first("k"), Some(""));
    }

    #[test]
    fn empty_query() {
        let p = QueryParams::parse("");
        assert!(p.is_empty());
        assert!(p.get_all("anything").is_empty());
    }
}
