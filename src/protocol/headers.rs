//! Ordered, case-insensitive header storage.
//!
//! [`Headers`] keeps the raw `(name, value)` pairs in insertion order with the
//! name exactly as it was first supplied. Lookups compare lower-cased names,
//! so `X-Foo` and `x-foo` address the same entries, while serialization
//! (see [`Headers::iter`] and [`Headers::to_raw`]) reproduces the original
//! casing for case-sensitive peers.
//!
//! # Name normalization
//!
//! | Supplied | Lookup key |
//! |----------|------------|
//! | `Content-Type` | `content-type` |
//! | `Referrer` | `referer` |
//! | `referer` | `referer` |
//!
//! The `referrer` spelling is accepted as an alias of the registered
//! `Referer` header; the stored name keeps whatever spelling the caller used.
//!
//! # Examples
//!
//! ```
//! use relay_http::Headers;
//!
//! let mut headers = Headers::new();
//! headers.set("X-Foo", "a");
//! headers.append("x-foo", "b");
//!
//! assert_eq!(headers.get("x-foo").as_deref(), Some("a, b"));
//! assert_eq!(headers.get_all("X-FOO"), vec!["a", "b"]);
//! assert_eq!(headers.name("x-foo"), Some("X-Foo"));
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Normalize a header name for comparison.
fn lower_header(name: &str) -> Cow<'_, str> {
    if name.eq_ignore_ascii_case("referrer") {
        return Cow::Borrowed("referer");
    }

    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

fn same_header(a: &str, b: &str) -> bool {
    lower_header(a) == lower_header(b)
}

/// Extract the media type from a `Content-Type` value (parameters stripped).
pub fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

/// Insertion-ordered multi-value header container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat `[name, value, name, value, ...]` list.
    ///
    /// A trailing name without a value is ignored.
    pub fn from_raw<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut headers = Headers::new();
        for pair in raw.chunks_exact(2) {
            headers.append(pair[0].as_ref(), pair[1].as_ref());
        }
        headers
    }

    /// Replace every entry named `name` with a single value.
    ///
    /// The new entry takes the position of the first replaced one, so header
    /// order survives updates.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.set_all(name, [value.into()])
    }

    /// Replace every entry named `name` with one raw pair per value.
    ///
    /// An empty iterator removes the header.
    pub fn set_all<I, V>(&mut self, name: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let position = self.entries.iter().position(|(n, _)| same_header(n, name));
        self.remove(name);

        let at = position.unwrap_or(self.entries.len());
        let replacement: Vec<(String, String)> = values
            .into_iter()
            .map(|value| (name.to_string(), value.into()))
            .collect();
        self.entries.splice(at..at, replacement);
        self
    }

    /// Set or delete: `None` removes every entry named `name`.
    pub fn set_opt(&mut self, name: &str, value: Option<impl Into<String>>) -> &mut Self {
        match value {
            Some(value) => self.set(name, value),
            None => self.remove(name),
        }
    }

    /// Add an entry without touching existing ones.
    pub fn append(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.entries.push((name.to_string(), value.into()));
        self
    }

    /// Merged value for `name`: all raw values joined with `", "`.
    pub fn get(&self, name: &str) -> Option<String> {
        let values = self.get_all(name);
        match values.len() {
            0 => None,
            1 => Some(values[0].to_string()),
            _ => Some(values.join(", ")),
        }
    }

    /// First raw value for `name`.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| same_header(n, name))
            .map(|(_, v)| v.as_str())
    }

    /// All raw values for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| same_header(n, name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether any entry is named `name`.
    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| same_header(n, name))
    }

    /// Delete every entry named `name`.
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.entries.retain(|(n, _)| !same_header(n, name));
        self
    }

    /// The original-case name of the first entry matching `name`.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| same_header(n, name))
            .map(|(n, _)| n.as_str())
    }

    /// Media type of `Content-Type`, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.get_first(super::constants::headers::CONTENT_TYPE)
            .map(media_type)
    }

    /// Set `Content-Type`.
    pub fn set_content_type(&mut self, value: impl Into<String>) -> &mut Self {
        self.set(super::constants::headers::CONTENT_TYPE, value)
    }

    /// Raw pairs with their original names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Flat `[name, value, ...]` list; always of even length.
    pub fn to_raw(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(n, v)| [n.clone(), v.clone()])
            .collect()
    }

    /// Merged view keyed by original-case name (first spelling wins).
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for (name, _) in &self.entries {
            let original = self.name(name).unwrap_or(name);
            if !map.contains_key(original) {
                if let Some(value) = self.get(name) {
                    map.insert(original.to_string(), value);
                }
            }
        }
        map
    }

    /// Number of raw pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no headers are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

impl From<&http::HeaderMap> for Headers {
    /// Values that are not visible ASCII are decoded lossily.
    fn from(map: &http::HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| {
                (
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_with_case_preservation() {
        let mut headers = Headers::new();
        headers.set("X-Foo", "a");

        assert_eq!(headers.get("x-foo").as_deref(), Some("a"));
        assert_eq!(headers.name("X-FOO"), Some("X-Foo"));
        assert_eq!(headers.to_raw(), vec!["X-Foo".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut headers = Headers::from_raw(&["Accept", "*/*", "X-A", "1", "Host", "h", "x-a", "2"]);
        headers.set("X-A", "3");

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Accept", "X-A", "Host"]);
        assert_eq!(headers.get_all("x-a"), vec!["3"]);
    }

    #[test]
    fn test_append_keeps_prior_values() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1").append("set-cookie", "b=2");

        assert_eq!(headers.get_all("SET-COOKIE"), vec!["a=1", "b=2"]);
        assert_eq!(headers.get("set-cookie").as_deref(), Some("a=1, b=2"));
        assert_eq!(headers.get_first("set-cookie"), Some("a=1"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_set_opt_none_deletes() {
        let mut headers = Headers::new();
        headers.set("Accept", "*/*");
        headers.set_opt("accept", None::<String>);

        assert!(!headers.has("Accept"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_set_all_and_remove() {
        let mut headers = Headers::new();
        headers.set_all("Cookie", ["a=1", "b=2"]);
        assert_eq!(headers.get_all("cookie").len(), 2);

        headers.remove("COOKIE");
        assert_eq!(headers.get("cookie"), None);
    }

    #[test]
    fn test_referrer_aliases_referer() {
        let mut headers = Headers::new();
        headers.set("Referrer", "http://example.com");

        assert_eq!(headers.get("referer").as_deref(), Some("http://example.com"));
        assert_eq!(headers.name("Referer"), Some("Referrer"));
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let mut headers = Headers::new();
        headers.set_content_type("application/json; charset=utf-8");

        assert_eq!(headers.content_type(), Some("application/json"));
        assert_eq!(
            headers.get("content-type").as_deref(),
            Some("application/json; charset=utf-8")
        );
    }

    #[test]
    fn test_from_raw_ignores_dangling_name() {
        let headers = Headers::from_raw(&["A", "1", "B"]);
        assert_eq!(headers.to_raw().len(), 2);
    }

    #[test]
    fn test_to_map_merges_by_first_spelling() {
        let headers = Headers::from_raw(&["X-Id", "1", "x-id", "2", "Accept", "*/*"]);
        let map = headers.to_map();

        assert_eq!(map.get("X-Id").map(String::as_str), Some("1, 2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_from_header_map() {
        let mut map = http::HeaderMap::new();
        map.append("set-cookie", "a=1".parse().unwrap());
        map.append("set-cookie", "b=2".parse().unwrap());

        let headers = Headers::from(&map);
        assert_eq!(headers.get_all("Set-Cookie"), vec!["a=1", "b=2"]);
    }
}
