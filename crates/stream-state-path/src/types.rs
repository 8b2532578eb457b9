//! Key and path types.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{format_pointer, is_valid_index};

/// One step of a [`Path`].
///
/// Mapping keys and sequence indices share a single representation: an index
/// is stored as its decimal string, so `Key::from(2)` and `Key::from("2")`
/// are the same key.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the sequence index this key addresses, if it is a canonical
    /// non-negative decimal (no sign, no leading zeros).
    pub fn as_index(&self) -> Option<usize> {
        if !is_valid_index(&self.0) {
            return None;
        }
        self.0.parse().ok()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for Key {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.to_owned())
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key(s.clone())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key(i.to_string())
    }
}

impl From<u32> for Key {
    fn from(i: u32) -> Self {
        Key(i.to_string())
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key(i.to_string())
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

impl PartialEq<str> for Key {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Key {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// Producers written against other runtimes sometimes send sequence indices as
// JSON numbers; they are normalized to decimal strings on the way in.
impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawKey {
            Str(String),
            Index(u64),
        }

        Ok(match RawKey::deserialize(deserializer)? {
            RawKey::Str(s) => Key(s),
            RawKey::Index(i) => Key(i.to_string()),
        })
    }
}

/// An ordered sequence of keys addressing a location inside a state tree.
///
/// The empty path addresses the root. On the wire a path is a JSON array of
/// strings; for humans it renders as an RFC 6901 JSON Pointer.
///
/// # Example
///
/// ```
/// use stream_state_path::{path, Path};
///
/// let p = path!["items", 0];
/// assert_eq!(p.len(), 2);
/// assert_eq!(p.to_string(), "/items/0");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Key>);

impl Path {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn root() -> Self {
        Self::new()
    }

    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// Returns a new path with `key` appended.
    pub fn child(&self, key: impl Into<Key>) -> Self {
        let mut keys = Vec::with_capacity(self.0.len() + 1);
        keys.extend(self.0.iter().cloned());
        keys.push(key.into());
        Self(keys)
    }

    pub fn push(&mut self, key: impl Into<Key>) {
        self.0.push(key.into());
    }

    pub fn pop(&mut self) -> Option<Key> {
        self.0.pop()
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    /// Splits the path into its parent prefix and final key.
    ///
    /// Returns `None` for the root path.
    pub fn split_parent(&self) -> Option<(&[Key], &Key)> {
        let (last, parent) = self.0.split_last()?;
        Some((parent, last))
    }

    /// Renders the path as an RFC 6901 JSON Pointer.
    pub fn to_pointer(&self) -> String {
        format_pointer(&self.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pointer())
    }
}

impl From<Vec<Key>> for Path {
    fn from(keys: Vec<Key>) -> Self {
        Self(keys)
    }
}

impl From<&[Key]> for Path {
    fn from(keys: &[Key]) -> Self {
        Self(keys.to_vec())
    }
}

impl FromIterator<Key> for Path {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Deref for Path {
    type Target = [Key];

    fn deref(&self) -> &[Key] {
        &self.0
    }
}

impl AsRef<[Key]> for Path {
    fn as_ref(&self) -> &[Key] {
        &self.0
    }
}

/// Builds a [`Path`] from a list of keys of mixed string/integer types.
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($key:expr),+ $(,)?) => {
        $crate::Path::from(vec![$($crate::Key::from($key)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_index() {
        assert_eq!(Key::from(3usize).as_index(), Some(3));
        assert_eq!(Key::from("3").as_index(), Some(3));
        assert_eq!(Key::from("03").as_index(), None);
        assert_eq!(Key::from("-1").as_index(), None);
        assert_eq!(Key::from("name").as_index(), None);
    }

    #[test]
    fn test_path_serializes_as_strings() {
        let p = path!["items", 1usize, "text"];
        assert_eq!(serde_json::to_value(&p).unwrap(), json!(["items", "1", "text"]));
    }

    #[test]
    fn test_path_accepts_integer_keys() {
        let p: Path = serde_json::from_value(json!(["items", 1, "text"])).unwrap();
        assert_eq!(p, path!["items", "1", "text"]);
    }

    #[test]
    fn test_split_parent() {
        let p = path!["a", "b"];
        let (parent, last) = p.split_parent().unwrap();
        assert_eq!(parent, &[Key::from("a")][..]);
        assert_eq!(last, "b");
        assert!(Path::root().split_parent().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Path::root().to_string(), "");
        assert_eq!(path!["a/b", "~k"].to_string(), "/a~1b/~0k");
    }
}
