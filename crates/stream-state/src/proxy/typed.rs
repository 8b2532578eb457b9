//! Kind-specific handles. Each wraps a [`StateProxy`] and exposes only the
//! reads and mutations that make sense for one kind of value.

use serde_json::{Map, Value};
use stream_state_path::Key;

use super::{Entry, StateProxy};
use crate::error::Result;

/// Handle over a string value.
#[derive(Debug)]
pub struct TextProxy<'a> {
    inner: StateProxy<'a>,
}

impl<'a> TextProxy<'a> {
    pub(super) fn new(inner: StateProxy<'a>) -> Self {
        Self { inner }
    }

    pub fn as_str(&self) -> Result<&str> {
        self.inner.as_str()
    }

    /// Character count.
    pub fn len(&self) -> Result<usize> {
        self.inner.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.inner.is_empty()
    }

    /// Appends `text` with a single `append-text`.
    pub fn push_str(&mut self, text: &str) -> Result<()> {
        self.inner.combine_in_place(text)
    }

    pub fn contains(&self, needle: &str) -> Result<bool> {
        Ok(self.as_str()?.contains(needle))
    }

    pub fn concat(&self, other: &str) -> Result<String> {
        let mut out = self.as_str()?.to_owned();
        out.push_str(other);
        Ok(out)
    }

    pub fn into_inner(self) -> StateProxy<'a> {
        self.inner
    }
}

/// Handle over a sequence value.
#[derive(Debug)]
pub struct SeqProxy<'a> {
    inner: StateProxy<'a>,
}

impl<'a> SeqProxy<'a> {
    pub(super) fn new(inner: StateProxy<'a>) -> Self {
        Self { inner }
    }

    pub fn view(&self) -> Result<&[Value]> {
        self.inner.as_seq()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.view()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.view()?.is_empty())
    }

    /// Positional read.
    pub fn get(&self, index: usize) -> Result<Option<&Value>> {
        Ok(self.view()?.get(index))
    }

    /// Replaces the element at `index`, or appends when `index` is the
    /// current length.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.inner.set(index, value)
    }

    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        self.inner.append(value)
    }

    pub fn extend<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.inner.extend(items)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.inner.clear()
    }

    pub fn contains(&self, value: &Value) -> Result<bool> {
        Ok(self.view()?.contains(value))
    }

    pub fn concat(&self, other: &[Value]) -> Result<Vec<Value>> {
        let mut out = self.view()?.to_vec();
        out.extend_from_slice(other);
        Ok(out)
    }

    pub fn into_inner(self) -> StateProxy<'a> {
        self.inner
    }
}

/// Handle over a mapping value.
#[derive(Debug)]
pub struct MapProxy<'a> {
    inner: StateProxy<'a>,
}

impl<'a> MapProxy<'a> {
    pub(super) fn new(inner: StateProxy<'a>) -> Self {
        Self { inner }
    }

    pub fn view(&self) -> Result<&Map<String, Value>> {
        self.inner.as_map()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.view()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.view()?.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.view()?.contains_key(key))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Result<impl Iterator<Item = &str> + '_> {
        Ok(self.view()?.keys().map(String::as_str))
    }

    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        self.inner.get(key)
    }

    pub fn item(&mut self, key: impl Into<Key>) -> Result<Entry<'_>> {
        self.inner.item(key)
    }

    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        self.inner.set(key, value)
    }

    pub fn setdefault(&mut self, key: impl Into<Key>, default: impl Into<Value>) -> Result<Entry<'_>> {
        self.inner.setdefault(key, default)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.inner.clear()
    }

    pub fn into_inner(self) -> StateProxy<'a> {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stream_state_path::{path, Path};

    use crate::error::ErrorKind;
    use crate::operation::Operation;
    use crate::store::StateStore;

    fn store_with(state: serde_json::Value) -> StateStore {
        let mut store = StateStore::new();
        store.apply(vec![Operation::set(Path::root(), state)]).unwrap();
        store
    }

    #[test]
    fn test_conversion_checks_kind() {
        let mut store = store_with(json!({"s": "a", "l": [], "m": {}}));
        assert!(store.proxy_at(path!["s"]).into_text().is_ok());
        assert!(store.proxy_at(path!["l"]).into_seq().is_ok());
        assert!(store.proxy_at(path!["m"]).into_map().is_ok());
        let err = store.proxy_at(path!["s"]).into_seq().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperandType);
        let err = store.proxy_at(path!["missing"]).into_map().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
    }

    #[test]
    fn test_text_proxy() {
        let mut store = store_with(json!({"s": "ab"}));
        let mark = store.log().len();
        let mut text = store.proxy_at(path!["s"]).into_text().unwrap();
        text.push_str("cd").unwrap();
        assert_eq!(text.as_str().unwrap(), "abcd");
        assert_eq!(text.concat("!").unwrap(), "abcd!");
        assert!(text.contains("bc").unwrap());
        assert_eq!(text.len().unwrap(), 4);
        assert_eq!(store.log()[mark..], [Operation::append_text(path!["s"], "cd")]);
    }

    #[test]
    fn test_seq_proxy() {
        let mut store = store_with(json!({"l": [1]}));
        let mut seq = store.proxy_at(path!["l"]).into_seq().unwrap();
        seq.push(2).unwrap();
        seq.set(0, 0).unwrap();
        seq.extend(["a", "b"]).unwrap();
        assert_eq!(seq.view().unwrap(), &[json!(0), json!(2), json!("a"), json!("b")]);
        assert_eq!(seq.get(3).unwrap(), Some(&json!("b")));
        assert_eq!(seq.get(9).unwrap(), None);
        assert_eq!(seq.concat(&[json!(true)]).unwrap().len(), 5);
        seq.clear().unwrap();
        assert!(seq.is_empty().unwrap());
    }

    #[test]
    fn test_map_proxy() {
        let mut store = store_with(json!({"m": {"b": 1}}));
        let mut map = store.proxy_at(path!["m"]).into_map().unwrap();
        map.set("a", 2).unwrap();
        assert_eq!(map.keys().unwrap().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(map.contains_key("a").unwrap());
        assert_eq!(map.get("a").unwrap(), Some(&json!(2)));
        assert!(map.setdefault("c", "x").unwrap().is_proxy());
        assert_eq!(map.len().unwrap(), 3);
        drop(map);
        assert_eq!(store.state(), &json!({"m": {"b": 1, "a": 2, "c": "x"}}));
    }
}
