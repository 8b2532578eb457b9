//! Mutation proxies over a [`StateStore`].
//!
//! A [`StateProxy`] is a borrow of the store plus a [`Path`]. It keeps no
//! copy of the value it points at: every read resolves through the store,
//! and every mutation is turned into the smallest batch of operations that
//! expresses it and handed to [`StateStore::apply`].
//!
//! ```
//! use serde_json::json;
//! use stream_state::{path, Operation, StateStore};
//!
//! let mut store = StateStore::new();
//! let mut root = store.root();
//! root.set("title", "Hel").unwrap();
//! root.at("title").unwrap().combine_in_place("lo").unwrap();
//!
//! assert_eq!(store.state(), &json!({"title": "Hello"}));
//! assert_eq!(store.log()[1], Operation::append_text(path!["title"], "lo"));
//! ```

mod typed;

pub use typed::{MapProxy, SeqProxy, TextProxy};

use std::fmt;

use serde_json::{Map, Value};
use stream_state_path::{kind_name, Key, Path, PathError};

use crate::error::{Result, StateError};
use crate::operation::Operation;
use crate::store::StateStore;

/// What an indexed read yields: a plain value for null, booleans, and
/// numbers, a proxy for strings, sequences, and mappings.
pub enum Entry<'a> {
    Value(Value),
    Proxy(StateProxy<'a>),
}

impl<'a> Entry<'a> {
    pub fn is_proxy(&self) -> bool {
        matches!(self, Entry::Proxy(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Proxy(_) => None,
        }
    }

    pub fn into_proxy(self) -> Option<StateProxy<'a>> {
        match self {
            Entry::Proxy(p) => Some(p),
            Entry::Value(_) => None,
        }
    }

    /// An owned copy of the value, resolving proxies through the store.
    pub fn to_value(&self) -> Result<Value> {
        match self {
            Entry::Value(v) => Ok(v.clone()),
            Entry::Proxy(p) => p.to_value(),
        }
    }
}

impl fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Entry::Proxy(p) => f.debug_tuple("Proxy").field(p).finish(),
        }
    }
}

fn is_proxied(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Array(_) | Value::Object(_))
}

pub struct StateProxy<'a> {
    store: &'a mut StateStore,
    path: Path,
}

impl<'a> StateProxy<'a> {
    pub(crate) fn new(store: &'a mut StateStore, path: Path) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current value at this proxy's path.
    pub fn value(&self) -> Result<&Value> {
        self.store.get(&self.path)
    }

    pub fn to_value(&self) -> Result<Value> {
        self.value().cloned()
    }

    /// A shorter-lived proxy at the same path.
    pub fn reborrow(&mut self) -> StateProxy<'_> {
        StateProxy {
            store: &mut *self.store,
            path: self.path.clone(),
        }
    }

    /// Indexed read, consuming the proxy. Only mappings are indexable this
    /// way; positional reads go through [`SeqProxy::get`].
    pub fn into_item(self, key: impl Into<Key>) -> Result<Entry<'a>> {
        let key = key.into();
        let value = self.mapping_child(&key)?;
        if !is_proxied(value) {
            return Ok(Entry::Value(value.clone()));
        }
        let child = self.path.child(key);
        Ok(Entry::Proxy(StateProxy::new(self.store, child)))
    }

    /// Indexed read.
    pub fn item(&mut self, key: impl Into<Key>) -> Result<Entry<'_>> {
        self.reborrow().into_item(key)
    }

    /// Descends into a string, sequence, or mapping held under `key` of this
    /// mapping.
    pub fn at(self, key: impl Into<Key>) -> Result<StateProxy<'a>> {
        let key = key.into();
        let value = self.mapping_child(&key)?;
        if !is_proxied(value) {
            let found = kind_name(value);
            return Err(StateError::operand(
                "at",
                &self.path.child(key),
                format!("{found} values are read by value, not through a proxy"),
            ));
        }
        let child = self.path.child(key);
        Ok(StateProxy::new(self.store, child))
    }

    /// Indexed write: one `set` at `path + [key]`. The store decides
    /// whether the location is valid.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let op = Operation::set(self.path.child(key), value);
        self.store.apply(vec![op])
    }

    /// In-place `+=`. Strings take a string and emit one `append-text`.
    /// Sequences take a sequence, or a string whose characters become the new
    /// elements, and emit one `set` per new element.
    pub fn combine_in_place(&mut self, other: impl Into<Value>) -> Result<()> {
        let other = other.into();
        let ops = match (self.value()?, other) {
            (Value::String(_), Value::String(text)) => {
                vec![Operation::append_text(self.path.clone(), text)]
            }
            (Value::String(_), other) => {
                return Err(self.operand(
                    "combine_in_place",
                    format!("can only append a string to a string, not {}", kind_name(&other)),
                ))
            }
            (Value::Array(current), Value::Array(items)) => self.appends(current.len(), items),
            (Value::Array(current), Value::String(text)) => self.appends(
                current.len(),
                text.chars().map(|c| Value::String(c.to_string())),
            ),
            (Value::Array(_), other) => {
                return Err(self.operand(
                    "combine_in_place",
                    format!("cannot extend a sequence with {}", kind_name(&other)),
                ))
            }
            (current, _) => {
                let found = kind_name(current);
                return Err(self.operand(
                    "combine_in_place",
                    format!("{found} does not support in-place combine"),
                ));
            }
        };
        self.store.apply(ops)
    }

    /// Appends each item to the sequence, one `set` per item.
    pub fn extend<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let len = self.seq_len("extend")?;
        let ops = self.appends(len, items.into_iter().map(Into::into));
        self.store.apply(ops)
    }

    /// Appends one item to the sequence.
    pub fn append(&mut self, item: impl Into<Value>) -> Result<()> {
        let len = self.seq_len("append")?;
        let op = Operation::set(self.path.child(len), item);
        self.store.apply(vec![op])
    }

    /// Replaces a sequence or mapping with an empty one of the same kind.
    pub fn clear(&mut self) -> Result<()> {
        let empty = match self.value()? {
            Value::Array(_) => Value::Array(Vec::new()),
            Value::Object(_) => Value::Object(Map::new()),
            other => {
                let found = kind_name(other);
                return Err(self.operand("clear", format!("cannot clear {found}")));
            }
        };
        self.store.apply(vec![Operation::set(self.path.clone(), empty)])
    }

    /// Returns the entry at `key`, first writing `default` there if the
    /// mapping lacks it.
    pub fn setdefault(&mut self, key: impl Into<Key>, default: impl Into<Value>) -> Result<Entry<'_>> {
        let key = key.into();
        let present = self.as_map_for("setdefault")?.contains_key(key.as_str());
        if !present {
            self.set(key.clone(), default)?;
        }
        self.item(key)
    }

    /// Mapping lookup that yields `None` for a missing key.
    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        Ok(self.as_map_for("get")?.get(key))
    }

    /// `self + other` as a new value. Never touches the store.
    pub fn concat(&self, other: &Value) -> Result<Value> {
        match (self.value()?, other) {
            (Value::String(a), Value::String(b)) => {
                let mut out = String::with_capacity(a.len() + b.len());
                out.push_str(a);
                out.push_str(b);
                Ok(Value::String(out))
            }
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            (current, other) => Err(self.operand(
                "concat",
                format!("cannot concatenate {} and {}", kind_name(current), kind_name(other)),
            )),
        }
    }

    /// Length in characters for strings, elements for sequences, entries for
    /// mappings.
    pub fn len(&self) -> Result<usize> {
        match self.value()? {
            Value::String(s) => Ok(s.chars().count()),
            Value::Array(a) => Ok(a.len()),
            Value::Object(m) => Ok(m.len()),
            other => Err(self.operand("len", format!("{} has no length", kind_name(other)))),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Substring test for strings, element test for sequences, key test for
    /// mappings.
    pub fn contains(&self, needle: &Value) -> Result<bool> {
        match (self.value()?, needle) {
            (Value::String(s), Value::String(n)) => Ok(s.contains(n.as_str())),
            (Value::Array(a), n) => Ok(a.contains(n)),
            (Value::Object(m), Value::String(k)) => Ok(m.contains_key(k.as_str())),
            (Value::Object(_), _) => Ok(false),
            (current, n) => Err(self.operand(
                "contains",
                format!("cannot look for {} in {}", kind_name(n), kind_name(current)),
            )),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self.value()? {
            Value::String(s) => Ok(s.as_str()),
            other => Err(self.expected("as_str", "string", other)),
        }
    }

    pub fn as_seq(&self) -> Result<&[Value]> {
        match self.value()? {
            Value::Array(a) => Ok(a.as_slice()),
            other => Err(self.expected("as_seq", "sequence", other)),
        }
    }

    pub fn as_map(&self) -> Result<&Map<String, Value>> {
        self.as_map_for("as_map")
    }

    pub fn into_text(self) -> Result<TextProxy<'a>> {
        self.as_str()?;
        Ok(TextProxy::new(self))
    }

    pub fn into_seq(self) -> Result<SeqProxy<'a>> {
        self.as_seq()?;
        Ok(SeqProxy::new(self))
    }

    pub fn into_map(self) -> Result<MapProxy<'a>> {
        self.as_map()?;
        Ok(MapProxy::new(self))
    }

    // Positional and removing mutations have no minimal encoding in `set`
    // and `append-text`: each would shift or drop siblings and force the
    // whole collection back onto the wire.

    pub fn insert(&mut self, _index: usize, _item: impl Into<Value>) -> Result<()> {
        Err(StateError::not_supported(
            "insert",
            "positional insert shifts every later element; use append or set",
        ))
    }

    pub fn pop(&mut self) -> Result<Value> {
        Err(StateError::not_supported(
            "pop",
            "removal cannot be expressed as set or append-text",
        ))
    }

    pub fn remove(&mut self, _key: impl Into<Key>) -> Result<()> {
        Err(StateError::not_supported(
            "remove",
            "removal cannot be expressed as set or append-text",
        ))
    }

    pub fn update(&mut self, _other: Map<String, Value>) -> Result<()> {
        Err(StateError::not_supported(
            "update",
            "set each key individually",
        ))
    }

    pub fn popitem(&mut self) -> Result<(String, Value)> {
        Err(StateError::not_supported(
            "popitem",
            "removal cannot be expressed as set or append-text",
        ))
    }

    fn appends<I>(&self, len: usize, items: I) -> Vec<Operation>
    where
        I: IntoIterator<Item = Value>,
    {
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| Operation::set(self.path.child(len + i), item))
            .collect()
    }

    fn seq_len(&self, op: &'static str) -> Result<usize> {
        match self.value()? {
            Value::Array(a) => Ok(a.len()),
            other => Err(self.expected(op, "sequence", other)),
        }
    }

    fn mapping_child(&self, key: &Key) -> Result<&Value> {
        match self.value()? {
            Value::Object(map) => match map.get(key.as_str()) {
                Some(value) => Ok(value),
                None => Err(PathError::MissingKey {
                    at: self.path.clone(),
                    key: key.clone(),
                }
                .into()),
            },
            other => Err(PathError::NotAContainer {
                at: self.path.clone(),
                found: kind_name(other),
            }
            .into()),
        }
    }

    fn as_map_for(&self, op: &'static str) -> Result<&Map<String, Value>> {
        match self.value()? {
            Value::Object(m) => Ok(m),
            other => Err(self.expected(op, "mapping", other)),
        }
    }

    fn expected(&self, op: &'static str, want: &str, found: &Value) -> StateError {
        self.operand(op, format!("expected {want}, found {}", kind_name(found)))
    }

    fn operand(&self, op: &'static str, message: impl Into<String>) -> StateError {
        StateError::operand(op, &self.path, message)
    }
}

impl fmt::Debug for StateProxy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateProxy")
            .field("path", &self.path)
            .field("value", &self.value().ok())
            .finish()
    }
}
