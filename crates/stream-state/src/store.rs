//! The canonical state tree of a run.
//!
//! A [`StateStore`] owns one tree, answers path-addressed reads against it,
//! and is the only place operations are applied. A batch is applied
//! all-or-nothing: if any operation is invalid, every operation of the
//! batch that was already applied is rolled back and nothing is forwarded.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use stream_state_path::{kind_name, resolve, resolve_mut, validate_path, Key, Path};

use crate::error::{RejectReason, Result, StateError};
use crate::operation::Operation;
use crate::options::StoreOptions;
use crate::proxy::StateProxy;
use crate::sink::OperationSink;

/// How to reverse one applied operation.
enum Undo {
    /// Put `previous` back at `path` (an overwritten value, or the old root).
    Restore { path: Path, previous: Value },
    /// Remove a key that the operation inserted into a mapping.
    RemoveKey { parent: Path, key: Key },
    /// Drop the element the operation pushed onto a sequence.
    Pop { parent: Path },
    /// Cut a string back to its length before an `append-text`.
    Truncate { path: Path, len: usize },
}

pub struct StateStore {
    state: Value,
    options: StoreOptions,
    log: Vec<Operation>,
    next_sink_id: u64,
    sinks: BTreeMap<u64, Box<dyn OperationSink>>,
}

impl StateStore {
    /// A store whose root is an empty mapping.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            state: Value::Object(Map::new()),
            options,
            log: Vec::new(),
            next_sink_id: 1,
            sinks: BTreeMap::new(),
        }
    }

    /// Rebuilds a store by replaying an operation log against an empty root.
    pub fn from_operations(operations: Vec<Operation>, options: StoreOptions) -> Result<Self> {
        let mut store = Self::with_options(options);
        store.apply(operations)?;
        Ok(store)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// The whole canonical tree.
    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn into_state(self) -> Value {
        self.state
    }

    /// Every operation applied so far, in order. Empty when
    /// `record_log` is off.
    pub fn log(&self) -> &[Operation] {
        &self.log
    }

    /// Resolves `path` against the live tree.
    pub fn get(&self, path: &[Key]) -> Result<&Value> {
        Ok(resolve(&self.state, path)?)
    }

    /// A proxy over the root mapping.
    pub fn root(&mut self) -> StateProxy<'_> {
        StateProxy::new(self, Path::root())
    }

    /// A proxy bound to `path`. The path is resolved lazily, on each access.
    pub fn proxy_at(&mut self, path: Path) -> StateProxy<'_> {
        StateProxy::new(self, path)
    }

    /// Registers a sink that receives every future batch. Returns an id for
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<S>(&mut self, sink: S) -> u64
    where
        S: OperationSink + 'static,
    {
        let id = self.next_sink_id;
        self.next_sink_id = self.next_sink_id.saturating_add(1);
        self.sinks.insert(id, Box::new(sink));
        id
    }

    pub fn unsubscribe(&mut self, sink_id: u64) -> bool {
        self.sinks.remove(&sink_id).is_some()
    }

    /// Applies `operations` in order, then forwards the batch to every sink.
    ///
    /// On the first invalid operation the tree is restored to exactly its
    /// state before the call, nothing is forwarded, and the error names the
    /// failing operation. An empty batch is a no-op.
    pub fn apply(&mut self, operations: Vec<Operation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }

        let mut undo = Vec::with_capacity(operations.len());
        for (index, op) in operations.iter().enumerate() {
            match self.apply_one(op) {
                Ok(step) => {
                    tracing::trace!(index, op_type = op.op_type(), path = %op.path(), "applied state operation");
                    undo.push(step);
                }
                Err(reason) => {
                    self.rollback(undo);
                    tracing::debug!(
                        index,
                        op_type = op.op_type(),
                        path = %op.path(),
                        reason = %reason,
                        batch_len = operations.len(),
                        "rejected state batch"
                    );
                    return Err(StateError::InvalidOperation {
                        index,
                        op_type: op.op_type(),
                        path: op.path().clone(),
                        reason,
                    });
                }
            }
        }

        for sink in self.sinks.values_mut() {
            sink.forward(&operations);
        }
        if self.options.record_log {
            self.log.extend(operations.iter().cloned());
        }
        tracing::debug!(
            operations = operations.len(),
            log_len = self.log.len(),
            sinks = self.sinks.len(),
            "applied state batch"
        );
        Ok(())
    }

    fn apply_one(&mut self, op: &Operation) -> std::result::Result<Undo, RejectReason> {
        validate_path(op.path(), self.options.max_path_depth)?;
        match op {
            Operation::Set { path, value } => self.apply_set(path, value),
            Operation::AppendText { path, value } => {
                match resolve_mut(&mut self.state, path)? {
                    Value::String(s) => {
                        let len = s.len();
                        s.push_str(value);
                        Ok(Undo::Truncate {
                            path: path.clone(),
                            len,
                        })
                    }
                    other => Err(RejectReason::NotAString {
                        found: kind_name(other),
                    }),
                }
            }
        }
    }

    fn apply_set(&mut self, path: &Path, value: &Value) -> std::result::Result<Undo, RejectReason> {
        let Some((parent, key)) = path.split_parent() else {
            if self.options.require_object_root && !value.is_object() {
                return Err(RejectReason::RootNotMapping {
                    found: kind_name(value),
                });
            }
            let previous = std::mem::replace(&mut self.state, value.clone());
            return Ok(Undo::Restore {
                path: Path::root(),
                previous,
            });
        };

        match resolve_mut(&mut self.state, parent)? {
            Value::Object(map) => match map.insert(key.to_string(), value.clone()) {
                Some(previous) => Ok(Undo::Restore {
                    path: path.clone(),
                    previous,
                }),
                None => Ok(Undo::RemoveKey {
                    parent: Path::from(parent),
                    key: key.clone(),
                }),
            },
            Value::Array(arr) => {
                let index = key
                    .as_index()
                    .ok_or_else(|| RejectReason::InvalidIndex { key: key.clone() })?;
                let len = arr.len();
                if index < len {
                    let previous = std::mem::replace(&mut arr[index], value.clone());
                    Ok(Undo::Restore {
                        path: path.clone(),
                        previous,
                    })
                } else if index == len {
                    arr.push(value.clone());
                    Ok(Undo::Pop {
                        parent: Path::from(parent),
                    })
                } else {
                    Err(RejectReason::IndexPastEnd { index, len })
                }
            }
            other => Err(RejectReason::ParentNotContainer {
                found: kind_name(other),
            }),
        }
    }

    // Undo entries are replayed newest first, so every location they touch
    // exists again by the time it is reached.
    fn rollback(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Restore { path, previous } => {
                    if path.is_empty() {
                        self.state = previous;
                    } else if let Ok(slot) = resolve_mut(&mut self.state, &path) {
                        *slot = previous;
                    }
                }
                Undo::RemoveKey { parent, key } => {
                    if let Ok(Value::Object(map)) = resolve_mut(&mut self.state, &parent) {
                        map.remove(key.as_str());
                    }
                }
                Undo::Pop { parent } => {
                    if let Ok(Value::Array(arr)) = resolve_mut(&mut self.state, &parent) {
                        arr.pop();
                    }
                }
                Undo::Truncate { path, len } => {
                    if let Ok(Value::String(s)) = resolve_mut(&mut self.state, &path) {
                        s.truncate(len);
                    }
                }
            }
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("log_len", &self.log.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Replays `operations` in order against an empty root and returns the tree.
pub fn replay<'a, I>(operations: I) -> Result<Value>
where
    I: IntoIterator<Item = &'a Operation>,
{
    let options = StoreOptions {
        record_log: false,
        ..StoreOptions::default()
    };
    let store = StateStore::from_operations(operations.into_iter().cloned().collect(), options)?;
    Ok(store.into_state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use stream_state_path::{path, PathError};

    use crate::error::ErrorKind;

    fn store_with(state: Value) -> StateStore {
        let mut store = StateStore::new();
        store.apply(vec![Operation::set(Path::root(), state)]).unwrap();
        store
    }

    #[test]
    fn test_get_through_scalar_fails() {
        let store = store_with(json!({"a": 1}));
        let err = store.get(&path!["a", "b"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
        assert!(matches!(
            err,
            StateError::Path(PathError::NotAContainer { found: "number", .. })
        ));
    }

    #[test]
    fn test_get_nested() {
        let store = store_with(json!({"a": {"b": 2}}));
        assert_eq!(store.get(&path!["a", "b"]).unwrap(), &json!(2));
        assert_eq!(store.get(&[]).unwrap(), &json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_set_creates_leaf_under_existing_parent() {
        let mut store = StateStore::new();
        store
            .apply(vec![
                Operation::set(path!["user"], json!({})),
                Operation::set(path!["user", "name"], "Al"),
            ])
            .unwrap();
        assert_eq!(store.state(), &json!({"user": {"name": "Al"}}));
    }

    #[test]
    fn test_set_requires_parent() {
        let mut store = StateStore::new();
        let err = store
            .apply(vec![Operation::set(path!["missing", "name"], "x")])
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                index: 0,
                reason: RejectReason::Unresolved(PathError::MissingKey { .. }),
                ..
            }
        ));
    }

    #[test]
    fn test_set_sequence_indices() {
        let mut store = store_with(json!({"items": ["a"]}));
        store
            .apply(vec![
                Operation::set(path!["items", 0], "A"),
                Operation::set(path!["items", 1], "b"),
            ])
            .unwrap();
        assert_eq!(store.state(), &json!({"items": ["A", "b"]}));

        let err = store
            .apply(vec![Operation::set(path!["items", 5], "z")])
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                reason: RejectReason::IndexPastEnd { index: 5, len: 2 },
                ..
            }
        ));

        let err = store
            .apply(vec![Operation::set(path!["items", "x"], "z")])
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                reason: RejectReason::InvalidIndex { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_set_under_scalar_parent_fails() {
        let mut store = store_with(json!({"n": 1}));
        let err = store.apply(vec![Operation::set(path!["n", "x"], 1)]).unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                reason: RejectReason::ParentNotContainer { found: "number" },
                ..
            }
        ));
    }

    #[test]
    fn test_append_text() {
        let mut store = store_with(json!({"name": "Al"}));
        store
            .apply(vec![Operation::append_text(path!["name"], "ice")])
            .unwrap();
        assert_eq!(store.state(), &json!({"name": "Alice"}));
    }

    #[test]
    fn test_append_text_requires_string() {
        let mut store = store_with(json!({"n": 1}));
        let err = store
            .apply(vec![Operation::append_text(path!["n"], "x")])
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                reason: RejectReason::NotAString { found: "number" },
                ..
            }
        ));

        let err = store
            .apply(vec![Operation::append_text(path!["absent"], "x")])
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                reason: RejectReason::Unresolved(_),
                ..
            }
        ));
    }

    #[test]
    fn test_root_must_be_mapping() {
        let mut store = StateStore::new();
        let err = store
            .apply(vec![Operation::set(Path::root(), json!([1]))])
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                reason: RejectReason::RootNotMapping { found: "sequence" },
                ..
            }
        ));

        let mut relaxed = StateStore::with_options(StoreOptions {
            require_object_root: false,
            ..StoreOptions::default()
        });
        relaxed
            .apply(vec![Operation::set(Path::root(), json!([1]))])
            .unwrap();
        assert_eq!(relaxed.state(), &json!([1]));
    }

    #[test]
    fn test_path_depth_limit() {
        let mut store = StateStore::with_options(StoreOptions {
            max_path_depth: 1,
            ..StoreOptions::default()
        });
        store.apply(vec![Operation::set(path!["a"], json!({}))]).unwrap();
        let err = store
            .apply(vec![Operation::set(path!["a", "b"], 1)])
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidOperation {
                reason: RejectReason::TooDeep(_),
                ..
            }
        ));
    }

    #[test]
    fn test_failed_batch_rolls_back_everything() {
        let mut store = store_with(json!({"title": "Hi", "items": ["a"], "meta": {"k": 1}}));
        let before = store.state().clone();
        let log_len = store.log().len();

        let err = store
            .apply(vec![
                Operation::append_text(path!["title"], " there"),
                Operation::set(path!["items", 1], "b"),
                Operation::set(path!["meta", "k"], 2),
                Operation::set(path!["meta", "new"], true),
                Operation::set(path!["title"], json!({"replaced": true})),
                Operation::append_text(path!["meta", "k"], "boom"),
            ])
            .unwrap_err();

        assert!(matches!(err, StateError::InvalidOperation { index: 5, .. }));
        assert_eq!(store.state(), &before);
        assert_eq!(
            serde_json::to_string(store.state()).unwrap(),
            serde_json::to_string(&before).unwrap()
        );
        assert_eq!(store.log().len(), log_len);
    }

    #[test]
    fn test_failed_root_replacement_rolls_back() {
        let mut store = store_with(json!({"a": 1}));
        let err = store
            .apply(vec![
                Operation::set(Path::root(), json!({"b": 2})),
                Operation::set(path!["a", "x"], 1),
            ])
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidOperation { index: 1, .. }));
        assert_eq!(store.state(), &json!({"a": 1}));
    }

    #[test]
    fn test_sinks_receive_whole_batches_in_order() {
        let seen: Arc<Mutex<Vec<Vec<Operation>>>> = Arc::default();
        let mut store = StateStore::new();
        let sink_seen = Arc::clone(&seen);
        let id = store.subscribe(move |ops: &[Operation]| {
            sink_seen.lock().unwrap().push(ops.to_vec());
        });

        let first = vec![
            Operation::set(path!["a"], json!("x")),
            Operation::append_text(path!["a"], "y"),
        ];
        store.apply(first.clone()).unwrap();
        store.apply(Vec::new()).unwrap();
        assert!(store.apply(vec![Operation::append_text(path!["zz"], "q")]).is_err());
        store.apply(vec![Operation::set(path!["b"], 1)]).unwrap();

        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0], first);
            assert_eq!(seen[1], vec![Operation::set(path!["b"], 1)]);
        }

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.apply(vec![Operation::set(path!["c"], 1)]).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_log_records_unless_disabled() {
        let mut store = StateStore::new();
        store.apply(vec![Operation::set(path!["a"], 1)]).unwrap();
        assert_eq!(store.log(), &[Operation::set(path!["a"], 1)]);

        let mut quiet = StateStore::with_options(StoreOptions {
            record_log: false,
            ..StoreOptions::default()
        });
        quiet.apply(vec![Operation::set(path!["a"], 1)]).unwrap();
        assert!(quiet.log().is_empty());
    }

    #[test]
    fn test_replay_rebuilds_tree() {
        let mut store = StateStore::new();
        store
            .apply(vec![
                Operation::set(path!["list"], json!([])),
                Operation::set(path!["list", 0], "a"),
                Operation::set(path!["s"], ""),
            ])
            .unwrap();
        store.apply(vec![Operation::append_text(path!["s"], "abc")]).unwrap();
        assert_eq!(&replay(store.log()).unwrap(), store.state());
    }
}
