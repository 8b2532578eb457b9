//! State operations: the wire vocabulary of tree mutations.
//!
//! Two operations exist. `set` replaces the value at a path, creating the
//! leaf if its parent exists. `append-text` concatenates a string onto the
//! string already at a path. On the wire an operation is
//! `{"type": "set" | "append-text", "path": ["a", "0"], "value": ...}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stream_state_path::Path;

use crate::error::Result;

pub const SET: &str = "set";
pub const APPEND_TEXT: &str = "append-text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    Set { path: Path, value: Value },
    AppendText { path: Path, value: String },
}

impl Operation {
    pub fn set(path: Path, value: impl Into<Value>) -> Self {
        Operation::Set {
            path,
            value: value.into(),
        }
    }

    pub fn append_text(path: Path, text: impl Into<String>) -> Self {
        Operation::AppendText {
            path,
            value: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Operation::Set { path, .. } | Operation::AppendText { path, .. } => path,
        }
    }

    /// The wire name of the operation type.
    pub fn op_type(&self) -> &'static str {
        match self {
            Operation::Set { .. } => SET,
            Operation::AppendText { .. } => APPEND_TEXT,
        }
    }

    pub fn is_append_text(&self) -> bool {
        matches!(self, Operation::AppendText { .. })
    }
}

/// Serialize an operation to its wire JSON.
pub fn to_json(op: &Operation) -> Value {
    match op {
        Operation::Set { path, value } => serde_json::json!({
            "type": SET,
            "path": path,
            "value": value,
        }),
        Operation::AppendText { path, value } => serde_json::json!({
            "type": APPEND_TEXT,
            "path": path,
            "value": value,
        }),
    }
}

/// Decode an operation from wire JSON. Integer path keys are accepted and
/// normalized to decimal strings.
pub fn from_json(value: &Value) -> Result<Operation> {
    Ok(Operation::deserialize(value)?)
}

/// Decode a JSON array of operations.
pub fn from_json_batch(value: &Value) -> Result<Vec<Operation>> {
    Ok(Vec::<Operation>::deserialize(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stream_state_path::path;

    #[test]
    fn test_set_wire_shape() {
        let op = Operation::set(path!["items", 0], json!({"a": 1}));
        assert_eq!(
            to_json(&op),
            json!({"type": "set", "path": ["items", "0"], "value": {"a": 1}})
        );
        assert_eq!(serde_json::to_value(&op).unwrap(), to_json(&op));
    }

    #[test]
    fn test_append_text_wire_shape() {
        let op = Operation::append_text(path!["user", "name"], "ice");
        assert_eq!(
            serde_json::to_string(&op).unwrap(),
            r#"{"type":"append-text","path":["user","name"],"value":"ice"}"#
        );
    }

    #[test]
    fn test_from_json_normalizes_integer_keys() {
        let op = from_json(&json!({"type": "set", "path": ["items", 3], "value": null})).unwrap();
        assert_eq!(op, Operation::set(path!["items", "3"], Value::Null));
    }

    #[test]
    fn test_from_json_rejects_unknown_type() {
        assert!(from_json(&json!({"type": "remove", "path": ["a"]})).is_err());
    }

    #[test]
    fn test_from_json_rejects_non_string_append() {
        assert!(from_json(&json!({"type": "append-text", "path": ["a"], "value": 5})).is_err());
    }

    #[test]
    fn test_batch_decode() {
        let ops = from_json_batch(&json!([
            {"type": "set", "path": ["user"], "value": {}},
            {"type": "append-text", "path": ["user", "name"], "value": "x"}
        ]))
        .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].op_type(), APPEND_TEXT);
    }
}
