//! Path addressing for synchronized state trees.
//!
//! A state tree is a `serde_json::Value`. Locations inside it are addressed
//! by a [`Path`]: an ordered sequence of [`Key`]s where sequence indices are
//! carried as decimal strings, exactly as they travel on the wire.
//!
//! # Example
//!
//! ```
//! use stream_state_path::{path, resolve, PathError};
//! use serde_json::json;
//!
//! let doc = json!({"a": {"b": [10, 20]}});
//! assert_eq!(resolve(&doc, &path!["a", "b", 1]), Ok(&json!(20)));
//!
//! let err = resolve(&json!({"a": 1}), &path!["a", "b"]).unwrap_err();
//! assert!(matches!(err, PathError::NotAContainer { .. }));
//! ```

use serde_json::Value;
use thiserror::Error;

pub mod types;
pub use types::{Key, Path};

pub mod validate;
pub use validate::{validate_path, ValidationError, MAX_PATH_LENGTH};

/// Escapes a JSON Pointer path component.
///
/// ```
/// use stream_state_path::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// ```
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    // Order matters: ~ must be escaped before /
    component.replace('~', "~0").replace('/', "~1")
}

/// Format keys into a JSON Pointer string. The root formats as `""`.
pub fn format_pointer(path: &[Key]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(path.len() * 8);
    for component in path {
        out.push('/');
        out.push_str(&escape_component(component));
    }
    out
}

/// Check if a string is a canonical non-negative sequence index.
///
/// ```
/// use stream_state_path::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("123"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index("01"));
/// assert!(!is_valid_index("abc"));
/// ```
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    // First char can't be leading zero unless it's just "0"
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}

/// Short name of a value's kind, used in error messages and logs.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Why a path failed to resolve.
///
/// `at` is the prefix of the path that did resolve: the container that was
/// being indexed when resolution stopped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("key `{key}` not found in mapping at `{at}`")]
    MissingKey { at: Path, key: Key },
    #[error("index {key} out of range for sequence of length {len} at `{at}`")]
    IndexOutOfRange { at: Path, key: Key, len: usize },
    #[error("`{key}` is not a valid sequence index at `{at}`")]
    InvalidIndex { at: Path, key: Key },
    #[error("cannot index into {found} at `{at}`")]
    NotAContainer { at: Path, found: &'static str },
}

impl PathError {
    /// The resolved prefix at which resolution stopped.
    pub fn at(&self) -> &Path {
        match self {
            PathError::MissingKey { at, .. }
            | PathError::IndexOutOfRange { at, .. }
            | PathError::InvalidIndex { at, .. }
            | PathError::NotAContainer { at, .. } => at,
        }
    }
}

/// Looks up `key` in a single container.
pub fn step<'a>(container: &'a Value, at: &[Key], key: &Key) -> Result<&'a Value, PathError> {
    match container {
        Value::Object(map) => map.get(key.as_str()).ok_or_else(|| PathError::MissingKey {
            at: Path::from(at),
            key: key.clone(),
        }),
        Value::Array(arr) => {
            let idx = key.as_index().ok_or_else(|| PathError::InvalidIndex {
                at: Path::from(at),
                key: key.clone(),
            })?;
            arr.get(idx).ok_or_else(|| PathError::IndexOutOfRange {
                at: Path::from(at),
                key: key.clone(),
                len: arr.len(),
            })
        }
        other => Err(PathError::NotAContainer {
            at: Path::from(at),
            found: kind_name(other),
        }),
    }
}

/// Resolves `path` against `doc`, reporting exactly where resolution failed.
pub fn resolve<'a>(doc: &'a Value, path: &[Key]) -> Result<&'a Value, PathError> {
    let mut current = doc;
    for (depth, key) in path.iter().enumerate() {
        current = step(current, &path[..depth], key)?;
    }
    Ok(current)
}

/// Mutable counterpart of [`resolve`].
pub fn resolve_mut<'a>(doc: &'a mut Value, path: &[Key]) -> Result<&'a mut Value, PathError> {
    let mut current = doc;
    for (depth, key) in path.iter().enumerate() {
        current = match current {
            Value::Object(map) => {
                map.get_mut(key.as_str())
                    .ok_or_else(|| PathError::MissingKey {
                        at: Path::from(&path[..depth]),
                        key: key.clone(),
                    })?
            }
            Value::Array(arr) => {
                let len = arr.len();
                let idx = key.as_index().ok_or_else(|| PathError::InvalidIndex {
                    at: Path::from(&path[..depth]),
                    key: key.clone(),
                })?;
                arr.get_mut(idx).ok_or_else(|| PathError::IndexOutOfRange {
                    at: Path::from(&path[..depth]),
                    key: key.clone(),
                    len,
                })?
            }
            other => {
                return Err(PathError::NotAContainer {
                    at: Path::from(&path[..depth]),
                    found: kind_name(other),
                })
            }
        };
    }
    Ok(current)
}
