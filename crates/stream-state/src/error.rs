//! Error types for state reads, operation batches, and proxy mutations.

use stream_state_path::{Key, Path, PathError, ValidationError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StateError>;

/// Coarse classification of a [`StateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A read addressed a nonexistent or non-indexable location.
    Path,
    /// The store refused a batch.
    InvalidOperation,
    /// The operand does not fit the kind of the current value.
    OperandType,
    /// The mutation cannot be expressed as minimal operations.
    NotSupported,
    /// Operation or chunk (de)serialization failed.
    Codec,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("operation {index} (`{op_type}` at `{path}`) rejected: {reason}")]
    InvalidOperation {
        /// Position of the failing operation inside its batch.
        index: usize,
        op_type: &'static str,
        path: Path,
        reason: RejectReason,
    },

    #[error("invalid operand for `{op}` at `{path}`: {message}")]
    OperandType {
        op: &'static str,
        path: Path,
        message: String,
    },

    #[error("`{method}` is not supported on state proxies: {hint}")]
    NotSupported {
        method: &'static str,
        hint: &'static str,
    },

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StateError::Path(_) => ErrorKind::Path,
            StateError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            StateError::OperandType { .. } => ErrorKind::OperandType,
            StateError::NotSupported { .. } => ErrorKind::NotSupported,
            StateError::Codec(_) => ErrorKind::Codec,
        }
    }

    pub(crate) fn operand(op: &'static str, path: &Path, message: impl Into<String>) -> Self {
        StateError::OperandType {
            op,
            path: path.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn not_supported(method: &'static str, hint: &'static str) -> Self {
        StateError::NotSupported { method, hint }
    }
}

/// Why the store refused an operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("{0}")]
    Unresolved(#[from] PathError),
    #[error("target is {found}, not a string")]
    NotAString { found: &'static str },
    #[error("parent is {found}, not a mapping or sequence")]
    ParentNotContainer { found: &'static str },
    #[error("`{key}` is not a valid sequence index")]
    InvalidIndex { key: Key },
    #[error("index {index} is past the end of a sequence of length {len}")]
    IndexPastEnd { index: usize, len: usize },
    #[error("root must be a mapping, got {found}")]
    RootNotMapping { found: &'static str },
    #[error("{0}")]
    TooDeep(#[from] ValidationError),
}
