//! Depth limits for paths.

use thiserror::Error;

use crate::Key;

/// Default maximum path depth.
pub const MAX_PATH_LENGTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("path depth {depth} exceeds limit {limit}")]
    PathTooLong { depth: usize, limit: usize },
}

/// Rejects paths deeper than `limit`.
///
/// ```
/// use stream_state_path::{path, validate_path};
///
/// validate_path(&path!["a", "b"], 2).unwrap();
/// validate_path(&path!["a", "b", "c"], 2).unwrap_err();
/// ```
pub fn validate_path(path: &[Key], limit: usize) -> Result<(), ValidationError> {
    if path.len() > limit {
        return Err(ValidationError::PathTooLong {
            depth: path.len(),
            limit,
        });
    }
    Ok(())
}
