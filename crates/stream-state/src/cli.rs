//! Core logic behind the `state-replay` binary.
//!
//! Input is newline-delimited chunk JSON, as a consumer would receive it.
//! Every `update-state` chunk is applied to a fresh store in order; other
//! chunk kinds are skipped. Blank lines are ignored.

use serde_json::Value;
use thiserror::Error;

use crate::chunk::AssistantStreamChunk;
use crate::error::StateError;
use crate::options::StoreOptions;
use crate::store::StateStore;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: {source}")]
    Apply {
        line: usize,
        #[source]
        source: StateError,
    },
    #[error("cannot encode state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid options: {0}")]
    Options(#[from] toml::de::Error),
}

// ── state-replay ──────────────────────────────────────────────────────────

/// Parses an options file body.
pub fn load_options(source: &str) -> Result<StoreOptions, CliError> {
    Ok(StoreOptions::from_toml_str(source)?)
}

/// Replays the `update-state` chunks found in `input` and returns the
/// resulting state tree.
pub fn replay_chunks(input: &str, options: StoreOptions) -> Result<Value, CliError> {
    let mut store = StateStore::with_options(options);
    let mut skipped = 0usize;
    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let chunk: AssistantStreamChunk =
            serde_json::from_str(raw).map_err(|source| CliError::Decode { line, source })?;
        match chunk {
            AssistantStreamChunk::UpdateState { operations } => store
                .apply(operations)
                .map_err(|source| CliError::Apply { line, source })?,
            _ => skipped += 1,
        }
    }
    tracing::debug!(
        applied = store.log().len(),
        skipped_chunks = skipped,
        "replayed chunk stream"
    );
    Ok(store.into_state())
}
