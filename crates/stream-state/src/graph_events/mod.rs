//! Maps an orchestration-graph event feed onto state mutations.
//!
//! Two event kinds are understood. `messages` events carry one message,
//! possibly a streamed fragment of an AI message, which is merged into the
//! top-level `messages` sequence. `updates` events carry per-node channel
//! values, each of which replaces a top-level key.

mod merge;

use serde_json::{Map, Value};
use stream_state_path::{kind_name, Path};

use crate::error::{Result, StateError};
use crate::store::StateStore;

pub const MESSAGES: &str = "messages";
pub const UPDATES: &str = "updates";

const AI_MESSAGE_CHUNK: &str = "AIMessageChunk";
const AI: &str = "ai";

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// One message object.
    Messages(Map<String, Value>),
    /// Node name to that node's channel values.
    Updates(Map<String, Value>),
}

impl GraphEvent {
    /// Builds an event from its kind name and raw payload. A `messages`
    /// payload is either the message itself or a `[message, metadata]`
    /// pair. Unknown kinds yield `None`.
    pub fn from_parts(kind: &str, payload: Value) -> Result<Option<Self>> {
        match kind {
            MESSAGES => {
                let message = match payload {
                    Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
                    other => other,
                };
                match message {
                    Value::Object(message) => Ok(Some(GraphEvent::Messages(message))),
                    other => Err(malformed(MESSAGES, "a message object", &other)),
                }
            }
            UPDATES => match payload {
                Value::Object(nodes) => Ok(Some(GraphEvent::Updates(nodes))),
                other => Err(malformed(UPDATES, "a mapping of node updates", &other)),
            },
            _ => Ok(None),
        }
    }
}

fn malformed(kind: &'static str, want: &str, found: &Value) -> StateError {
    StateError::operand(
        kind,
        &Path::root(),
        format!("expected {want}, found {}", kind_name(found)),
    )
}

/// Applies one graph event to `store`.
pub fn append_graph_event(store: &mut StateStore, event: GraphEvent) -> Result<()> {
    match event {
        GraphEvent::Messages(message) => append_message(store, message),
        GraphEvent::Updates(nodes) => {
            let mut root = store.root();
            for (node, channels) in nodes {
                let Value::Object(channels) = channels else {
                    tracing::trace!(node = %node, "skipping non-mapping node update");
                    continue;
                };
                for (channel, value) in channels {
                    // The message list is owned by `messages` events.
                    if channel == MESSAGES {
                        continue;
                    }
                    root.set(channel, value)?;
                }
            }
            Ok(())
        }
    }
}

fn append_message(store: &mut StateStore, mut message: Map<String, Value>) -> Result<()> {
    let is_chunk = message.get("type").and_then(Value::as_str) == Some(AI_MESSAGE_CHUNK);
    if is_chunk {
        message.insert("type".to_owned(), Value::String(AI.to_owned()));
    }

    let mut root = store.root();
    if root.get(MESSAGES)?.is_none() {
        root.set(MESSAGES, Value::Array(Vec::new()))?;
    }
    let mut messages = root.at(MESSAGES)?.into_seq()?;

    // Messages without an id never match an earlier one, so each is appended.
    let existing = match message.get("id") {
        Some(id) if !id.is_null() => messages
            .view()?
            .iter()
            .position(|m| m.get("id") == Some(id)),
        _ => None,
    };

    match existing {
        None => messages.push(Value::Object(message)),
        Some(index) => {
            let mergeable = is_chunk && matches!(messages.get(index)?, Some(Value::Object(_)));
            if !mergeable {
                return messages.set(index, Value::Object(message));
            }
            let at = messages.into_inner().path().child(index);
            tracing::debug!(index, "merging message chunk");
            merge::merge_chunk(store, &at, message)
        }
    }
}
