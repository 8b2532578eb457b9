//! Folding a streamed AI message fragment into the stored message.
//!
//! Text fields grow with `append-text`, so a client following the operation
//! feed never sees a whole message re-sent. Lists of indexed parts, such as
//! `tool_call_chunks`, merge element-wise by their `index`. Token counters
//! in `usage_metadata` add up. After the fragments are merged, `tool_calls`
//! and `invalid_tool_calls` are rebuilt from the accumulated chunks.

use serde_json::{json, Map, Number, Value};
use stream_state_path::Path;

use crate::error::Result;
use crate::operation::Operation;
use crate::store::StateStore;

const CONTENT: &str = "content";
const TOOL_CALL_CHUNKS: &str = "tool_call_chunks";
const TOOL_CALLS: &str = "tool_calls";
const INVALID_TOOL_CALLS: &str = "invalid_tool_calls";
const USAGE_METADATA: &str = "usage_metadata";

// Strings under these keys name a part rather than stream it.
const IDENTITY_KEYS: [&str; 3] = ["id", "type", "index"];

/// Merges `chunk` into the message object stored at `at`.
pub(super) fn merge_chunk(store: &mut StateStore, at: &Path, chunk: Map<String, Value>) -> Result<()> {
    let mut chunks_changed = false;
    for (key, incoming) in chunk {
        if incoming.is_null() {
            continue;
        }
        let current = store.get(at)?.get(&key).cloned();
        let path = at.child(key.as_str());
        match key.as_str() {
            CONTENT => merge_content(store, &path, current, incoming)?,
            USAGE_METADATA => add_usage(store, &path, current, incoming)?,
            // Derived from `tool_call_chunks` below.
            TOOL_CALLS | INVALID_TOOL_CALLS => {}
            TOOL_CALL_CHUNKS => {
                chunks_changed = true;
                merge_value(store, &path, &key, current, incoming)?;
            }
            "additional_kwargs" | "response_metadata" => merge_value(store, &path, &key, current, incoming)?,
            _ if current.as_ref() == Some(&incoming) => {}
            _ => set_at(store, &path, incoming)?,
        }
    }
    if chunks_changed {
        rebuild_tool_calls(store, at)?;
    }
    Ok(())
}

fn set_at(store: &mut StateStore, path: &Path, value: Value) -> Result<()> {
    match path.split_parent() {
        Some((parent, key)) => store.proxy_at(Path::from(parent)).set(key, value),
        None => store.apply(vec![Operation::set(Path::root(), value)]),
    }
}

fn append_text(store: &mut StateStore, path: &Path, delta: String) -> Result<()> {
    if delta.is_empty() {
        return Ok(());
    }
    store.proxy_at(path.clone()).combine_in_place(delta)
}

fn merge_content(store: &mut StateStore, path: &Path, current: Option<Value>, incoming: Value) -> Result<()> {
    match (current, incoming) {
        (Some(Value::String(_)), Value::String(delta)) => append_text(store, path, delta),
        (Some(Value::Array(parts)), Value::Array(more)) => merge_list(store, path, parts, more),
        (Some(Value::Array(parts)), Value::String(delta)) => {
            if delta.is_empty() {
                return Ok(());
            }
            match parts.last() {
                Some(Value::String(_)) => append_text(store, &path.child(parts.len() - 1), delta),
                _ => store.proxy_at(path.clone()).append(delta),
            }
        }
        (Some(Value::String(text)), Value::Array(more)) => {
            let mut parts = Vec::with_capacity(more.len() + 1);
            if !text.is_empty() {
                parts.push(Value::String(text));
            }
            parts.extend(more);
            set_at(store, path, Value::Array(parts))
        }
        (_, incoming) => set_at(store, path, incoming),
    }
}

// Field-wise merge of nested chunk data. `key` is the name the value sits
// under, which decides whether two strings concatenate.
fn merge_value(store: &mut StateStore, path: &Path, key: &str, current: Option<Value>, incoming: Value) -> Result<()> {
    match (current, incoming) {
        (_, Value::Null) => Ok(()),
        (None | Some(Value::Null), incoming) => set_at(store, path, incoming),
        (Some(Value::String(text)), Value::String(delta)) => {
            if !IDENTITY_KEYS.contains(&key) {
                append_text(store, path, delta)
            } else if text == delta {
                Ok(())
            } else {
                set_at(store, path, Value::String(delta))
            }
        }
        (Some(Value::Object(fields)), Value::Object(more)) => {
            for (name, value) in more {
                let existing = fields.get(&name).cloned();
                merge_value(store, &path.child(name.as_str()), &name, existing, value)?;
            }
            Ok(())
        }
        (Some(Value::Array(items)), Value::Array(more)) => merge_list(store, path, items, more),
        (Some(existing), incoming) if existing == incoming => Ok(()),
        (Some(Value::Number(a)), Value::Number(b)) if key != "index" => set_at(store, path, add_numbers(&a, &b)),
        (Some(_), incoming) => set_at(store, path, incoming),
    }
}

// Elements carrying an `index` already present merge into that element;
// everything else is appended.
fn merge_list(store: &mut StateStore, path: &Path, current: Vec<Value>, incoming: Vec<Value>) -> Result<()> {
    let mut items = current;
    for item in incoming {
        let slot = item
            .get("index")
            .filter(|index| !index.is_null())
            .and_then(|index| items.iter().position(|existing| existing.get("index") == Some(index)));
        match (slot, item) {
            (Some(position), Value::Object(mut fields)) => {
                fields.remove("type");
                let element = path.child(position);
                let existing = items[position].clone();
                merge_value(store, &element, "", Some(existing), Value::Object(fields))?;
                items[position] = store.get(&element)?.clone();
            }
            (_, item) => {
                store.proxy_at(path.clone()).append(item.clone())?;
                items.push(item);
            }
        }
    }
    Ok(())
}

fn add_usage(store: &mut StateStore, path: &Path, current: Option<Value>, incoming: Value) -> Result<()> {
    match (current, incoming) {
        (_, Value::Null) => Ok(()),
        (Some(Value::Object(fields)), Value::Object(more)) => {
            for (name, value) in more {
                let existing = fields.get(&name).cloned();
                add_usage(store, &path.child(name.as_str()), existing, value)?;
            }
            Ok(())
        }
        (Some(Value::Number(a)), Value::Number(b)) => {
            if b.as_f64() == Some(0.0) {
                return Ok(());
            }
            set_at(store, path, add_numbers(&a, &b))
        }
        (_, incoming) => set_at(store, path, incoming),
    }
}

fn add_numbers(a: &Number, b: &Number) -> Value {
    if let Some(sum) = a.as_i64().zip(b.as_i64()).and_then(|(x, y)| x.checked_add(y)) {
        return Value::from(sum);
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Number::from_f64(x + y).map_or_else(|| Value::Number(b.clone()), Value::Number),
        _ => Value::Number(b.clone()),
    }
}

fn rebuild_tool_calls(store: &mut StateStore, at: &Path) -> Result<()> {
    let (valid, invalid) = match store.get(at)?.get(TOOL_CALL_CHUNKS) {
        Some(Value::Array(chunks)) => derive_tool_calls(chunks),
        _ => return Ok(()),
    };
    for (key, calls) in [(TOOL_CALLS, valid), (INVALID_TOOL_CALLS, invalid)] {
        let current = store.get(at)?.get(key);
        if current.and_then(Value::as_array) == Some(&calls) || (current.is_none() && calls.is_empty()) {
            continue;
        }
        store.proxy_at(at.clone()).set(key, Value::Array(calls))?;
    }
    Ok(())
}

fn derive_tool_calls(chunks: &[Value]) -> (Vec<Value>, Vec<Value>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for chunk in chunks {
        let name = chunk.get("name").cloned().unwrap_or(Value::Null);
        let id = chunk.get("id").cloned().unwrap_or(Value::Null);
        let raw = chunk.get("args").cloned().unwrap_or(Value::Null);
        let parsed = match raw.as_str() {
            None | Some("") => Some(Value::Object(Map::new())),
            Some(text) => parse_partial_json(text),
        };
        match parsed {
            Some(Value::Object(args)) => valid.push(json!({
                "name": name.as_str().unwrap_or_default(),
                "args": args,
                "id": id,
                "type": "tool_call",
            })),
            _ => invalid.push(json!({
                "name": name,
                "args": raw,
                "id": id,
                "error": null,
                "type": "invalid_tool_call",
            })),
        }
    }
    (valid, invalid)
}

/// Parses a JSON document that may be cut off mid-stream. Open strings are
/// closed, open containers are closed in order, and trailing characters are
/// dropped until the text parses. Mismatched brackets give `None`.
fn parse_partial_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let mut out = String::with_capacity(text.len() + 8);
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if c == '"' && !escaped {
                in_string = false;
            } else if c == '\n' && !escaped {
                out.push_str("\\n");
                continue;
            } else if c == '\\' {
                escaped = !escaped;
            } else {
                escaped = false;
            }
        } else {
            match c {
                '"' => {
                    in_string = true;
                    escaped = false;
                }
                '{' => closers.push('}'),
                '[' => closers.push(']'),
                '}' | ']' => {
                    if closers.last() != Some(&c) {
                        return None;
                    }
                    closers.pop();
                }
                _ => {}
            }
        }
        out.push(c);
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    let closing: String = closers.iter().rev().collect();
    while !out.is_empty() {
        if let Ok(value) = serde_json::from_str(&format!("{out}{closing}")) {
            return Some(value);
        }
        out.pop();
    }
    None
}
