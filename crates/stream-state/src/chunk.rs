//! Stream chunk kinds emitted by an assistant run.
//!
//! The state engine itself only produces `update-state` chunks; the other
//! kinds are listed so a run controller and its consumers share one type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operation::Operation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssistantStreamChunk {
    TextDelta {
        text_delta: String,
    },
    ToolCallBegin {
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallDelta {
        tool_call_id: String,
        args_text_delta: String,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<Value>,
        #[serde(default)]
        is_error: bool,
    },
    Data {
        data: Value,
    },
    Error {
        error: String,
    },
    UpdateState {
        operations: Vec<Operation>,
    },
}

impl AssistantStreamChunk {
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self::TextDelta {
            text_delta: text.into(),
        }
    }

    pub fn tool_call_begin(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::ToolCallBegin {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        }
    }

    pub fn tool_call_delta(tool_call_id: impl Into<String>, args: impl Into<String>) -> Self {
        Self::ToolCallDelta {
            tool_call_id: tool_call_id.into(),
            args_text_delta: args.into(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, result: Value) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            result,
            artifact: None,
            is_error: false,
        }
    }

    pub fn data(data: Value) -> Self {
        Self::Data { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn update_state(operations: Vec<Operation>) -> Self {
        Self::UpdateState { operations }
    }

    /// The wire name of the chunk type.
    pub fn chunk_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCallBegin { .. } => "tool-call-begin",
            Self::ToolCallDelta { .. } => "tool-call-delta",
            Self::ToolResult { .. } => "tool-result",
            Self::Data { .. } => "data",
            Self::Error { .. } => "error",
            Self::UpdateState { .. } => "update-state",
        }
    }

    /// The operation batch carried by an `update-state` chunk.
    pub fn operations(&self) -> Option<&[Operation]> {
        match self {
            Self::UpdateState { operations } => Some(operations),
            _ => None,
        }
    }
}
