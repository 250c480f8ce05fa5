//! Anthropic Messages API wire types: the subset of the protocol the
//! transport and message builder actually exercise (non-streaming, forced
//! single tool-use per turn).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SCROLLBACK_MIN_LINES: u32 = 1;
pub const SCROLLBACK_MAX_LINES: u32 = 1000;
pub const SCROLLBACK_DEFAULT_LINES: u32 = 50;

/// `tool_use_id` assigned to a `chat` tool-use synthesized from a plain text
/// reply (the model emitted zero tool-use blocks).
pub const SYNTHETIC_CHAT_TOOL_USE_ID: &str = "synthetic_chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content. Serializes/deserializes to the exact shape
/// the Anthropic API expects on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message { role: Role::User, content: vec![ContentBlock::Text { text: text.into() }] }
    }

    pub fn assistant_tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Message {
            role: Role::Assistant,
            content: vec![ContentBlock::ToolUse { id: id.into(), name: name.into(), input }],
        }
    }

    pub fn user_tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
            }],
        }
    }
}

/// A single normalized tool-use returned by the transport: exactly the
/// information the control loop needs, independent of how many raw content
/// blocks the API response happened to contain.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolUse {
    pub fn synthetic_chat(response: impl Into<String>) -> Self {
        ToolUse {
            id: SYNTHETIC_CHAT_TOOL_USE_ID.to_string(),
            name: "chat".to_string(),
            input: json!({ "response": response.into() }),
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.input.get(key).and_then(Value::as_bool)
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.input.get(key).and_then(Value::as_u64)
    }
}

/// A tool schema entry as sent in the request's `tools` array.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// The four fixed tool schemas described in the stable wire surface.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "command",
            description: "Suggest a shell command for the user to review and run.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" },
                    "explanation": { "type": "string" },
                    "pending": { "type": "boolean" },
                },
                "required": ["command", "explanation"],
            }),
        },
        ToolDefinition {
            name: "chat",
            description: "Reply with plain text; no command is being suggested.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "response": { "type": "string" },
                },
                "required": ["response"],
            }),
        },
        ToolDefinition {
            name: "scrollback",
            description: "Request recent terminal scrollback output.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "lines": { "type": "integer" },
                },
                "required": ["lines"],
            }),
        },
        ToolDefinition {
            name: "docs",
            description: "Request product documentation text.",
            input_schema: json!({
                "type": "object",
                "properties": {},
            }),
        },
    ]
}

/// Clamps a requested scrollback line count to `[1, 1000]`, defaulting to 50
/// when absent or non-positive.
pub fn clamp_scrollback_lines(requested: Option<i64>) -> u32 {
    match requested {
        None => SCROLLBACK_DEFAULT_LINES,
        Some(n) if n < SCROLLBACK_MIN_LINES as i64 => SCROLLBACK_DEFAULT_LINES,
        Some(n) => (n as u64).min(SCROLLBACK_MAX_LINES as u64) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_block_text_round_trips() {
        let b = ContentBlock::Text { text: "hi".into() };
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["type"], "text");
        assert_eq!(v["text"], "hi");
        let back: ContentBlock = serde_json::from_value(v).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn content_block_tool_use_round_trips() {
        let b = ContentBlock::ToolUse {
            id: "tc_1".into(),
            name: "command".into(),
            input: json!({"command": "ls"}),
        };
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["type"], "tool_use");
        let back: ContentBlock = serde_json::from_value(v).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn clamp_scrollback_lines_boundaries() {
        assert_eq!(clamp_scrollback_lines(None), 50);
        assert_eq!(clamp_scrollback_lines(Some(0)), 50);
        assert_eq!(clamp_scrollback_lines(Some(-5)), 50);
        assert_eq!(clamp_scrollback_lines(Some(1)), 1);
        assert_eq!(clamp_scrollback_lines(Some(5000)), 1000);
        assert_eq!(clamp_scrollback_lines(Some(200)), 200);
    }

    #[test]
    fn tool_definitions_cover_the_stable_surface() {
        let names: Vec<&str> = tool_definitions().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["command", "chat", "scrollback", "docs"]);
    }

    #[test]
    fn synthetic_chat_uses_fixed_sentinel_id() {
        let tu = ToolUse::synthetic_chat("hello");
        assert_eq!(tu.id, SYNTHETIC_CHAT_TOOL_USE_ID);
        assert_eq!(tu.str_field("response"), Some("hello"));
    }
}
