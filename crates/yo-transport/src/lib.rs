//! Tool-call transport (C4): serializes a request, performs an HTTP POST
//! that can be cancelled instantly by SIGINT, and normalizes the response
//! down to a single tool-use record.

mod cancel;

pub use cancel::CancelGuard;

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use yo_model::{tool_definitions, ContentBlock, Message, ToolUse};

pub const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT_SECS: u64 = 30;

const MULTI_TOOL_CORRECTION: &str =
    "You provided multiple tool calls. Please respond with exactly one tool call.";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("could not parse response body: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{0}")]
    Protocol(String),

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

#[derive(Debug)]
pub enum CallOutcome {
    ToolUse(ToolUse),
    Cancelled,
}

enum SingleOutcome {
    Blocks(Vec<ContentBlock>),
    Cancelled,
}

pub struct Transport {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Transport {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("building the HTTP client with a fixed timeout cannot fail");
        Transport { client, api_key: api_key.into(), model: model.into() }
    }

    /// Drives one protocol turn: a request, possibly followed by exactly one
    /// "you gave me several tool calls" retry.
    pub async fn call(&self, system: &str, messages: &[Message]) -> Result<CallOutcome, TransportError> {
        let mut guard = CancelGuard::new().map_err(|e| {
            TransportError::UnexpectedShape(format!("installing SIGINT listener: {e}"))
        })?;

        match self.single_call(system, messages, &mut guard).await? {
            SingleOutcome::Cancelled => Ok(CallOutcome::Cancelled),
            SingleOutcome::Blocks(blocks) => match count_tool_uses(&blocks) {
                0 => Ok(CallOutcome::ToolUse(synthesize_chat(&blocks))),
                1 => Ok(CallOutcome::ToolUse(take_single_tool_use(blocks))),
                _ => self.retry_after_multiple_tool_uses(system, messages, blocks, &mut guard).await,
            },
        }
    }

    async fn retry_after_multiple_tool_uses(
        &self,
        system: &str,
        messages: &[Message],
        blocks: Vec<ContentBlock>,
        guard: &mut CancelGuard,
    ) -> Result<CallOutcome, TransportError> {
        let mut retry_messages = messages.to_vec();
        retry_messages.push(Message { role: yo_model::Role::Assistant, content: blocks });
        retry_messages.push(Message::user_text(MULTI_TOOL_CORRECTION));

        match self.single_call(system, &retry_messages, guard).await? {
            SingleOutcome::Cancelled => Ok(CallOutcome::Cancelled),
            SingleOutcome::Blocks(retry_blocks) => {
                // The retry path takes the first tool-use unconditionally;
                // if the model still produced none, fall back to the same
                // zero-tool-use synthesis used on the first attempt.
                Ok(CallOutcome::ToolUse(match first_tool_use(&retry_blocks) {
                    Some(tu) => tu,
                    None => synthesize_chat(&retry_blocks),
                }))
            }
        }
    }

    async fn single_call(
        &self,
        system: &str,
        messages: &[Message],
        guard: &mut CancelGuard,
    ) -> Result<SingleOutcome, TransportError> {
        let body = build_request_body(&self.model, system, messages);
        tracing::debug!(model = %self.model, messages = messages.len(), "sending request");

        let request = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();

        tokio::select! {
            biased;
            _ = guard.cancelled() => {
                tracing::info!("request cancelled by SIGINT");
                Ok(SingleOutcome::Cancelled)
            }
            result = request => {
                let response = result?;
                let status = response.status();
                let bytes = response.bytes().await?;
                tracing::debug!(status = status.as_u16(), bytes = bytes.len(), "received response");
                parse_response(status.as_u16(), status.is_success(), &bytes)
            }
        }
    }
}

fn build_request_body(model: &str, system: &str, messages: &[Message]) -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.input_schema }))
        .collect();

    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "system": system,
        "messages": messages,
        "tools": tools,
        "tool_choice": { "type": "any" },
    })
}

fn parse_response(status: u16, success: bool, bytes: &[u8]) -> Result<SingleOutcome, TransportError> {
    if bytes.is_empty() {
        return Err(TransportError::EmptyBody);
    }
    let json: Value = serde_json::from_slice(bytes).map_err(TransportError::Parse)?;

    if let Some(message) = json.get("error").and_then(|e| e.get("message")).and_then(|m| m.as_str()) {
        return Err(TransportError::Protocol(message.to_string()));
    }
    if !success {
        return Err(TransportError::HttpStatus(status));
    }

    let content = json
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| TransportError::UnexpectedShape("missing content array".to_string()))?;

    let blocks = content
        .iter()
        .cloned()
        .map(serde_json::from_value::<ContentBlock>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(TransportError::Parse)?;

    Ok(SingleOutcome::Blocks(blocks))
}

fn count_tool_uses(blocks: &[ContentBlock]) -> usize {
    blocks.iter().filter(|b| matches!(b, ContentBlock::ToolUse { .. })).count()
}

fn first_tool_use(blocks: &[ContentBlock]) -> Option<ToolUse> {
    blocks.iter().find_map(|b| match b {
        ContentBlock::ToolUse { id, name, input } => {
            Some(ToolUse { id: id.clone(), name: name.clone(), input: input.clone() })
        }
        _ => None,
    })
}

fn take_single_tool_use(blocks: Vec<ContentBlock>) -> ToolUse {
    blocks
        .into_iter()
        .find_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some(ToolUse { id, name, input }),
            _ => None,
        })
        .expect("caller already verified exactly one tool_use block is present")
}

fn synthesize_chat(blocks: &[ContentBlock]) -> ToolUse {
    let text = blocks
        .iter()
        .find_map(|b| match b {
            ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        })
        .unwrap_or_default();
    ToolUse::synthetic_chat(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ContentBlock {
        ContentBlock::Text { text: s.to_string() }
    }

    fn tool_use(id: &str, name: &str) -> ContentBlock {
        ContentBlock::ToolUse { id: id.into(), name: name.into(), input: json!({}) }
    }

    #[test]
    fn zero_tool_uses_synthesizes_chat_from_first_text_block() {
        let blocks = vec![text("hello there")];
        assert_eq!(count_tool_uses(&blocks), 0);
        let tu = synthesize_chat(&blocks);
        assert_eq!(tu.id, yo_model::SYNTHETIC_CHAT_TOOL_USE_ID);
        assert_eq!(tu.str_field("response"), Some("hello there"));
    }

    #[test]
    fn single_tool_use_is_taken_directly() {
        let blocks = vec![tool_use("tc_1", "command")];
        assert_eq!(count_tool_uses(&blocks), 1);
        let tu = take_single_tool_use(blocks);
        assert_eq!(tu.id, "tc_1");
        assert_eq!(tu.name, "command");
    }

    #[test]
    fn multiple_tool_uses_are_counted_for_retry_path() {
        let blocks = vec![tool_use("tc_1", "command"), tool_use("tc_2", "chat")];
        assert_eq!(count_tool_uses(&blocks), 2);
    }

    #[test]
    fn vendor_error_message_is_reported_verbatim() {
        let body = json!({ "type": "error", "error": { "type": "invalid_request_error", "message": "bad stuff" } });
        let err = parse_response(400, false, body.to_string().as_bytes()).unwrap_err();
        match err {
            TransportError::Protocol(msg) => assert_eq!(msg, "bad stuff"),
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn non_success_status_without_error_field_is_reported() {
        let body = json!({ "content": [] });
        let err = parse_response(500, false, body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, TransportError::HttpStatus(500)));
    }

    #[test]
    fn empty_body_is_its_own_error() {
        let err = parse_response(200, true, b"").unwrap_err();
        assert!(matches!(err, TransportError::EmptyBody));
    }

    #[test]
    fn unparseable_json_is_its_own_error() {
        let err = parse_response(200, true, b"{not json").unwrap_err();
        assert!(matches!(err, TransportError::Parse(_)));
    }

    #[test]
    fn successful_body_yields_content_blocks() {
        let body = json!({
            "content": [
                { "type": "tool_use", "id": "tc_1", "name": "command", "input": { "command": "ls" } }
            ]
        });
        let outcome = parse_response(200, true, body.to_string().as_bytes()).unwrap();
        match outcome {
            SingleOutcome::Blocks(blocks) => assert_eq!(blocks.len(), 1),
            SingleOutcome::Cancelled => panic!("did not expect cancellation"),
        }
    }

    #[test]
    fn request_body_forces_any_tool_choice() {
        let messages = vec![Message::user_text("hi")];
        let body = build_request_body("claude-sonnet-4-20250514", "sys", &messages);
        assert_eq!(body["tool_choice"]["type"], "any");
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert!(body["tools"].as_array().unwrap().len() == 4);
    }
}
