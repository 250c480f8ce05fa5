use serde_json::{json, Value};

use yo_model::{Exchange, ExchangeContent, Message, ToolName, ToolUse};

use crate::Memory;

/// How the current turn's query is appended after the replayed history.
pub enum Flavor {
    /// Just the user's text.
    Plain,
    /// Followed by an additional assistant tool-use/user tool-result pair
    /// carrying the already-executed `scrollback` or `docs` sub-request and
    /// its result text.
    WithResult { tool_use: ToolUse, result: String },
}

/// Reconstructs the turn-by-turn message log from memory plus the current
/// query, in the flavor the caller needs.
pub fn build_messages(memory: &Memory, current_query: &str, flavor: &Flavor) -> Vec<Message> {
    let mut messages = Vec::with_capacity(memory.len() * 3 + 2);

    for exchange in memory.iter() {
        messages.push(Message::user_text(&exchange.query));
        messages.push(Message::assistant_tool_use(
            &exchange.tool_use_id,
            exchange.tool_name().as_str(),
            reconstruct_input(exchange),
        ));
        messages.push(Message::user_tool_result(&exchange.tool_use_id, tool_result_text(exchange)));
    }

    messages.push(Message::user_text(current_query));

    if let Flavor::WithResult { tool_use, result } = flavor {
        messages.push(Message::assistant_tool_use(
            tool_use.id.clone(),
            tool_use.name.clone(),
            tool_use.input.clone(),
        ));
        messages.push(Message::user_tool_result(tool_use.id.clone(), result.clone()));
    }

    messages
}

fn reconstruct_input(exchange: &Exchange) -> Value {
    match &exchange.content {
        ExchangeContent::Command { command } => {
            let mut obj = json!({
                "command": command,
                "explanation": "(from history)",
            });
            if exchange.pending {
                obj["pending"] = Value::Bool(true);
            }
            obj
        }
        ExchangeContent::Chat { response } => json!({ "response": response }),
        ExchangeContent::Scrollback { lines } => json!({ "lines": lines }),
        ExchangeContent::Docs => json!({}),
    }
}

fn tool_result_text(exchange: &Exchange) -> &'static str {
    match exchange.tool_name() {
        ToolName::Command => {
            if exchange.executed {
                "User executed the command"
            } else {
                "User did not execute the command"
            }
        }
        ToolName::Chat | ToolName::Scrollback | ToolName::Docs => "Acknowledged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yo_model::{ContentBlock, Role};

    #[test]
    fn plain_flavor_appends_current_query_after_history() {
        let mut m = Memory::new();
        m.add(Exchange::chat("yo hi", "hello", "tc_1"), 10, 100_000);
        let msgs = build_messages(&m, "yo again", &Flavor::Plain);
        assert_eq!(msgs.len(), 4); // 3 for history + 1 for current query
        assert_eq!(content_text(&msgs[0]), "yo hi");
        assert_eq!(content_text(&msgs[3]), "yo again");
    }

    #[test]
    fn command_tool_result_depends_on_executed_flag() {
        let mut m = Memory::new();
        let mut unexecuted = Exchange::command("yo ls", "ls -la", "tc_1", false);
        unexecuted.executed = false;
        m.add(unexecuted, 10, 100_000);
        let msgs = build_messages(&m, "next", &Flavor::Plain);
        match &msgs[2].content[0] {
            ContentBlock::ToolResult { content, .. } => {
                assert_eq!(content, "User did not execute the command")
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn with_result_flavor_appends_sub_request_pair() {
        let m = Memory::new();
        let tu = ToolUse { id: "tc_9".into(), name: "scrollback".into(), input: json!({"lines": 50}) };
        let msgs = build_messages(
            &m,
            "yo why did that fail",
            &Flavor::WithResult { tool_use: tu, result: "ls\nno such file\n".into() },
        );
        // 1 current-query message + assistant tool-use + user tool-result
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, Role::User);
        match &msgs[1].content[0] {
            ContentBlock::ToolUse { name, .. } => assert_eq!(name, "scrollback"),
            other => panic!("expected tool_use, got {other:?}"),
        }
        match &msgs[2].content[0] {
            ContentBlock::ToolResult { content, .. } => assert_eq!(content, "ls\nno such file\n"),
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn reconstructed_command_input_carries_pending_only_when_true() {
        let e = Exchange::command("yo x", "echo hi", "tc_1", true);
        let v = reconstruct_input(&e);
        assert_eq!(v["pending"], true);
        let e2 = Exchange::command("yo x", "echo hi", "tc_1", false);
        let v2 = reconstruct_input(&e2);
        assert!(v2.get("pending").is_none());
    }

    fn content_text(m: &Message) -> &str {
        match &m.content[0] {
            ContentBlock::Text { text } => text,
            other => panic!("expected text block, got {other:?}"),
        }
    }
}
