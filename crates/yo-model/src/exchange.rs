use serde::{Deserialize, Serialize};

/// The four tools the model may invoke. Stable wire surface: these names
/// appear verbatim in the Anthropic tool schema and in `tool_use` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    Command,
    Chat,
    Scrollback,
    Docs,
}

impl ToolName {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Command => "command",
            ToolName::Chat => "chat",
            ToolName::Scrollback => "scrollback",
            ToolName::Docs => "docs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "command" => Some(ToolName::Command),
            "chat" => Some(ToolName::Chat),
            "scrollback" => Some(ToolName::Scrollback),
            "docs" => Some(ToolName::Docs),
            _ => None,
        }
    }
}

/// The reconstructed input payload of a stored exchange, one variant per
/// `ToolName`. `Scrollback`/`Docs` exchanges never reach final dispatch (they
/// are sub-requests resolved within a single turn) but are represented here
/// because the message builder still needs to replay *historical* sub-request
/// round-trips faithfully when it reconstructs prior turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ExchangeContent {
    Command { command: String },
    Chat { response: String },
    Scrollback { lines: u32 },
    Docs,
}

impl ExchangeContent {
    pub fn tool_name(&self) -> ToolName {
        match self {
            ExchangeContent::Command { .. } => ToolName::Command,
            ExchangeContent::Chat { .. } => ToolName::Chat,
            ExchangeContent::Scrollback { .. } => ToolName::Scrollback,
            ExchangeContent::Docs => ToolName::Docs,
        }
    }

    /// Character length of the response-ish payload, used by the token
    /// estimate (query length is counted separately by the caller).
    pub fn response_len(&self) -> usize {
        match self {
            ExchangeContent::Command { command } => command.len(),
            ExchangeContent::Chat { response } => response.len(),
            ExchangeContent::Scrollback { .. } | ExchangeContent::Docs => 0,
        }
    }
}

/// One stored round of (user query, LLM tool-use, execution outcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub query: String,
    pub content: ExchangeContent,
    pub tool_use_id: String,
    /// True once the user committed the line (`chat` exchanges start true:
    /// a chat reply is considered consumed on display).
    pub executed: bool,
    /// True if the model flagged a `command` as part of a multi-step plan.
    pub pending: bool,
}

impl Exchange {
    pub fn command(
        query: impl Into<String>,
        command: impl Into<String>,
        tool_use_id: impl Into<String>,
        pending: bool,
    ) -> Self {
        Exchange {
            query: query.into(),
            content: ExchangeContent::Command { command: command.into() },
            tool_use_id: tool_use_id.into(),
            executed: false,
            pending,
        }
    }

    pub fn chat(
        query: impl Into<String>,
        response: impl Into<String>,
        tool_use_id: impl Into<String>,
    ) -> Self {
        Exchange {
            query: query.into(),
            content: ExchangeContent::Chat { response: response.into() },
            tool_use_id: tool_use_id.into(),
            executed: true,
            pending: false,
        }
    }

    pub fn tool_name(&self) -> ToolName {
        self.content.tool_name()
    }

    /// Character count feeding the conversation-wide token estimate (§4.2:
    /// the floor is applied once to the sum across all exchanges, not here).
    pub fn char_len(&self) -> usize {
        self.query.len() + self.content.response_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_round_trips_through_str() {
        for t in [ToolName::Command, ToolName::Chat, ToolName::Scrollback, ToolName::Docs] {
            assert_eq!(ToolName::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn unknown_tool_name_parses_to_none() {
        assert_eq!(ToolName::parse("frobnicate"), None);
    }

    #[test]
    fn chat_exchange_starts_executed() {
        let e = Exchange::chat("yo hi", "hello", "tc_1");
        assert!(e.executed);
        assert_eq!(e.tool_name(), ToolName::Chat);
    }

    #[test]
    fn command_exchange_starts_unexecuted() {
        let e = Exchange::command("yo ls", "ls -la", "tc_1", false);
        assert!(!e.executed);
        assert_eq!(e.tool_name(), ToolName::Command);
    }

    #[test]
    fn char_len_is_query_plus_response_length() {
        let e = Exchange::chat("1234", "12345678", "tc_1");
        assert_eq!(e.char_len(), 12);
    }
}
