//! Shared data model: stored conversation `Exchange`s and the Anthropic wire
//! types (`Message`, `ContentBlock`, tool schemas) built on top of them.

mod exchange;
mod wire;

pub use exchange::{Exchange, ExchangeContent, ToolName};
pub use wire::{
    clamp_scrollback_lines, tool_definitions, ContentBlock, Message, Role, ToolDefinition, ToolUse,
    SCROLLBACK_MIN_LINES, SCROLLBACK_MAX_LINES, SCROLLBACK_DEFAULT_LINES, SYNTHETIC_CHAT_TOOL_USE_ID,
};

/// Rough token estimate shared by conversation pruning and budget checks:
/// `⌊total_chars / 4⌋`, the floor applied once to the grand total (§4.2).
pub fn approx_tokens(total_chars: usize) -> usize {
    total_chars / 4
}
