//! End-to-end tests across crate boundaries: memory + message builder, the
//! control loop's local (non-network) outcomes, and the scrollback ring's
//! ANSI-stripping contract. Anything that requires a live transport call is
//! left to `yo-transport`'s own unit tests.

use serde_json::json;

use yo_core::{AcceptOutcome, Assistant, Output};
use yo_memory::{build_messages, Flavor, Memory};
use yo_model::{clamp_scrollback_lines, Exchange, ToolUse};

#[derive(Default)]
struct RecordingOutput {
    printed: Vec<String>,
}

impl Output for RecordingOutput {
    fn print(&mut self, _color: &str, text: &str) {
        self.printed.push(text.to_string());
    }

    fn thinking_start(&mut self, _color: &str) {}

    fn thinking_clear(&mut self) {}
}

#[tokio::test]
async fn reset_line_clears_memory_and_needs_no_network() {
    let mut assistant = Assistant::new("system".to_string(), String::new(), None);
    let mut out = RecordingOutput::default();

    let outcome = assistant.accept_line("yo reset", &mut out).await;

    assert_eq!(outcome, AcceptOutcome::Reset);
    assert_eq!(out.printed, vec!["Context reset".to_string()]);
}

#[tokio::test]
async fn non_yo_line_is_passthrough_and_needs_no_network() {
    let mut assistant = Assistant::new("system".to_string(), String::new(), None);
    let mut out = RecordingOutput::default();

    let outcome = assistant.accept_line("ls -la", &mut out).await;

    assert_eq!(outcome, AcceptOutcome::Passthrough);
    assert!(out.printed.is_empty());
}

#[test]
fn memory_never_exceeds_count_limit_or_token_budget() {
    let mut memory = Memory::new();
    for i in 0..50 {
        let exchange = Exchange::command(format!("yo step {i}"), format!("echo {i}"), "tc", false);
        memory.add(exchange, 5, 200);
        assert!(memory.len() <= 5);
        assert!(memory.total_tokens() <= 200);
    }
}

#[test]
fn building_messages_replays_stored_exchanges_in_order() {
    let mut memory = Memory::new();
    memory.add(Exchange::chat("yo hi", "hello there", "tc_1"), 10, 100_000);
    memory.add(Exchange::command("yo ls", "ls -la", "tc_2", false), 10, 100_000);

    let messages = build_messages(&memory, "yo what now", &Flavor::Plain);

    // Two stored exchanges (3 messages each) plus the current query.
    assert_eq!(messages.len(), 7);
}

#[test]
fn with_result_flavor_carries_the_sub_request_round_trip() {
    let memory = Memory::new();
    let tool_use = ToolUse { id: "tc_9".into(), name: "scrollback".into(), input: json!({ "lines": 50 }) };
    let flavor = Flavor::WithResult { tool_use, result: "ls\nno such file\n".to_string() };

    let messages = build_messages(&memory, "yo why did that fail", &flavor);

    assert_eq!(messages.len(), 3);
}

#[test]
fn scrollback_lines_boundaries_clamp_as_specified() {
    assert_eq!(clamp_scrollback_lines(Some(0)), 50);
    assert_eq!(clamp_scrollback_lines(Some(-5)), 50);
    assert_eq!(clamp_scrollback_lines(None), 50);
    assert_eq!(clamp_scrollback_lines(Some(5000)), 1000);
    assert_eq!(clamp_scrollback_lines(Some(200)), 200);
}

#[test]
fn stripping_ansi_twice_matches_stripping_once() {
    let raw = "\x1b[31mred\x1b[0m plain \x1b[1;32mgreen\x1b[0m\x1bx";
    let once = yo_pty::strip_ansi(raw);
    let twice = yo_pty::strip_ansi(&once);
    assert_eq!(once, twice);
    assert_eq!(once, "red plain green");
}
