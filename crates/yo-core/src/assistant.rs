use tracing::{error, info};

use yo_memory::{build_messages, Flavor, Memory};
use yo_model::{Exchange, ToolName, ToolUse};
use yo_pty::ScrollbackHandle;
use yo_transport::{CallOutcome, Transport};

use crate::error::YoError;
use crate::output::Output;
use crate::state::ContinuationState;

const PREFIX: &str = "yo ";
const RESET_LINE: &str = "yo reset";
const SUB_REQUEST_LIMIT: u8 = 3;
const CONTINUATION_SCROLLBACK_LINES: usize = 200;
const NO_OUTPUT_PLACEHOLDER: &str = "(no output)";
const EXPLANATION_REPAIR_REQUEST: &str = "Please provide the missing explanation field.";

/// What the front end should do with the editor line after a turn.
#[derive(Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Not a `yo` line; hand it back to the shell layer unexecuted.
    Passthrough,
    /// `yo reset`: buffer already cleared and acknowledgment printed.
    Reset,
    /// Prefill the editor buffer with this command, caret at the end.
    Command(String),
    /// Chat reply already printed; clear the buffer.
    Chat,
    Cancelled,
    Error,
}

/// The assistant's process-wide mutable state (§9 design note): memory,
/// continuation, cached session flags, and the one owner of the scrollback
/// handle. Threaded explicitly through the editor front end rather than
/// hidden behind a global.
pub struct Assistant {
    memory: Memory,
    system_prompt: String,
    docs_text: String,
    scrollback: Option<ScrollbackHandle>,
    last_was_command: bool,
    continuation: ContinuationState,
}

impl Assistant {
    pub fn new(system_prompt: String, docs_text: String, scrollback: Option<ScrollbackHandle>) -> Self {
        let system_prompt = match yo_config::os_release_hint() {
            Some(hint) => format!("{system_prompt}\n{hint}"),
            None => system_prompt,
        };
        Assistant {
            memory: Memory::new(),
            system_prompt,
            docs_text,
            scrollback,
            last_was_command: false,
            continuation: ContinuationState::default(),
        }
    }

    /// Called by the front end immediately before rendering each new prompt
    /// (§4.7). Fires C6 if a continuation hook is pending.
    pub async fn pre_prompt<O: Output>(&mut self, out: &mut O) -> Option<AcceptOutcome> {
        if !self.continuation.take_pending_hook() {
            return None;
        }
        Some(self.fire_continuation(out).await)
    }

    /// Called on every accept-line (§4.5 Turn algorithm + Executed tracking).
    pub async fn accept_line<O: Output>(&mut self, line: &str, out: &mut O) -> AcceptOutcome {
        self.track_executed(line);

        if line == RESET_LINE {
            self.reset();
            let settings = yo_config::load();
            out.print(&settings.chat_color, "Context reset");
            info!("context reset");
            return AcceptOutcome::Reset;
        }
        if !line.starts_with(PREFIX) {
            return AcceptOutcome::Passthrough;
        }

        self.run_turn(line, out).await
    }

    fn track_executed(&mut self, line: &str) {
        if self.last_was_command && !line.starts_with(PREFIX) {
            self.memory.mark_last_executed();
        }
        self.last_was_command = false;

        if line.starts_with(PREFIX) {
            self.continuation.disarm();
        } else if self.continuation.is_active() {
            if line.is_empty() {
                self.continuation.disarm();
            } else {
                self.continuation.arm_hook(line.to_string());
            }
        }
    }

    /// SIGINT cleanup (§4.6): clears continuation and "last was command" so
    /// the next prompt is pristine. One-shot, idempotent.
    pub fn handle_interrupt(&mut self) {
        self.continuation.disarm();
        self.last_was_command = false;
    }

    fn reset(&mut self) {
        self.memory.clear();
        if let Some(sb) = &self.scrollback {
            sb.clear();
        }
        self.continuation.disarm();
        self.last_was_command = false;
    }

    async fn run_turn<O: Output>(&mut self, query: &str, out: &mut O) -> AcceptOutcome {
        let settings = yo_config::load();

        let api_key = match yo_config::load_credentials() {
            Ok(key) => key,
            Err(e) => {
                let e = YoError::from(e);
                error!(error = %e, "credential load failed");
                out.print(&settings.chat_color, &e.to_string());
                return AcceptOutcome::Error;
            }
        };

        out.thinking_start(&settings.chat_color);
        let transport = Transport::new(api_key, &settings.model);
        let result = self.drive(&transport, query).await;
        out.thinking_clear();

        let tool_use = match result {
            Ok(tu) => tu,
            Err(e) => return self.fail_turn(e, &settings, out),
        };

        self.dispatch(query, tool_use, &settings, out)
    }

    fn fail_turn<O: Output>(&mut self, e: YoError, settings: &yo_config::Settings, out: &mut O) -> AcceptOutcome {
        error!(error = %e, "turn failed");
        out.print(&settings.chat_color, &e.to_string());
        if matches!(e, YoError::Cancelled) {
            AcceptOutcome::Cancelled
        } else {
            AcceptOutcome::Error
        }
    }

    /// Sub-request loop (step 7) followed by explanation repair (step 8).
    async fn drive(&mut self, transport: &Transport, query: &str) -> Result<ToolUse, YoError> {
        let messages = build_messages(&self.memory, query, &Flavor::Plain);
        let mut tool_use = self.call(transport, &messages).await?;

        let mut iterations = 0u8;
        while matches!(ToolName::parse(&tool_use.name), Some(ToolName::Scrollback) | Some(ToolName::Docs)) {
            iterations += 1;
            if iterations > SUB_REQUEST_LIMIT {
                return Err(YoError::TooManySubRequests);
            }
            let result = self.fulfil_sub_request(&tool_use);
            let flavor = Flavor::WithResult { tool_use: tool_use.clone(), result };
            let messages = build_messages(&self.memory, query, &flavor);
            tool_use = self.call(transport, &messages).await?;
        }

        if ToolName::parse(&tool_use.name) == Some(ToolName::Command) && tool_use.bool_field("pending").unwrap_or(false)
        {
            let missing = tool_use.str_field("explanation").map(str::is_empty).unwrap_or(true);
            if missing {
                if let Some(repaired) = self.repair_explanation(transport, query, &tool_use).await? {
                    tool_use = repaired;
                }
            }
        }

        Ok(tool_use)
    }

    async fn call(&self, transport: &Transport, messages: &[yo_model::Message]) -> Result<ToolUse, YoError> {
        match transport.call(&self.system_prompt, messages).await? {
            CallOutcome::ToolUse(tu) => Ok(tu),
            CallOutcome::Cancelled => Err(YoError::Cancelled),
        }
    }

    fn fulfil_sub_request(&self, tool_use: &ToolUse) -> String {
        match ToolName::parse(&tool_use.name) {
            Some(ToolName::Scrollback) => {
                let lines = yo_model::clamp_scrollback_lines(tool_use.input.get("lines").and_then(|v| v.as_i64()));
                self.scrollback.as_ref().map(|h| h.read(lines as usize)).unwrap_or_default()
            }
            Some(ToolName::Docs) => self.docs_text.clone(),
            _ => String::new(),
        }
    }

    /// Step 8. `Ok(None)` means: keep the original tool-use as-is (either
    /// the repair response still lacked an explanation, or was some other
    /// tool entirely). Cancellation during the repair request is its own
    /// failure class (§7) and aborts the whole turn.
    async fn repair_explanation(
        &self,
        transport: &Transport,
        query: &str,
        original: &ToolUse,
    ) -> Result<Option<ToolUse>, YoError> {
        let flavor =
            Flavor::WithResult { tool_use: original.clone(), result: EXPLANATION_REPAIR_REQUEST.to_string() };
        let messages = build_messages(&self.memory, query, &flavor);
        let tu = self.call(transport, &messages).await?;
        let has_explanation = tu.str_field("explanation").map(|s| !s.is_empty()).unwrap_or(false);
        if ToolName::parse(&tu.name) == Some(ToolName::Command) && has_explanation {
            Ok(Some(tu))
        } else {
            Ok(None)
        }
    }

    fn dispatch<O: Output>(
        &mut self,
        query: &str,
        tool_use: ToolUse,
        settings: &yo_config::Settings,
        out: &mut O,
    ) -> AcceptOutcome {
        match ToolName::parse(&tool_use.name) {
            Some(ToolName::Command) => {
                let command = tool_use.str_field("command").unwrap_or_default().to_string();
                let explanation = tool_use.str_field("explanation").unwrap_or_default();
                if !explanation.is_empty() {
                    out.print(&settings.chat_color, explanation);
                }
                let pending = tool_use.bool_field("pending").unwrap_or(false);
                let exchange = Exchange::command(query, command.clone(), tool_use.id.clone(), pending);
                self.memory.add(exchange, settings.history_limit, settings.token_budget);
                self.last_was_command = true;
                if pending {
                    self.continuation.arm(command.clone());
                }
                info!(pending, "dispatched command");
                AcceptOutcome::Command(command)
            }
            Some(ToolName::Chat) => {
                let response = tool_use.str_field("response").unwrap_or_default().to_string();
                out.print(&settings.chat_color, &response);
                let exchange = Exchange::chat(query, response, tool_use.id.clone());
                self.memory.add(exchange, settings.history_limit, settings.token_budget);
                self.continuation.disarm();
                info!("dispatched chat");
                AcceptOutcome::Chat
            }
            _ => {
                let e = YoError::UnknownResponse;
                error!(error = %e, tool = %tool_use.name, "unrecognized tool-use");
                out.print(&settings.chat_color, &e.to_string());
                AcceptOutcome::Error
            }
        }
    }

    async fn fire_continuation<O: Output>(&mut self, out: &mut O) -> AcceptOutcome {
        if !self.continuation.is_active() {
            return AcceptOutcome::Passthrough;
        }
        let settings = yo_config::load();
        out.thinking_start(&settings.chat_color);

        let api_key = match yo_config::load_credentials() {
            Ok(key) => key,
            Err(e) => {
                out.thinking_clear();
                let e = YoError::from(e);
                error!(error = %e, "credential load failed during continuation");
                out.print(&settings.chat_color, &e.to_string());
                self.continuation.disarm();
                return AcceptOutcome::Error;
            }
        };

        let scrollback = self
            .scrollback
            .as_ref()
            .map(|h| h.read(CONTINUATION_SCROLLBACK_LINES))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_OUTPUT_PLACEHOLDER.to_string());

        let suggested = self.continuation.suggested().to_string();
        let executed = self.continuation.executed_line().to_string();
        let query = if executed != suggested {
            format!(
                "[continuation] You suggested: {suggested}\nThe user edited and executed: {executed}\nHere is the terminal output:\n```\n{scrollback}\n```"
            )
        } else {
            format!(
                "[continuation] The user executed the previous command. Here is the terminal output:\n```\n{scrollback}\n```"
            )
        };

        self.continuation.disarm();
        info!("continuation fired");

        let transport = Transport::new(api_key, &settings.model);
        let result = self.drive(&transport, &query).await;
        out.thinking_clear();

        let tool_use = match result {
            Ok(tu) => tu,
            Err(e) => return self.fail_turn(e, &settings, out),
        };

        self.dispatch(&query, tool_use, &settings, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingOutput;

    #[test]
    fn track_executed_marks_last_exchange_on_non_yo_line() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        a.memory.add(Exchange::command("yo ls", "ls -la", "tc_1", false), 10, 100_000);
        a.last_was_command = true;
        a.track_executed("ls -la");
        assert!(a.memory.last().unwrap().executed);
        assert!(!a.last_was_command);
    }

    #[test]
    fn track_executed_does_not_mark_when_next_line_is_a_yo_command() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        a.memory.add(Exchange::command("yo ls", "ls -la", "tc_1", false), 10, 100_000);
        a.last_was_command = true;
        a.track_executed("yo something else");
        assert!(!a.memory.last().unwrap().executed);
    }

    #[test]
    fn empty_line_disarms_continuation_even_if_command_was_never_executed() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        a.continuation.arm("python -m venv .venv".into());
        a.track_executed("");
        assert!(!a.continuation.is_active());
    }

    #[test]
    fn yo_line_disarms_continuation_unconditionally() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        a.continuation.arm("python -m venv .venv".into());
        a.track_executed("yo do something else");
        assert!(!a.continuation.is_active());
    }

    #[test]
    fn non_empty_non_yo_line_arms_the_pending_hook() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        a.continuation.arm("python -m venv .venv".into());
        a.track_executed("python -m venv .venv");
        assert!(a.continuation.take_pending_hook());
    }

    #[tokio::test]
    async fn passthrough_line_is_not_treated_as_a_yo_command() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        let mut out = RecordingOutput::default();
        let outcome = a.accept_line("ls -la", &mut out).await;
        assert_eq!(outcome, AcceptOutcome::Passthrough);
        assert!(out.printed.is_empty());
    }

    #[tokio::test]
    async fn reset_line_clears_memory_and_prints_acknowledgment() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        a.memory.add(Exchange::chat("yo hi", "hello", "tc_1"), 10, 100_000);
        let mut out = RecordingOutput::default();
        let outcome = a.accept_line("yo reset", &mut out).await;
        assert_eq!(outcome, AcceptOutcome::Reset);
        assert!(a.memory.is_empty());
        assert_eq!(out.printed, vec!["Context reset".to_string()]);
    }

    #[tokio::test]
    async fn pre_prompt_is_a_no_op_when_no_hook_is_pending() {
        let mut a = Assistant::new("sys".into(), String::new(), None);
        let mut out = RecordingOutput::default();
        assert!(a.pre_prompt(&mut out).await.is_none());
    }
}
