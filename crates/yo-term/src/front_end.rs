use std::io::{self, Write};

use tracing::{debug, warn};

use yo_core::{AcceptOutcome, Assistant, Output};

use crate::editor::{LineBuffer, LineHistory};
use crate::terminal::{read_key, Key, RawModeGuard};

const RESET: &str = "\x1b[0m";
const ERASE_TO_EOL: &str = "\r\x1b[K";
const PROMPT: &str = "$ ";

/// Writes directly to stdout; the only implementation of `yo_core::Output`
/// in this crate, since the front end owns the terminal.
struct TermOutput;

impl Output for TermOutput {
    fn print(&mut self, color: &str, text: &str) {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{ERASE_TO_EOL}{color}{text}{RESET}\r\n");
        let _ = stdout.flush();
    }

    fn thinking_start(&mut self, color: &str) {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{color}Thinking…{RESET}");
        let _ = stdout.flush();
    }

    fn thinking_clear(&mut self) {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{ERASE_TO_EOL}");
        let _ = stdout.flush();
    }
}

/// Runs the interactive front end until stdin closes. Puts the terminal in
/// raw mode for the duration; restores it on return via `RawModeGuard`'s
/// `Drop`, including on an early return from an I/O error.
pub async fn run(assistant: &mut Assistant) -> io::Result<()> {
    let _raw = RawModeGuard::enable()?;
    let mut out = TermOutput;
    let mut buffer = LineBuffer::default();
    let mut history = LineHistory::default();

    loop {
        if let Some(outcome) = assistant.pre_prompt(&mut out).await {
            apply_continuation_outcome(&mut buffer, outcome);
        }

        render_prompt(&buffer);

        match read_line(&mut buffer, &mut history)? {
            None => return Ok(()),
            Some(ReadResult::Interrupted) => {
                debug!("SIGINT during editing, clearing buffer");
                assistant.handle_interrupt();
                buffer.clear();
                print!("\r\n");
                let _ = io::stdout().flush();
            }
            Some(ReadResult::Accepted(line)) => {
                history.push(&line);
                buffer.clear();
                let outcome = assistant.accept_line(&line, &mut out).await;
                match outcome {
                    AcceptOutcome::Passthrough => run_passthrough(&line),
                    AcceptOutcome::Command(command) => buffer.set_text(&command),
                    AcceptOutcome::Chat
                    | AcceptOutcome::Reset
                    | AcceptOutcome::Cancelled
                    | AcceptOutcome::Error => {}
                }
            }
        }
    }
}

fn apply_continuation_outcome(buffer: &mut LineBuffer, outcome: AcceptOutcome) {
    if let AcceptOutcome::Command(command) = outcome {
        buffer.set_text(&command);
    }
}

enum ReadResult {
    Accepted(String),
    Interrupted,
}

/// Reads keystrokes until Enter, Ctrl-C, or EOF. `None` means stdin closed.
/// Up/Down recall entries from `history` into the buffer without touching
/// it until a line is actually accepted.
fn read_line(buffer: &mut LineBuffer, history: &mut LineHistory) -> io::Result<Option<ReadResult>> {
    loop {
        let key = match read_key() {
            Ok(k) => k,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        match key {
            Key::Enter => {
                let line = buffer.as_string();
                redraw(buffer);
                print!("\r\n");
                let _ = io::stdout().flush();
                return Ok(Some(ReadResult::Accepted(line)));
            }
            Key::CtrlC => return Ok(Some(ReadResult::Interrupted)),
            Key::Char(c) => {
                buffer.insert(c);
                redraw(buffer);
            }
            Key::Backspace => {
                buffer.backspace();
                redraw(buffer);
            }
            Key::Left => {
                buffer.move_left();
                redraw(buffer);
            }
            Key::Right => {
                buffer.move_right();
                redraw(buffer);
            }
            Key::Up => {
                if let Some(recalled) = history.recall_older(&buffer.as_string()) {
                    buffer.set_text(recalled);
                    redraw(buffer);
                }
            }
            Key::Down => {
                if let Some(recalled) = history.recall_newer() {
                    buffer.set_text(recalled);
                    redraw(buffer);
                }
            }
            Key::Unhandled => {}
        }
    }
}

fn render_prompt(buffer: &LineBuffer) {
    print!("{PROMPT}{}", buffer.as_string());
    position_cursor(buffer);
    let _ = io::stdout().flush();
}

fn redraw(buffer: &LineBuffer) {
    print!("{ERASE_TO_EOL}{PROMPT}{}", buffer.as_string());
    position_cursor(buffer);
    let _ = io::stdout().flush();
}

fn position_cursor(buffer: &LineBuffer) {
    let trailing = buffer.as_string().chars().count() - buffer.cursor();
    if trailing > 0 {
        print!("\x1b[{trailing}D");
    }
}

/// The external collaborator (§1) that actually executes a non-`yo` line.
/// In the original architecture this was GNU Readline's host shell; here
/// the front end plays that role directly since it owns the PTY slave's
/// stdio.
fn run_passthrough(line: &str) {
    if line.is_empty() {
        return;
    }
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    match std::process::Command::new(shell).arg("-c").arg(line).status() {
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to spawn shell for passthrough line"),
    }
}
