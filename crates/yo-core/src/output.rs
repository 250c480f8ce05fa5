/// The user-visible colored output channel (§6), kept separate from the
/// structured logging channel (C9). Implemented by the line-editor front
/// end; the control loop never writes to a stream directly.
pub trait Output {
    /// One line of chat/diagnostic/explanation text, prefixed by `color` and
    /// suffixed by the reset sequence.
    fn print(&mut self, color: &str, text: &str);

    /// Shows the "Thinking…" indicator, prefixed by `color`.
    fn thinking_start(&mut self, color: &str);

    /// Erases the "Thinking…" indicator (`\r` + erase-to-end-of-line).
    fn thinking_clear(&mut self);
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingOutput {
    pub printed: Vec<String>,
    pub thinking_started: bool,
    pub thinking_cleared: bool,
}

#[cfg(test)]
impl Output for RecordingOutput {
    fn print(&mut self, _color: &str, text: &str) {
        self.printed.push(text.to_string());
    }

    fn thinking_start(&mut self, _color: &str) {
        self.thinking_started = true;
    }

    fn thinking_clear(&mut self) {
        self.thinking_cleared = true;
    }
}
