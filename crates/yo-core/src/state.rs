/// Continuation state (§3), process-wide within the shell process. Armed on
/// a pending `command` dispatch, consumed by the one-shot pre-prompt hook,
/// and cleared by SIGINT during editing, explicit reset, or an empty line.
#[derive(Debug, Default)]
pub struct ContinuationState {
    active: bool,
    hook_pending: bool,
    suggested: String,
    executed_line: String,
}

impl ContinuationState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Arms continuation after a pending `command` dispatch.
    pub fn arm(&mut self, suggested: String) {
        self.active = true;
        self.hook_pending = false;
        self.suggested = suggested;
        self.executed_line.clear();
    }

    /// Records the line the user actually executed and installs the
    /// one-shot pre-prompt hook (executed-tracking step, §4.5).
    pub fn arm_hook(&mut self, executed_line: String) {
        if self.active {
            self.executed_line = executed_line;
            self.hook_pending = true;
        }
    }

    /// Consumes the pending hook, if any. Returns whether it fired.
    pub fn take_pending_hook(&mut self) -> bool {
        std::mem::replace(&mut self.hook_pending, false)
    }

    pub fn disarm(&mut self) {
        self.active = false;
        self.hook_pending = false;
    }

    pub fn suggested(&self) -> &str {
        &self.suggested
    }

    pub fn executed_line(&self) -> &str {
        &self.executed_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_then_arm_hook_then_take_fires_once() {
        let mut c = ContinuationState::default();
        c.arm("python -m venv .venv".to_string());
        c.arm_hook("python -m venv .venv".to_string());
        assert!(c.take_pending_hook());
        assert!(!c.take_pending_hook());
    }

    #[test]
    fn arm_hook_on_inactive_state_is_a_no_op() {
        let mut c = ContinuationState::default();
        c.arm_hook("ls".to_string());
        assert!(!c.take_pending_hook());
    }

    #[test]
    fn disarm_clears_pending_hook() {
        let mut c = ContinuationState::default();
        c.arm("ls".to_string());
        c.arm_hook("ls".to_string());
        c.disarm();
        assert!(!c.is_active());
        assert!(!c.take_pending_hook());
    }
}
