//! Signal forwarding for the pump process. Handlers touch only async-signal
//! safe state (atomics, `kill(2)`); anything that needs a syscall sequence
//! (winsize propagation) is deferred to the pump loop.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};

static CHILD_PID: AtomicI32 = AtomicI32::new(0);
static SIGWINCH_FLAG: AtomicBool = AtomicBool::new(false);
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);

/// Signals forwarded straight through to the child shell.
const FORWARDED: &[Signal] =
    &[Signal::SIGHUP, Signal::SIGTERM, Signal::SIGINT, Signal::SIGQUIT, Signal::SIGUSR1, Signal::SIGUSR2];

pub fn set_child_pid(pid: i32) {
    CHILD_PID.store(pid, Ordering::SeqCst);
}

pub fn take_sigwinch() -> bool {
    SIGWINCH_FLAG.swap(false, Ordering::SeqCst)
}

pub fn child_exited() -> bool {
    CHILD_EXITED.load(Ordering::SeqCst)
}

/// Installs handlers for the forwarded set, SIGWINCH, and SIGCHLD. Must run
/// in the pump process only, after `set_child_pid`.
///
/// # Safety
/// Installs process-wide signal handlers; must not run concurrently with
/// other code that installs handlers for the same signals.
pub unsafe fn install() -> nix::Result<()> {
    for &sig in FORWARDED {
        signal::signal(sig, SigHandler::Handler(forward_handler))?;
    }
    signal::signal(Signal::SIGWINCH, SigHandler::Handler(winch_handler))?;
    signal::signal(Signal::SIGCHLD, SigHandler::Handler(chld_handler))?;
    Ok(())
}

extern "C" fn forward_handler(sig: i32) {
    let pid = CHILD_PID.load(Ordering::SeqCst);
    if pid > 0 {
        unsafe {
            libc::kill(pid, sig);
        }
    }
}

extern "C" fn winch_handler(_sig: i32) {
    SIGWINCH_FLAG.store(true, Ordering::SeqCst);
}

extern "C" fn chld_handler(_sig: i32) {
    CHILD_EXITED.store(true, Ordering::SeqCst);
}
