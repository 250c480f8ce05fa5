//! Forks the real shell behind a PTY so keystrokes and output pass through
//! this process unmodified while every byte of output is also fed into the
//! scrollback ring.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::Arc;

use nix::pty::openpty;
use nix::sys::termios::{self, SetArg, Termios};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::ring::ScrollbackRing;
use crate::signals;

const POLL_TIMEOUT_MS: i32 = 100;
const PUMP_CHUNK: usize = 4096;

pub struct ScrollbackHandle {
    ring: Arc<ScrollbackRing>,
}

impl ScrollbackHandle {
    pub fn read(&self, max_lines: usize) -> String {
        self.ring.read(max_lines)
    }

    pub fn clear(&self) {
        self.ring.clear();
    }
}

pub enum EnableResult {
    /// stdin/stdout aren't both TTYs; the caller should run the shell
    /// directly with no ring and no scrollback feature.
    Degraded,
    /// This process is the shell side of the fork: stdio now points at the
    /// PTY slave and the caller should proceed exactly as if PTY proxying
    /// had never happened, with `ScrollbackHandle` available for the
    /// `scrollback` tool.
    Shell(ScrollbackHandle),
}

/// Forks a PTY-backed pump around the current process. Returns
/// `EnableResult::Shell` in the child (continue running the assistant
/// there); never returns in the parent, which becomes the pump and calls
/// `std::process::exit` once the child shell exits.
pub fn enable(ring_capacity: usize) -> io::Result<EnableResult> {
    if !is_tty(io::stdin().as_fd()) || !is_tty(io::stdout().as_fd()) {
        return Ok(EnableResult::Degraded);
    }

    let ring = Arc::new(ScrollbackRing::create(ring_capacity)?);

    let orig_termios = termios::tcgetattr(io::stdin().as_fd()).map_err(nix_to_io)?;
    let winsize = terminal_size(io::stdout().as_fd());

    let pty = openpty(Some(&winsize), Some(&orig_termios)).map_err(nix_to_io)?;

    // SAFETY: single-threaded at this point in process startup; no other
    // thread holds locks the child could deadlock on.
    match unsafe { unistd::fork() }.map_err(nix_to_io)? {
        ForkResult::Child => {
            drop(pty.master);
            run_child(pty.slave)?;
            Ok(EnableResult::Shell(ScrollbackHandle { ring }))
        }
        ForkResult::Parent { child } => {
            drop(pty.slave);
            run_pump(pty.master, child, &ring, &orig_termios);
        }
    }
}

fn is_tty(fd: BorrowedFd<'_>) -> bool {
    unsafe { libc::isatty(fd.as_raw_fd()) == 1 }
}

fn terminal_size(fd: BorrowedFd<'_>) -> nix::pty::Winsize {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    unsafe {
        libc::ioctl(fd.as_raw_fd(), libc::TIOCGWINSZ, &mut ws);
    }
    nix::pty::Winsize { ws_row: ws.ws_row, ws_col: ws.ws_col, ws_xpixel: ws.ws_xpixel, ws_ypixel: ws.ws_ypixel }
}

fn run_child(slave: OwnedFd) -> io::Result<()> {
    unistd::setsid().map_err(nix_to_io)?;
    unsafe {
        if libc::ioctl(slave.as_raw_fd(), libc::TIOCSCTTY as _, 0) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        unistd::dup2(slave.as_raw_fd(), target).map_err(nix_to_io)?;
    }
    drop(slave);
    Ok(())
}

fn run_pump(master: OwnedFd, child: Pid, ring: &Arc<ScrollbackRing>, orig_termios: &Termios) -> ! {
    signals::set_child_pid(child.as_raw());
    // SAFETY: this process installs no other signal handlers for these
    // signals, and fork() above has already happened.
    if let Err(e) = unsafe { signals::install() } {
        tracing::warn!("installing signal handlers failed: {e}");
    }

    let mut raw = orig_termios.clone();
    termios::cfmakeraw(&mut raw);
    let _ = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &raw);

    let code = pump_loop(&master, child, ring);

    let _ = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, orig_termios);
    std::process::exit(code);
}

fn pump_loop(master: &OwnedFd, child: Pid, ring: &Arc<ScrollbackRing>) -> i32 {
    use nix::poll::{poll, PollFd, PollFlags};

    let mut stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buf = [0u8; PUMP_CHUNK];

    loop {
        if signals::take_sigwinch() {
            propagate_winsize(master.as_fd());
        }

        let mut fds = [
            PollFd::new(io::stdin().as_fd(), PollFlags::POLLIN),
            PollFd::new(master.as_fd(), PollFlags::POLLIN),
        ];
        match poll(&mut fds, POLL_TIMEOUT_MS) {
            Ok(_) => {}
            Err(nix::errno::Errno::EINTR) => continue,
            Err(_) => break,
        }

        if fds[1].revents().unwrap_or_default().contains(PollFlags::POLLIN) {
            match unistd::read(master.as_raw_fd(), &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    ring.append(&buf[..n]);
                    if stdout.write_all(&buf[..n]).is_err() {
                        break;
                    }
                    let _ = stdout.flush();
                }
                Err(nix::errno::Errno::EINTR) => {}
                Err(_) => break,
            }
        }

        if fds[0].revents().unwrap_or_default().contains(PollFlags::POLLIN) {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if !write_all(master, &buf[..n]) {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }

        if signals::child_exited() {
            drain_remaining(master, ring, &mut stdout);
            return reap(child);
        }
    }

    drain_remaining(master, ring, &mut stdout);
    reap(child)
}

fn drain_remaining(master: &OwnedFd, ring: &Arc<ScrollbackRing>, stdout: &mut io::Stdout) {
    let mut buf = [0u8; PUMP_CHUNK];
    loop {
        match unistd::read(master.as_raw_fd(), &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                ring.append(&buf[..n]);
                let _ = stdout.write_all(&buf[..n]);
            }
        }
    }
    let _ = stdout.flush();
}

fn reap(child: Pid) -> i32 {
    match waitpid(child, Some(WaitPidFlag::WNOHANG)).or_else(|_| waitpid(child, None)) {
        Ok(WaitStatus::Exited(_, code)) => code,
        Ok(WaitStatus::Signaled(_, sig, _)) => 128 + sig as i32,
        _ => 1,
    }
}

fn propagate_winsize(master: BorrowedFd<'_>) {
    let ws = terminal_size(io::stdout().as_fd());
    unsafe {
        let raw = libc::winsize {
            ws_row: ws.ws_row,
            ws_col: ws.ws_col,
            ws_xpixel: ws.ws_xpixel,
            ws_ypixel: ws.ws_ypixel,
        };
        libc::ioctl(master.as_raw_fd(), libc::TIOCSWINSZ, &raw);
    }
}

/// Writes `data` to `fd` in full, retrying on `EINTR`/`EAGAIN`. Returns
/// `false` on any other error, leaving the unwritten tail dropped.
fn write_all(fd: &OwnedFd, mut data: &[u8]) -> bool {
    while !data.is_empty() {
        match unistd::write(fd, data) {
            Ok(0) => return false,
            Ok(n) => data = &data[n..],
            Err(nix::errno::Errno::EINTR) => continue,
            Err(nix::errno::Errno::EAGAIN) => {
                std::thread::sleep(std::time::Duration::from_micros(100));
                continue;
            }
            Err(_) => return false,
        }
    }
    true
}

fn nix_to_io(e: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}
