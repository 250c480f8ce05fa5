//! Raw-mode terminal control: puts stdin in character-at-a-time mode for
//! the duration of the front end and restores the caller's settings on
//! drop, and decodes the raw byte stream into discrete key events.

use std::io::{self, Read};
use std::os::fd::AsFd;

use nix::sys::termios::{self, SetArg, Termios};

pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    CtrlC,
    Unhandled,
}

pub struct RawModeGuard {
    saved: Termios,
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        let stdin = io::stdin();
        let saved = termios::tcgetattr(stdin.as_fd()).map_err(nix_to_io)?;
        let mut raw = saved.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw).map_err(nix_to_io)?;
        Ok(RawModeGuard { saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &self.saved);
    }
}

fn nix_to_io(e: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

/// Reads one key event from stdin, blocking. Escape sequences for the
/// arrow keys (`ESC [ A`/`ESC [ B`/`ESC [ C`/`ESC [ D`) are decoded;
/// anything else after an unrecognized escape is reported as
/// `Key::Unhandled`.
pub fn read_key() -> io::Result<Key> {
    let b = read_byte()?;
    match b {
        0x03 => Ok(Key::CtrlC),
        b'\r' | b'\n' => Ok(Key::Enter),
        0x7f | 0x08 => Ok(Key::Backspace),
        0x1b => read_escape_sequence(),
        _ => {
            let mut buf = [b, 0, 0, 0];
            let len = utf8_len(b);
            for slot in buf.iter_mut().take(len).skip(1) {
                *slot = read_byte()?;
            }
            match std::str::from_utf8(&buf[..len]).ok().and_then(|s| s.chars().next()) {
                Some(c) => Ok(Key::Char(c)),
                None => Ok(Key::Unhandled),
            }
        }
    }
}

fn read_escape_sequence() -> io::Result<Key> {
    let Ok(b1) = read_byte() else { return Ok(Key::Unhandled) };
    if b1 != b'[' {
        return Ok(Key::Unhandled);
    }
    let Ok(b2) = read_byte() else { return Ok(Key::Unhandled) };
    match b2 {
        b'A' => Ok(Key::Up),
        b'B' => Ok(Key::Down),
        b'C' => Ok(Key::Right),
        b'D' => Ok(Key::Left),
        _ => Ok(Key::Unhandled),
    }
}

fn utf8_len(lead: u8) -> usize {
    if lead & 0x80 == 0 {
        1
    } else if lead & 0xe0 == 0xc0 {
        2
    } else if lead & 0xf0 == 0xe0 {
        3
    } else {
        4
    }
}

fn read_byte() -> io::Result<u8> {
    let mut b = [0u8; 1];
    io::stdin().read_exact(&mut b)?;
    Ok(b[0])
}
