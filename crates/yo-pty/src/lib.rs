//! PTY proxy and shared-memory scrollback ring.
//!
//! [`enable`] forks the real interactive shell behind a pseudo-terminal: the
//! parent becomes a pump forwarding bytes in both directions while tee-ing
//! shell output into a [`ScrollbackRing`] that survives in shared memory
//! across the fork, and the child inherits the PTY slave as its controlling
//! terminal and returns to the caller to keep running the assistant.

mod proxy;
mod ring;
mod signals;

pub use proxy::{enable, EnableResult, ScrollbackHandle};
pub use ring::{strip_ansi, ScrollbackRing};
