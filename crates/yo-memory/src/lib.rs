//! Bounded, append-only conversation memory (C2) and the message builder that
//! replays it as tool-use/tool-result message trios (C3).

mod builder;
mod memory;

pub use builder::{build_messages, Flavor};
pub use memory::Memory;
