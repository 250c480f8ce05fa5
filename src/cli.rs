use std::path::PathBuf;

use clap::Parser;

/// LLM-powered shell assistant: intercepts `yo ...` lines and suggests or
/// answers via Claude.
#[derive(Parser, Debug)]
#[command(name = "yo", version, about, long_about = None)]
pub struct Cli {
    /// Disable the PTY scrollback proxy (equivalent to YO_SCROLLBACK_ENABLED=0).
    #[arg(long)]
    pub no_scrollback: bool,

    /// Override the model identifier (equivalent to YO_MODEL).
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Load the system prompt handed to the assistant from this file instead
    /// of the built-in default.
    #[arg(long, value_name = "PATH")]
    pub system_prompt_file: Option<PathBuf>,

    /// Load documentation text for the `docs` tool from this file. Defaults
    /// to an empty string if omitted.
    #[arg(long, value_name = "PATH")]
    pub docs_file: Option<PathBuf>,
}
