mod cli;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::Cli;

const DEFAULT_SYSTEM_PROMPT: &str = "You are yo, a shell assistant invoked as `yo <request>` at an \
interactive prompt. Given the user's request, respond with exactly one tool call: `command` to \
suggest a shell command for the user to review and run, or `chat` to answer in plain language. \
Use `scrollback` to see recent terminal output and `docs` to consult local documentation when \
either would help you answer accurately. Keep explanations and chat replies short.";

/// Forking happens here, before the Tokio runtime starts, so the pump
/// process never has to unwind a multi-threaded runtime across `fork()`.
/// Only the shell-side process (or a disabled/degraded run) ever builds a
/// runtime and enters the control loop.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();
    apply_overrides(&cli);

    let settings = yo_config::load();

    let scrollback = if settings.scrollback_enabled {
        match yo_pty::enable(settings.scrollback_bytes) {
            Ok(yo_pty::EnableResult::Shell(handle)) => Some(handle),
            Ok(yo_pty::EnableResult::Degraded) => {
                warn!("stdin/stdout are not both terminals; scrollback disabled");
                None
            }
            Err(e) => {
                warn!(error = %e, "PTY proxy setup failed; scrollback disabled");
                None
            }
        }
    } else {
        None
    };

    let system_prompt = load_text(&cli.system_prompt_file, DEFAULT_SYSTEM_PROMPT)?;
    let docs_text = load_text(&cli.docs_file, "")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the async runtime")?;

    runtime.block_on(async move {
        let mut assistant = yo_core::Assistant::new(system_prompt, docs_text, scrollback);
        yo_term::run(&mut assistant).await
    })?;

    Ok(())
}

fn apply_overrides(cli: &Cli) {
    if cli.no_scrollback {
        std::env::set_var("YO_SCROLLBACK_ENABLED", "0");
    }
    if let Some(model) = &cli.model {
        std::env::set_var("YO_MODEL", model);
    }
}

fn load_text(path: &Option<std::path::PathBuf>, default: &str) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())),
        None => Ok(default.to_string()),
    }
}

/// Writing to stderr while the line editor is active would corrupt its
/// raw-mode display, so tracing stays off unless the caller opts in via
/// `YO_LOG_FILE` (any mode) or `RUST_LOG` (stderr, for headless debugging
/// only — normal interactive use has no other terminal to show it on).
fn init_logging() {
    if let Ok(log_path) = std::env::var("YO_LOG_FILE") {
        use std::sync::Mutex;
        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("yo=info,warn"));
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .try_init();
            return;
        }
    }

    if std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("yo=info,warn"));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::OFF)
        .try_init();
}
