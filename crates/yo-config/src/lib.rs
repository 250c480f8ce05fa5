//! Environment-variable configuration, `$HOME`/credential resolution, and the
//! `/etc/os-release` host hint consumed by the assistant control loop.
//!
//! Every field here is reloaded from the process environment at the start of
//! each turn (see `load()`); nothing is cached across turns except inside the
//! caller.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_TOKEN_BUDGET: usize = 4096;
pub const DEFAULT_SCROLLBACK_BYTES: usize = 65536;
pub const DEFAULT_SCROLLBACK_LINES: usize = 500;
pub const DEFAULT_CHAT_COLOR: &str = "\x1b[3;36m";
pub const COLOR_RESET: &str = "\x1b[0m";

const MIN_HISTORY_LIMIT: usize = 1;
const MIN_TOKEN_BUDGET: usize = 100;

const CREDENTIAL_FILE: &str = ".yoshkey";
const REQUIRED_MODE: u32 = 0o600;

/// Configuration reloaded at the start of every user-initiated turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model: String,
    pub history_limit: usize,
    pub token_budget: usize,
    pub scrollback_bytes: usize,
    pub scrollback_lines: usize,
    pub scrollback_enabled: bool,
    pub chat_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model: DEFAULT_MODEL.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            token_budget: DEFAULT_TOKEN_BUDGET,
            scrollback_bytes: DEFAULT_SCROLLBACK_BYTES,
            scrollback_lines: DEFAULT_SCROLLBACK_LINES,
            scrollback_enabled: true,
            chat_color: DEFAULT_CHAT_COLOR.to_string(),
        }
    }
}

/// Reloads configuration from the process environment. Malformed or
/// out-of-bounds integers silently fall back to their default rather than
/// failing the turn; only `YO_SCROLLBACK_ENABLED == "0"` has an effect other
/// than "parse or default".
pub fn load() -> Settings {
    let mut s = Settings::default();

    if let Ok(v) = std::env::var("YO_MODEL") {
        if !v.is_empty() {
            s.model = v;
        }
    }
    if let Some(v) = parse_env_usize("YO_HISTORY_LIMIT") {
        s.history_limit = v.max(MIN_HISTORY_LIMIT);
    }
    if let Some(v) = parse_env_usize("YO_TOKEN_BUDGET") {
        s.token_budget = v.max(MIN_TOKEN_BUDGET);
    }
    if let Some(v) = parse_env_usize("YO_SCROLLBACK_BYTES") {
        if v > 0 {
            s.scrollback_bytes = v;
        }
    }
    if let Some(v) = parse_env_usize("YO_SCROLLBACK_LINES") {
        if v > 0 {
            s.scrollback_lines = v;
        }
    }
    if std::env::var("YO_SCROLLBACK_ENABLED").as_deref() == Ok("0") {
        s.scrollback_enabled = false;
    }
    if let Ok(v) = std::env::var("YO_CHAT_COLOR") {
        if !v.is_empty() {
            s.chat_color = v;
        }
    }

    s
}

fn parse_env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.trim().parse::<usize>().ok()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Create ~/.yoshkey with your Anthropic API key (mode 0600)")]
    CredentialMissing,

    #[error("~/.yoshkey must have mode 0600 (current: {0:04o})")]
    CredentialMode(u32),

    #[error("~/.yoshkey is empty")]
    CredentialEmpty,

    #[error("could not determine home directory")]
    NoHome,

    #[error("cannot read ~/.yoshkey: {0}")]
    Io(#[source] std::io::Error),
}

/// Resolves the effective home directory: `$HOME` first, falling back to the
/// system user database entry for the current effective user.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(h) = std::env::var("HOME") {
        if !h.is_empty() {
            return Ok(PathBuf::from(h));
        }
    }
    passwd_home_dir().ok_or(ConfigError::NoHome)
}

fn passwd_home_dir() -> Option<PathBuf> {
    // SAFETY: getpwuid returns a pointer into thread-local/static storage
    // owned by libc; we copy out the fields we need before anything else
    // can invalidate it.
    unsafe {
        let uid = libc::getuid();
        let pw = libc::getpwuid(uid);
        if pw.is_null() {
            return None;
        }
        let dir = (*pw).pw_dir;
        if dir.is_null() {
            return None;
        }
        let cstr = std::ffi::CStr::from_ptr(dir);
        let s = cstr.to_str().ok()?;
        if s.is_empty() {
            None
        } else {
            Some(PathBuf::from(s))
        }
    }
}

pub fn credential_path() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(CREDENTIAL_FILE))
}

/// Loads and validates the Anthropic API key from `$HOME/.yoshkey`.
///
/// The file must exist, be mode exactly `0600`, and its first line (trimmed)
/// must be non-empty.
pub fn load_credentials() -> Result<String, ConfigError> {
    let path = credential_path()?;
    load_credentials_from(&path)
}

fn load_credentials_from(path: &Path) -> Result<String, ConfigError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::CredentialMissing)
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    let mode = metadata.permissions().mode() & 0o777;
    if mode != REQUIRED_MODE {
        return Err(ConfigError::CredentialMode(mode));
    }

    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let first_line = content.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return Err(ConfigError::CredentialEmpty);
    }
    Ok(first_line.to_string())
}

/// Builds `"The user is running <PRETTY_NAME or NAME+VERSION>."` from
/// `/etc/os-release`, or `None` if the file is absent/unreadable/unparseable.
pub fn os_release_hint() -> Option<String> {
    let content = fs::read_to_string("/etc/os-release").ok()?;
    let fields = parse_os_release(&content);

    let desc = if let Some(pretty) = fields.get("PRETTY_NAME") {
        pretty.clone()
    } else {
        let name = fields.get("NAME")?;
        let version = fields.get("VERSION");
        match version {
            Some(v) => format!("{name} {v}"),
            None => name.clone(),
        }
    };

    Some(format!("The user is running {desc}."))
}

fn parse_os_release(content: &str) -> std::collections::HashMap<String, String> {
    let mut out = std::collections::HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let value = raw_value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .unwrap_or(value);
        out.insert(key.to_string(), value.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt as _;

    #[test]
    fn defaults_are_used_when_env_unset() {
        // Not exhaustive about env isolation (tests run concurrently), but
        // the defaults constructor itself must match the documented values.
        let s = Settings::default();
        assert_eq!(s.model, DEFAULT_MODEL);
        assert_eq!(s.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(s.token_budget, DEFAULT_TOKEN_BUDGET);
        assert!(s.scrollback_enabled);
    }

    #[test]
    fn credential_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".yoshkey");
        let err = load_credentials_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::CredentialMissing));
    }

    #[test]
    fn credential_wrong_mode_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".yoshkey");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "sk-ant-test").unwrap();
        f.set_permissions(fs::Permissions::from_mode(0o640)).unwrap();
        let err = load_credentials_from(&path).unwrap_err();
        match err {
            ConfigError::CredentialMode(m) => assert_eq!(m, 0o640),
            other => panic!("expected CredentialMode, got {other:?}"),
        }
    }

    #[test]
    fn credential_mode_0600_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".yoshkey");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "  sk-ant-test  ").unwrap();
        f.set_permissions(fs::Permissions::from_mode(0o600)).unwrap();
        let key = load_credentials_from(&path).unwrap();
        assert_eq!(key, "sk-ant-test");
    }

    #[test]
    fn credential_empty_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".yoshkey");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f).unwrap();
        f.set_permissions(fs::Permissions::from_mode(0o600)).unwrap();
        let err = load_credentials_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::CredentialEmpty));
    }

    #[test]
    fn os_release_prefers_pretty_name() {
        let content = "NAME=\"Ubuntu\"\nVERSION=\"22.04\"\nPRETTY_NAME=\"Ubuntu 22.04.3 LTS\"\n";
        let fields = parse_os_release(content);
        assert_eq!(fields.get("PRETTY_NAME").unwrap(), "Ubuntu 22.04.3 LTS");
    }

    #[test]
    fn os_release_hint_falls_back_to_name_and_version() {
        let content = "NAME=Alpine\nVERSION=3.19\n";
        let fields = parse_os_release(content);
        assert!(fields.get("PRETTY_NAME").is_none());
        assert_eq!(fields.get("NAME").unwrap(), "Alpine");
        assert_eq!(fields.get("VERSION").unwrap(), "3.19");
    }
}
