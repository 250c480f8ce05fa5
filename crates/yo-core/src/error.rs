use thiserror::Error;

/// The crate-wide error taxonomy (§7): one variant per failure class, each
/// carrying enough context to format the exact canonical diagnostic string.
#[derive(Debug, Error)]
pub enum YoError {
    #[error("Create ~/.yoshkey with your Anthropic API key (mode 0600)")]
    CredentialMissing,

    #[error("~/.yoshkey must have mode 0600 (current: {0:04o})")]
    CredentialMode(u32),

    #[error("~/.yoshkey is empty")]
    CredentialEmpty,

    #[error("could not determine home directory")]
    NoHome,

    #[error("cannot read ~/.yoshkey: {0}")]
    Credential(#[source] std::io::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("Too many scrollback requests")]
    TooManySubRequests,

    #[error("Unknown response type from Claude")]
    UnknownResponse,

    #[error("{0}")]
    Transport(#[from] yo_transport::TransportError),
}

impl From<yo_config::ConfigError> for YoError {
    fn from(e: yo_config::ConfigError) -> Self {
        match e {
            yo_config::ConfigError::CredentialMissing => YoError::CredentialMissing,
            yo_config::ConfigError::CredentialMode(m) => YoError::CredentialMode(m),
            yo_config::ConfigError::CredentialEmpty => YoError::CredentialEmpty,
            yo_config::ConfigError::NoHome => YoError::NoHome,
            yo_config::ConfigError::Io(e) => YoError::Credential(e),
        }
    }
}
