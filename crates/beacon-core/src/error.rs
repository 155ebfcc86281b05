use thiserror::Error;

/// Top-level error type for Beacon.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// Credential fetch or validation failed.
    #[error("auth expired: {0}")]
    AuthExpired(String),

    /// A live session already exists for this number.
    #[error("session already active for {0}")]
    AlreadyActive(String),

    /// Retryable send/read failure.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Reconnect backoff exhausted.
    #[error("permanent disconnect: {0}")]
    PermanentDisconnect(String),

    /// Error from the remote session archive.
    #[error("archive error: {0}")]
    Archive(String),

    /// Error from a messaging socket.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Command execution error.
    #[error("command error: {0}")]
    Command(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BeaconError {
    /// Whether a retry loop should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork(_) | Self::Channel(_) | Self::Archive(_) | Self::Io(_)
        )
    }
}
