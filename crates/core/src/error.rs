/// Result alias that carries the custom [`SpeechSyncError`] type.
pub type Result<T> = std::result::Result<T, SpeechSyncError>;

/// Common error type for the core crate.
///
/// None of these are fatal to a running animation: the animator degrades to a
/// reduced-fidelity timeline instead of surfacing most of them.
#[derive(Debug, thiserror::Error)]
pub enum SpeechSyncError {
    /// The provided bytes could not be decoded into a sample buffer.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// No audio decoding backend is configured.
    #[error("audio analysis is unavailable: no decoder configured")]
    AnalysisUnavailable,
    /// The remote phonetic lookup failed or answered with a non-success status.
    #[error("phonetic service error: {0}")]
    PhoneticService(String),
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

impl SpeechSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<hound::Error> for SpeechSyncError {
    fn from(value: hound::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for SpeechSyncError {
    fn from(value: reqwest::Error) -> Self {
        Self::PhoneticService(value.to_string())
    }
}

impl From<&str> for SpeechSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SpeechSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
