/// Error types for voicetyped
///
/// Uses thiserror for ergonomic error handling with proper Display implementations.
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Maximum recording duration reached")]
    CaptureTimeout,

    #[error("Transcription provider misconfigured: {0}")]
    ProviderMisconfigured(String),

    #[error("Transcription transport failure: {0}")]
    ProviderTransport(String),

    #[error("Transcription provider error ({status}): {body}")]
    ProviderError { status: u16, body: String },

    #[error("No text emitter backend available")]
    TypingUnavailable,

    #[error("Text emitter failed: {0}")]
    TypingFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Transcript store failure: {0}")]
    PersistenceFailed(String),

    #[error("Overlay peer failure: {0}")]
    OverlayFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Audio capture error: {0}")]
    AudioCapture(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// True for the cancellation outcome, which the orchestrator treats as a
    /// silent return to idle rather than a user-visible error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Convert AppError to a string for socket responses
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}
