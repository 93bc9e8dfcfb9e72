/// Domain models for voicetyped
///
/// These models represent core service entities and are adapter-agnostic.
use serde::{Deserialize, Serialize};

/// The single service-wide state value.
///
/// Only the orchestrator writes this, under its lock. `Streaming` is mutually
/// exclusive with the batch-pipeline states (`Recording`, `Transcribing`,
/// `Typing`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Idle,
    Recording,
    Transcribing,
    Typing,
    Streaming,
    Error,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Idle => write!(f, "idle"),
            ServiceState::Recording => write!(f, "recording"),
            ServiceState::Transcribing => write!(f, "transcribing"),
            ServiceState::Typing => write!(f, "typing"),
            ServiceState::Streaming => write!(f, "streaming"),
            ServiceState::Error => write!(f, "error"),
        }
    }
}

impl ServiceState {
    /// A session object exists exactly while the service is outside
    /// `Idle`/`Error`.
    pub fn has_session(&self) -> bool {
        !matches!(self, ServiceState::Idle | ServiceState::Error)
    }
}

/// One completed transcription, as persisted by the transcript store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: Option<i64>,
    /// Auto-populated by the store on append.
    pub timestamp: String,
    pub duration_ms: Option<i64>,
    pub text: String,
    pub audio_path: Option<String>,
    pub model_name: Option<String>,
}

/// An in-flight streaming transcription update.
///
/// `stable_len` counts leading characters of `text` the server commits to
/// not revising. For partials observed in `seq` order, `stable_len` never
/// decreases and earlier stable prefixes are prefixes of later texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialUpdate {
    pub text: String,
    pub stable_len: usize,
    pub seq: u64,
}

/// The terminal text of a streaming session. Its length is at least the last
/// observed `stable_len`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalUpdate {
    pub text: String,
}
