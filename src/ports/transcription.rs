/// Transcription ports
///
/// Two alternative paths: a one-shot batch upload and a bidirectional
/// streaming session with a stable-prefix contract.
use crate::domain::models::{FinalUpdate, PartialUpdate};
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Port trait for one-shot (batch) transcription
#[async_trait]
pub trait BatchTranscriberPort: Send + Sync {
    /// Upload a complete audio clip and return the transcribed text.
    ///
    /// `model` falls back to the provider's configured model, then to the
    /// documented default. Observes `cancel` at suspension points.
    async fn transcribe(
        &self,
        cancel: &CancellationToken,
        audio: Vec<u8>,
        filename: &str,
        model: Option<&str>,
        language: Option<&str>,
    ) -> Result<String>;
}

/// Callbacks driven by a streaming session's receive loop.
///
/// Delivered serially; partials arrive in non-decreasing `seq` order and
/// `final` is the last callback of a session.
#[async_trait]
pub trait StreamingCallback: Send + Sync {
    async fn on_partial(&self, update: PartialUpdate);
    async fn on_final(&self, update: FinalUpdate);
    async fn on_error(&self, code: String, message: String);
}

/// Handle for one live streaming transcription session.
#[async_trait]
pub trait StreamingSessionHandle: Send + Sync {
    /// Enqueue raw PCM bytes as the next audio message. Thread-safe with
    /// respect to other sends.
    async fn send_audio(&self, pcm: &[u8]) -> Result<()>;

    /// Signal that no more audio will be sent. The receive loop keeps
    /// running until `final` or `error` arrives.
    async fn end(&self) -> Result<()>;

    /// Cancel the session immediately. Idempotent; pending callbacks may or
    /// may not fire.
    async fn close(&self);

    /// Block until the receive loop terminates.
    async fn wait(&self);
}

/// Port trait for opening streaming sessions
#[async_trait]
pub trait StreamingTranscriberPort: Send + Sync {
    /// Open the channel, send the session config, and start the receive
    /// loop dispatching to `callback`.
    async fn connect(
        &self,
        callback: Box<dyn StreamingCallback>,
    ) -> Result<Box<dyn StreamingSessionHandle>>;
}
