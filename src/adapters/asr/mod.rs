//! Speech-to-text service adapters
//!
//! Two transport variants over the configured provider:
//! - batch: one-shot multipart upload of a complete WAV clip
//! - streaming: bidirectional WebSocket session emitting stable prefixes

pub mod batch;
pub mod streaming;

pub use batch::{HttpBatchTranscriber, MisconfiguredTranscriber};
pub use streaming::WsStreamingTranscriber;
