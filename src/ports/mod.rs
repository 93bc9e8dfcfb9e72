/// Port trait definitions (interfaces)
///
/// These traits define the contracts for adapters to implement.
/// Following the ports-and-adapters (hexagonal) architecture pattern.
pub mod audio;
pub mod emitter;
pub mod notifier;
pub mod overlay;
pub mod storage;
pub mod transcription;

#[cfg(test)]
pub mod mocks;

pub use audio::{AudioFormat, AudioSourcePort, CaptureEvent, CaptureHandle, CaptureOutcome, FrameSink};
pub use emitter::TextEmitterPort;
pub use notifier::{NotifierPort, SlotId};
pub use overlay::{OverlayEvent, OverlayPort};
pub use storage::TranscriptStorePort;
pub use transcription::{
    BatchTranscriberPort, StreamingCallback, StreamingSessionHandle, StreamingTranscriberPort,
};
