/// Audio source port trait
///
/// Defines the interface for microphone capture. The Linux implementation
/// lives in adapters/audio/.
use crate::config::AudioConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Represents audio format specifications
#[derive(Debug, Clone)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz is standard for speech recognition
            channels: 1,        // Mono
            bits_per_sample: 16,
        }
    }
}

impl From<&AudioConfig> for AudioFormat {
    fn from(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bits_per_sample: config.bit_depth,
        }
    }
}

/// Where captured PCM blocks go.
///
/// Batch sessions accumulate into a shared buffer; streaming sessions
/// receive each block in production order over a channel.
#[derive(Clone)]
pub enum FrameSink {
    Buffer(Arc<Mutex<Vec<f32>>>),
    Blocks(mpsc::UnboundedSender<Vec<f32>>),
}

/// Out-of-band notifications from a running capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The configured max duration was hit; capture stopped itself and the
    /// accumulated audio is intact.
    MaxDurationReached,
}

/// What a stopped capture hands back.
#[derive(Debug)]
pub struct CaptureOutcome {
    /// Samples in capture order (normalized f32, interleaved by channel).
    pub samples: Vec<f32>,
    /// Elapsed time from start to stop.
    pub duration: Duration,
    /// Suggested location for the persisted audio artifact.
    pub path_hint: PathBuf,
}

/// Handle to one running capture session.
#[async_trait]
pub trait CaptureHandle: Send + Sync {
    /// Halt capture and return the accumulated samples.
    async fn stop(self: Box<Self>) -> Result<CaptureOutcome>;

    /// Time since capture started. Safe under concurrent observation.
    fn running_duration(&self) -> Duration;
}

/// Port trait for the audio source
#[async_trait]
pub trait AudioSourcePort: Send + Sync {
    /// Begin asynchronous capture from the default input device.
    ///
    /// Fails with `DeviceUnavailable` if the device cannot be opened. The
    /// `events` sender reports self-termination (max duration).
    async fn start(
        &self,
        sink: FrameSink,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureHandle>>;
}
