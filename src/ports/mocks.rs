//! Mock implementations for testing

use crate::domain::models::{ServiceState, TranscriptRecord};
use crate::error::{AppError, Result};
use crate::ports::audio::{
    AudioSourcePort, CaptureEvent, CaptureHandle, CaptureOutcome, FrameSink,
};
use crate::ports::emitter::TextEmitterPort;
use crate::ports::notifier::{NotifierPort, SlotId};
use crate::ports::storage::TranscriptStorePort;
use crate::ports::transcription::{
    BatchTranscriberPort, StreamingCallback, StreamingSessionHandle, StreamingTranscriberPort,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Mock audio source producing canned samples
#[derive(Clone)]
pub struct MockAudioSource {
    pub samples: Vec<f32>,
    pub fail_start: bool,
    /// Duration reported by `stop` regardless of wall time.
    pub reported_duration: Duration,
    /// Captured copy of the event sender, for driving max-duration tests.
    pub event_tx: Arc<Mutex<Option<mpsc::UnboundedSender<CaptureEvent>>>>,
}

impl MockAudioSource {
    pub fn new(samples: Vec<f32>, reported_duration: Duration) -> Self {
        Self {
            samples,
            fail_start: false,
            reported_duration,
            event_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn failing() -> Self {
        Self {
            samples: Vec::new(),
            fail_start: true,
            reported_duration: Duration::ZERO,
            event_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Simulate the capture hitting its max duration.
    pub fn fire_max_duration(&self) {
        if let Some(tx) = self.event_tx.lock().unwrap().as_ref() {
            let _ = tx.send(CaptureEvent::MaxDurationReached);
        }
    }
}

struct MockCaptureHandle {
    samples: Vec<f32>,
    reported_duration: Duration,
    started: Instant,
}

#[async_trait]
impl CaptureHandle for MockCaptureHandle {
    async fn stop(self: Box<Self>) -> Result<CaptureOutcome> {
        Ok(CaptureOutcome {
            samples: self.samples,
            duration: self.reported_duration,
            path_hint: PathBuf::from("/tmp/mock-recording.wav"),
        })
    }

    fn running_duration(&self) -> Duration {
        self.started.elapsed()
    }
}

#[async_trait]
impl AudioSourcePort for MockAudioSource {
    async fn start(
        &self,
        sink: FrameSink,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureHandle>> {
        if self.fail_start {
            return Err(AppError::DeviceUnavailable("mock device".to_string()));
        }
        *self.event_tx.lock().unwrap() = Some(events);
        match &sink {
            FrameSink::Buffer(buffer) => {
                buffer.lock().unwrap().extend_from_slice(&self.samples);
            }
            FrameSink::Blocks(tx) => {
                if !self.samples.is_empty() {
                    let _ = tx.send(self.samples.clone());
                }
            }
        }
        Ok(Box::new(MockCaptureHandle {
            samples: self.samples.clone(),
            reported_duration: self.reported_duration,
            started: Instant::now(),
        }))
    }
}

/// Mock batch transcriber with a scripted response queue
#[derive(Clone, Default)]
pub struct MockBatchTranscriber {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    pub delay: Option<Duration>,
    pub calls: Arc<Mutex<usize>>,
}

impl MockBatchTranscriber {
    pub fn returning(text: &str) -> Self {
        let mock = Self::default();
        mock.push(Ok(text.to_string()));
        mock
    }

    pub fn push(&self, response: Result<String>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl BatchTranscriberPort for MockBatchTranscriber {
    async fn transcribe(
        &self,
        cancel: &CancellationToken,
        _audio: Vec<u8>,
        _filename: &str,
        _model: Option<&str>,
        _language: Option<&str>,
    ) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Every observable emitter interaction, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitCall {
    Full(String),
    Incremental(String),
    Backspace(usize),
    Commit,
}

/// Mock emitter recording all calls
#[derive(Clone, Default)]
pub struct MockEmitter {
    pub calls: Arc<Mutex<Vec<EmitCall>>>,
    pub fail: bool,
}

impl MockEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn recorded(&self) -> Vec<EmitCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextEmitterPort for MockEmitter {
    async fn emit_full(&self, cancel: &CancellationToken, text: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.fail {
            return Err(AppError::TypingFailed("mock failure".to_string()));
        }
        if !text.is_empty() {
            self.calls
                .lock()
                .unwrap()
                .push(EmitCall::Full(text.to_string()));
        }
        Ok(())
    }

    async fn emit_incremental(&self, cancel: &CancellationToken, new_chars: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.fail {
            return Err(AppError::TypingFailed("mock failure".to_string()));
        }
        if !new_chars.is_empty() {
            self.calls
                .lock()
                .unwrap()
                .push(EmitCall::Incremental(new_chars.to_string()));
        }
        Ok(())
    }

    async fn backspace(&self, _cancel: &CancellationToken, count: usize) -> Result<()> {
        if count > 0 {
            self.calls.lock().unwrap().push(EmitCall::Backspace(count));
        }
        Ok(())
    }

    async fn commit(&self, _cancel: &CancellationToken) -> Result<()> {
        self.calls.lock().unwrap().push(EmitCall::Commit);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Mock notifier recording published states
#[derive(Clone, Default)]
pub struct MockNotifier {
    pub published: Arc<Mutex<Vec<(ServiceState, Option<String>)>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<ServiceState> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(s, _)| *s)
            .collect()
    }
}

#[async_trait]
impl NotifierPort for MockNotifier {
    async fn publish(&self, state: ServiceState, detail: Option<String>) -> SlotId {
        let mut published = self.published.lock().unwrap();
        published.push((state, detail));
        published.len() as SlotId
    }

    async fn update(&self, _slot: SlotId, state: ServiceState, detail: Option<String>) {
        self.published.lock().unwrap().push((state, detail));
    }

    async fn dismiss(&self, _slot: SlotId) {}
}

/// In-memory transcript store
#[derive(Clone, Default)]
pub struct MockStore {
    pub records: Arc<Mutex<Vec<TranscriptRecord>>>,
    pub fail_append: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            fail_append: true,
        }
    }
}

#[async_trait]
impl TranscriptStorePort for MockStore {
    async fn append(
        &self,
        duration_ms: i64,
        text: &str,
        audio_path: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<i64> {
        if self.fail_append {
            return Err(AppError::PersistenceFailed("mock store".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let id = records.len() as i64 + 1;
        records.push(TranscriptRecord {
            id: Some(id),
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_ms: Some(duration_ms),
            text: text.to_string(),
            audio_path: audio_path.map(str::to_string),
            model_name: model_name.map(str::to_string),
        });
        Ok(id)
    }

    async fn get_last(&self) -> Result<Option<TranscriptRecord>> {
        Ok(self.records.lock().unwrap().last().cloned())
    }

    async fn list(&self, limit: Option<u32>) -> Result<Vec<TranscriptRecord>> {
        let records = self.records.lock().unwrap();
        let mut list: Vec<_> = records.iter().rev().cloned().collect();
        if let Some(limit) = limit {
            list.truncate(limit as usize);
        }
        Ok(list)
    }
}

/// Mock overlay peer
#[derive(Clone)]
pub struct MockOverlay {
    pub connected: Arc<std::sync::atomic::AtomicBool>,
    pub updates: Arc<Mutex<Vec<(String, usize)>>>,
    pub shown: Arc<std::sync::atomic::AtomicBool>,
    pub hidden: Arc<std::sync::atomic::AtomicBool>,
}

impl MockOverlay {
    pub fn with_peer() -> Self {
        Self {
            connected: Arc::new(std::sync::atomic::AtomicBool::new(true)),
            updates: Arc::new(Mutex::new(Vec::new())),
            shown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            hidden: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl crate::ports::overlay::OverlayPort for MockOverlay {
    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn show(&self) -> Result<()> {
        self.shown.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn hide(&self) -> Result<()> {
        self.hidden.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, text: &str, stable_len: usize) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((text.to_string(), stable_len));
        Ok(())
    }
}

/// Mock streaming transcriber that hands the installed callback to the test
#[derive(Clone, Default)]
pub struct MockStreamingTranscriber {
    pub callback: Arc<Mutex<Option<Arc<dyn StreamingCallback>>>>,
    pub fail_connect: bool,
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub ended: Arc<Mutex<bool>>,
    pub closed: Arc<Mutex<bool>>,
}

impl MockStreamingTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    /// The callback installed by the orchestrator, for the test to drive.
    pub fn callback(&self) -> Arc<dyn StreamingCallback> {
        self.callback
            .lock()
            .unwrap()
            .clone()
            .expect("streaming session not connected")
    }
}

struct MockStreamingSession {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    ended: Arc<Mutex<bool>>,
    closed: Arc<Mutex<bool>>,
}

#[async_trait]
impl StreamingSessionHandle for MockStreamingSession {
    async fn send_audio(&self, pcm: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().push(pcm.to_vec());
        Ok(())
    }

    async fn end(&self) -> Result<()> {
        *self.ended.lock().unwrap() = true;
        Ok(())
    }

    async fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    async fn wait(&self) {}
}

#[async_trait]
impl StreamingTranscriberPort for MockStreamingTranscriber {
    async fn connect(
        &self,
        callback: Box<dyn StreamingCallback>,
    ) -> Result<Box<dyn StreamingSessionHandle>> {
        if self.fail_connect {
            return Err(AppError::ProviderTransport(
                "mock connect refused".to_string(),
            ));
        }
        *self.callback.lock().unwrap() = Some(Arc::from(callback));
        Ok(Box::new(MockStreamingSession {
            sent: Arc::clone(&self.sent),
            ended: Arc::clone(&self.ended),
            closed: Arc::clone(&self.closed),
        }))
    }
}
