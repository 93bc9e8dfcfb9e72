//! State machine and pipeline orchestration
//!
//! Owns every component: sequences capture → transcribe → emit, routes
//! streaming partials under the stable-prefix rule, and maps failures to
//! state transitions. One exclusive lock covers the service state, the last
//! error, the session, and the typed-prefix cursor; background tasks
//! re-acquire it only at transition points and are guarded by a session
//! sequence number so stale tasks never act on a newer session.

use crate::config::{Config, Mode, StreamOutput};
use crate::domain::models::{PartialUpdate, ServiceState};
use crate::error::{AppError, Result};
use crate::ports::audio::{AudioFormat, AudioSourcePort, CaptureEvent, CaptureHandle, FrameSink};
use crate::ports::emitter::TextEmitterPort;
use crate::ports::notifier::{format_elapsed, NotifierPort, SlotId};
use crate::ports::overlay::{OverlayEvent, OverlayPort};
use crate::ports::storage::TranscriptStorePort;
use crate::ports::transcription::{
    BatchTranscriberPort, StreamingCallback, StreamingSessionHandle, StreamingTranscriberPort,
};
use crate::service::session::Session;
use crate::utils::wav;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

const ERROR_RECOVERY_DELAY: Duration = Duration::from_secs(5);
const NOTIFY_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// All collaborators, constructed by the composition root.
pub struct Components {
    pub audio: Arc<dyn AudioSourcePort>,
    pub batch: Arc<dyn BatchTranscriberPort>,
    pub streaming: Option<Arc<dyn StreamingTranscriberPort>>,
    pub emitter: Arc<dyn TextEmitterPort>,
    pub notifier: Arc<dyn NotifierPort>,
    pub store: Arc<dyn TranscriptStorePort>,
    pub overlay: Option<Arc<dyn OverlayPort>>,
}

/// Read-only snapshot for the `status` action.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state: ServiceState,
    pub uptime: Duration,
    pub recording_duration: Option<Duration>,
    pub last_error: Option<String>,
}

/// State guarded by the single service lock.
struct Shared {
    state: ServiceState,
    last_error: Option<String>,
    session: Option<Session>,
    /// Characters of the final text already emitted this session.
    typed_cursor: usize,
    notify_slot: SlotId,
    /// Incremented per session; background tasks compare before acting.
    session_seq: u64,
    /// Incremented per error; guards the 5-second recovery timer.
    error_seq: u64,
}

struct Inner {
    components: Components,
    config: Config,
    format: AudioFormat,
    model_name: Option<String>,
    started_at: Instant,
    shared: Mutex<Shared>,
}

/// The service orchestrator
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(config: Config, components: Components) -> Self {
        let format = AudioFormat::from(&config.audio);
        let model_name = config
            .api
            .providers
            .get(&config.api.active_provider)
            .and_then(|p| p.model.clone());
        Self {
            inner: Arc::new(Inner {
                components,
                format,
                model_name,
                config,
                started_at: Instant::now(),
                shared: Mutex::new(Shared {
                    state: ServiceState::Idle,
                    last_error: None,
                    session: None,
                    typed_cursor: 0,
                    notify_slot: 0,
                    session_seq: 0,
                    error_seq: 0,
                }),
            }),
        }
    }

    /// Idle → Recording. Rejected when a session is already active.
    pub async fn start(&self) -> Result<ServiceState> {
        let mut shared = self.inner.shared.lock().await;
        if shared.state != ServiceState::Idle {
            return Err(AppError::Other("already_recording".to_string()));
        }

        shared.session_seq += 1;
        let seq = shared.session_seq;
        let mut session = Session::new();
        let buffer = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let capture = match self
            .inner
            .components
            .audio
            .start(FrameSink::Buffer(buffer), event_tx)
            .await
        {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail_locked(&mut shared, e).await),
        };
        session.capture = Some(capture);

        shared.session = Some(session);
        shared.state = ServiceState::Recording;
        shared.typed_cursor = 0;
        shared.last_error = None;
        self.notify(&mut shared, ServiceState::Recording, Some("0:00".to_string()))
            .await;
        drop(shared);

        self.spawn_recording_refresh(seq);
        self.spawn_capture_event_listener(seq, event_rx);
        log::info!("Recording started");
        Ok(ServiceState::Recording)
    }

    /// Recording → Transcribing, or finish the audio leg of a streaming
    /// session.
    pub async fn stop(&self) -> Result<ServiceState> {
        let mut shared = self.inner.shared.lock().await;
        match shared.state {
            ServiceState::Recording => self.begin_transcribe_locked(&mut shared).await,
            ServiceState::Streaming => {
                self.end_streaming_capture_locked(&mut shared);
                Ok(ServiceState::Streaming)
            }
            _ => Err(AppError::Other("not recording".to_string())),
        }
    }

    /// Mode-dependent start/stop.
    pub async fn toggle(&self) -> Result<ServiceState> {
        let state = self.inner.shared.lock().await.state;
        match state {
            ServiceState::Idle => match self.inner.config.mode {
                Mode::Batch => self.start().await,
                Mode::Streaming => self.stream().await,
            },
            ServiceState::Recording | ServiceState::Streaming => self.stop().await,
            _ => Err(AppError::Other("busy".to_string())),
        }
    }

    /// Any → Idle. Idempotent; always succeeds.
    pub async fn cancel(&self) -> ServiceState {
        let mut shared = self.inner.shared.lock().await;
        let was = shared.state;
        if let Some(mut session) = shared.session.take() {
            session.cancel.cancel();
            let capture = session.capture.take();
            let streaming = session.streaming.take();
            tokio::spawn(async move {
                if let Some(capture) = capture {
                    let _ = capture.stop().await;
                }
                if let Some(streaming) = streaming {
                    streaming.close().await;
                    streaming.wait().await;
                }
            });
        }
        shared.state = ServiceState::Idle;
        shared.typed_cursor = 0;
        shared.last_error = None;
        if was != ServiceState::Idle {
            log::info!("Session cancelled (was {})", was);
            self.notify(&mut shared, ServiceState::Idle, None).await;
            if was == ServiceState::Streaming {
                self.overlay_hide();
            }
        }
        ServiceState::Idle
    }

    /// Idle → Streaming.
    pub async fn stream(&self) -> Result<ServiceState> {
        let streaming_port = match (&self.inner.components.streaming, self.inner.config.mode) {
            (Some(port), Mode::Streaming) => Arc::clone(port),
            _ => return Err(AppError::Other("streaming mode not configured".to_string())),
        };
        let output = self.inner.config.streaming.output;

        let seq;
        {
            let mut shared = self.inner.shared.lock().await;
            if shared.state != ServiceState::Idle {
                return Err(AppError::Other("already_recording".to_string()));
            }
            if output == StreamOutput::Overlay {
                let connected = self
                    .inner
                    .components
                    .overlay
                    .as_ref()
                    .map(|o| o.is_connected())
                    .unwrap_or(false);
                if !connected {
                    let err = AppError::OverlayFailed("no overlay peer connected".to_string());
                    return Err(self.fail_locked(&mut shared, err).await);
                }
            }

            shared.session_seq += 1;
            seq = shared.session_seq;
            shared.session = Some(Session::new());
            shared.state = ServiceState::Streaming;
            shared.typed_cursor = 0;
            shared.last_error = None;
            self.notify(&mut shared, ServiceState::Streaming, None).await;
        }

        // Connect off-lock; the handshake can take seconds and status
        // requests must not block behind it.
        let callback = Box::new(OrchestratorCallback {
            orchestrator: self.clone(),
            seq,
        });
        let connected = streaming_port.connect(callback).await;

        let mut shared = self.inner.shared.lock().await;
        if shared.session_seq != seq || shared.state != ServiceState::Streaming {
            // Cancelled while connecting.
            if let Ok(handle) = connected {
                let handle: Arc<dyn StreamingSessionHandle> = Arc::from(handle);
                tokio::spawn(async move { handle.close().await });
            }
            return Err(AppError::Cancelled);
        }
        let handle: Arc<dyn StreamingSessionHandle> = match connected {
            Ok(handle) => Arc::from(handle),
            Err(e) => return Err(self.fail_locked(&mut shared, e).await),
        };
        if let Some(session) = shared.session.as_mut() {
            session.streaming = Some(Arc::clone(&handle));
        }

        let (block_tx, block_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let capture = match self
            .inner
            .components
            .audio
            .start(FrameSink::Blocks(block_tx), event_tx)
            .await
        {
            Ok(capture) => capture,
            Err(e) => {
                let handle = Arc::clone(&handle);
                tokio::spawn(async move { handle.close().await });
                return Err(self.fail_locked(&mut shared, e).await);
            }
        };
        let cancel = if let Some(session) = shared.session.as_mut() {
            session.capture = Some(capture);
            session.cancel.clone()
        } else {
            return Err(AppError::Cancelled);
        };

        if output == StreamOutput::Overlay {
            if let Some(overlay) = &self.inner.components.overlay {
                if let Err(e) = overlay.show().await {
                    let err = self
                        .fail_locked(&mut shared, AppError::OverlayFailed(e.to_string()))
                        .await;
                    return Err(err);
                }
            }
        }
        drop(shared);

        self.spawn_forward_task(block_rx, handle, cancel);
        self.spawn_capture_event_listener(seq, event_rx);
        log::info!("Streaming session started ({:?} output)", output);
        Ok(ServiceState::Streaming)
    }

    /// Read-only snapshot for `status`.
    pub async fn status(&self) -> StatusReport {
        let shared = self.inner.shared.lock().await;
        let recording_duration = if shared.state == ServiceState::Recording {
            shared
                .session
                .as_ref()
                .and_then(|s| s.capture.as_ref())
                .map(|c| c.running_duration())
        } else {
            None
        };
        StatusReport {
            state: shared.state,
            uptime: self.inner.started_at.elapsed(),
            recording_duration,
            last_error: shared.last_error.clone(),
        }
    }

    /// Cancel any active session and dismiss the notification.
    pub async fn shutdown(&self) {
        self.cancel().await;
        let slot = self.inner.shared.lock().await.notify_slot;
        if slot != 0 {
            self.inner.components.notifier.dismiss(slot).await;
        }
        log::info!("Orchestrator shut down");
    }

    /// Route overlay peer events into the state machine.
    pub fn attach_overlay_events(&self, mut events: mpsc::UnboundedReceiver<OverlayEvent>) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    OverlayEvent::Confirm => orchestrator.overlay_confirm().await,
                    OverlayEvent::Cancel => {
                        orchestrator.cancel().await;
                    }
                    OverlayEvent::Disconnected => orchestrator.overlay_disconnected().await,
                }
            }
        });
    }

    // ----- batch pipeline -----

    /// Caller holds the lock and has verified state == Recording.
    async fn begin_transcribe_locked(&self, shared: &mut Shared) -> Result<ServiceState> {
        let seq = shared.session_seq;
        let (capture, cancel) = {
            let session = shared
                .session
                .as_mut()
                .ok_or_else(|| AppError::Other("no active session".to_string()))?;
            let capture = session
                .capture
                .take()
                .ok_or_else(|| AppError::Other("capture already stopped".to_string()))?;
            (capture, session.cancel.clone())
        };
        shared.state = ServiceState::Transcribing;
        self.notify(shared, ServiceState::Transcribing, None).await;

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_batch_pipeline(seq, capture, cancel).await;
        });
        Ok(ServiceState::Transcribing)
    }

    async fn run_batch_pipeline(
        &self,
        seq: u64,
        capture: Box<dyn CaptureHandle>,
        cancel: CancellationToken,
    ) {
        let outcome = match capture.stop().await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail_if_current(seq, e).await,
        };
        // Clip length from the sample count; wall time only if the buffer
        // came back empty.
        let duration_ms = match wav::duration_ms(outcome.samples.len(), &self.inner.format) {
            0 => outcome.duration.as_millis() as i64,
            ms => ms,
        };
        log::info!(
            "Captured {} samples over {} ms",
            outcome.samples.len(),
            duration_ms
        );

        let wav_bytes = match wav::encode_wav(&outcome.samples, &self.inner.format) {
            Ok(bytes) => bytes,
            Err(e) => return self.fail_if_current(seq, e).await,
        };
        let audio_path = self.persist_artifact(&outcome.path_hint, &wav_bytes).await;
        let filename = outcome
            .path_hint
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.wav".to_string());

        let text = match self
            .inner
            .components
            .batch
            .transcribe(&cancel, wav_bytes, &filename, None, None)
            .await
        {
            Ok(text) => text,
            Err(e) if e.is_cancelled() => return,
            Err(e) => return self.fail_if_current(seq, e).await,
        };

        if !self
            .transition_if_current(seq, ServiceState::Transcribing, ServiceState::Typing)
            .await
        {
            return;
        }

        match self.inner.components.emitter.emit_full(&cancel, &text).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return,
            Err(e) => return self.fail_if_current(seq, e).await,
        }

        // Persistence failures never change service state.
        if let Err(e) = self
            .inner
            .components
            .store
            .append(
                duration_ms,
                &text,
                audio_path.as_deref(),
                self.inner.model_name.as_deref(),
            )
            .await
        {
            log::error!("Transcript append failed: {}", e);
        }

        self.finish_if_current(seq).await;
    }

    /// Write the artifact; failure is logged, not surfaced.
    async fn persist_artifact(&self, path: &PathBuf, wav_bytes: &[u8]) -> Option<String> {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                log::error!("Cannot create recordings dir: {}", e);
                return None;
            }
        }
        match tokio::fs::write(path, wav_bytes).await {
            Ok(()) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                log::error!("Cannot write audio artifact: {}", e);
                None
            }
        }
    }

    // ----- streaming routing -----

    async fn handle_partial(&self, seq: u64, update: PartialUpdate) {
        let mut shared = self.inner.shared.lock().await;
        if shared.session_seq != seq || shared.state != ServiceState::Streaming {
            return;
        }
        let output = self.inner.config.streaming.output;

        // Defensive clamp: the stable prefix never shrinks and never exceeds
        // the text.
        let text_chars = update.text.chars().count();
        let stable_len = {
            let Some(session) = shared.session.as_mut() else {
                return;
            };
            let stable_len = update
                .stable_len
                .min(text_chars)
                .max(session.last_stable_len);
            session.last_text = update.text.clone();
            session.last_stable_len = stable_len;
            stable_len
        };
        log::debug!(
            "Partial seq={} stable={} len={}",
            update.seq,
            stable_len,
            text_chars
        );

        match output {
            StreamOutput::Direct => {
                let cursor = shared.typed_cursor;
                if stable_len > cursor {
                    let delta: String = update
                        .text
                        .chars()
                        .skip(cursor)
                        .take(stable_len - cursor)
                        .collect();
                    shared.typed_cursor = stable_len;
                    let cancel = shared.session.as_ref().map(|s| s.cancel.clone());
                    drop(shared);
                    if let Some(cancel) = cancel {
                        match self
                            .inner
                            .components
                            .emitter
                            .emit_incremental(&cancel, &delta)
                            .await
                        {
                            Ok(()) => {}
                            Err(e) if e.is_cancelled() => {}
                            Err(e) => self.fail_if_current(seq, e).await,
                        }
                    }
                }
            }
            StreamOutput::Overlay => {
                let text = update.text.clone();
                drop(shared);
                if let Some(overlay) = &self.inner.components.overlay {
                    if let Err(e) = overlay.update(&text, stable_len).await {
                        self.fail_if_current(seq, AppError::OverlayFailed(e.to_string()))
                            .await;
                    }
                }
            }
        }
    }

    async fn handle_final(&self, seq: u64, text: String) {
        let mut shared = self.inner.shared.lock().await;
        if shared.session_seq != seq || shared.state != ServiceState::Streaming {
            return;
        }
        let output = self.inner.config.streaming.output;
        {
            let Some(session) = shared.session.as_mut() else {
                return;
            };
            session.last_text = text.clone();
        }

        match output {
            StreamOutput::Direct => {
                let cursor = shared.typed_cursor;
                let total = text.chars().count();
                let tail: String = text.chars().skip(cursor).collect();
                shared.typed_cursor = total.max(cursor);
                let cancel = shared
                    .session
                    .as_ref()
                    .map(|s| s.cancel.clone())
                    .unwrap_or_default();
                let duration_ms = shared
                    .session
                    .as_ref()
                    .map(|s| s.started.elapsed().as_millis() as i64)
                    .unwrap_or(0);
                drop(shared);

                if !tail.is_empty() {
                    match self
                        .inner
                        .components
                        .emitter
                        .emit_incremental(&cancel, &tail)
                        .await
                    {
                        Ok(()) => {}
                        Err(e) if e.is_cancelled() => return,
                        Err(e) => return self.fail_if_current(seq, e).await,
                    }
                }
                // Flush the clipboard fallback's accumulated text, if that
                // backend is active.
                match self.inner.components.emitter.commit(&cancel).await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => return,
                    Err(e) => return self.fail_if_current(seq, e).await,
                }

                if let Err(e) = self
                    .inner
                    .components
                    .store
                    .append(duration_ms, &text, None, None)
                    .await
                {
                    log::error!("Transcript append failed: {}", e);
                }
                self.finish_if_current(seq).await;
            }
            StreamOutput::Overlay => {
                // Forward and wait for the peer's confirm/cancel.
                let stable_len = text.chars().count();
                drop(shared);
                if let Some(overlay) = &self.inner.components.overlay {
                    if let Err(e) = overlay.update(&text, stable_len).await {
                        self.fail_if_current(seq, AppError::OverlayFailed(e.to_string()))
                            .await;
                    }
                }
            }
        }
    }

    async fn handle_stream_error(&self, seq: u64, code: String, message: String) {
        self.fail_if_current(
            seq,
            AppError::Other(format!("streaming error {}: {}", code, message)),
        )
        .await;
    }

    async fn overlay_confirm(&self) {
        let mut shared = self.inner.shared.lock().await;
        if shared.state != ServiceState::Streaming {
            return;
        }
        let seq = shared.session_seq;
        let Some(session) = shared.session.as_mut() else {
            return;
        };
        let text = session.last_text.clone();
        let cancel = session.cancel.clone();
        let duration_ms = session.started.elapsed().as_millis() as i64;
        let capture = session.capture.take();
        let streaming = session.streaming.take();
        tokio::spawn(async move {
            if let Some(capture) = capture {
                let _ = capture.stop().await;
            }
            if let Some(streaming) = streaming {
                streaming.close().await;
            }
        });
        drop(shared);
        self.overlay_hide();

        match self.inner.components.emitter.emit_full(&cancel, &text).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return,
            Err(e) => return self.fail_if_current(seq, e).await,
        }
        if let Err(e) = self
            .inner
            .components
            .store
            .append(duration_ms, &text, None, None)
            .await
        {
            log::error!("Transcript append failed: {}", e);
        }
        self.finish_if_current(seq).await;
    }

    async fn overlay_disconnected(&self) {
        let mut shared = self.inner.shared.lock().await;
        if shared.state == ServiceState::Streaming
            && self.inner.config.streaming.output == StreamOutput::Overlay
        {
            let _ = self
                .fail_locked(
                    &mut shared,
                    AppError::OverlayFailed("overlay peer disconnected".to_string()),
                )
                .await;
        }
    }

    fn overlay_hide(&self) {
        if let Some(overlay) = &self.inner.components.overlay {
            let overlay = Arc::clone(overlay);
            tokio::spawn(async move {
                let _ = overlay.hide().await;
            });
        }
    }

    // ----- background task plumbing -----

    fn spawn_recording_refresh(&self, seq: u64) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(NOTIFY_REFRESH_PERIOD).await;
                let shared = orchestrator.inner.shared.lock().await;
                // Reschedule only while still recording this session.
                if shared.state != ServiceState::Recording || shared.session_seq != seq {
                    break;
                }
                let elapsed = shared
                    .session
                    .as_ref()
                    .and_then(|s| s.capture.as_ref())
                    .map(|c| c.running_duration())
                    .unwrap_or_default();
                let slot = shared.notify_slot;
                drop(shared);
                orchestrator
                    .inner
                    .components
                    .notifier
                    .update(slot, ServiceState::Recording, Some(format_elapsed(elapsed)))
                    .await;
            }
        });
    }

    fn spawn_capture_event_listener(
        &self,
        seq: u64,
        mut events: mpsc::UnboundedReceiver<CaptureEvent>,
    ) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    CaptureEvent::MaxDurationReached => {
                        log::warn!("{}; proceeding with captured audio", AppError::CaptureTimeout);
                        orchestrator.stop_if_current(seq).await;
                    }
                }
            }
        });
    }

    fn spawn_forward_task(
        &self,
        mut blocks: mpsc::UnboundedReceiver<Vec<f32>>,
        handle: Arc<dyn StreamingSessionHandle>,
        cancel: CancellationToken,
    ) {
        let chunk_frames = self.inner.config.streaming.chunk_frames.max(1);
        tokio::spawn(async move {
            let mut pending: Vec<u8> = Vec::new();
            let mut block_count = 0usize;
            loop {
                let block = tokio::select! {
                    _ = cancel.cancelled() => return,
                    block = blocks.recv() => block,
                };
                match block {
                    Some(samples) => {
                        pending.reserve(samples.len() * 2);
                        for sample in samples {
                            pending.extend_from_slice(&wav::quantize(sample).to_le_bytes());
                        }
                        block_count += 1;
                        if block_count >= chunk_frames {
                            if let Err(e) = handle.send_audio(&pending).await {
                                log::warn!("Audio chunk send failed: {}", e);
                            }
                            pending.clear();
                            block_count = 0;
                        }
                    }
                    None => {
                        // Capture ended: flush and signal end-of-audio. The
                        // receive loop stays alive until final arrives.
                        if !pending.is_empty() {
                            if let Err(e) = handle.send_audio(&pending).await {
                                log::warn!("Final audio chunk send failed: {}", e);
                            }
                        }
                        if let Err(e) = handle.end().await {
                            log::warn!("End-of-audio send failed: {}", e);
                        }
                        return;
                    }
                }
            }
        });
    }

    /// `stop` semantics driven by the capture's self-termination.
    async fn stop_if_current(&self, seq: u64) {
        let mut shared = self.inner.shared.lock().await;
        if shared.session_seq != seq {
            return;
        }
        match shared.state {
            ServiceState::Recording => {
                if let Err(e) = self.begin_transcribe_locked(&mut shared).await {
                    log::error!("Auto-stop failed: {}", e);
                }
            }
            ServiceState::Streaming => self.end_streaming_capture_locked(&mut shared),
            _ => {}
        }
    }

    /// Stop the audio leg of a streaming session; end-of-audio flows from
    /// the forward task once the capture's sender drops.
    fn end_streaming_capture_locked(&self, shared: &mut Shared) {
        if let Some(session) = shared.session.as_mut() {
            if let Some(capture) = session.capture.take() {
                tokio::spawn(async move {
                    let _ = capture.stop().await;
                });
            }
        }
    }

    // ----- guarded transitions -----

    async fn notify(&self, shared: &mut Shared, state: ServiceState, detail: Option<String>) {
        if shared.notify_slot == 0 {
            shared.notify_slot = self.inner.components.notifier.publish(state, detail).await;
        } else {
            self.inner
                .components
                .notifier
                .update(shared.notify_slot, state, detail)
                .await;
        }
    }

    async fn transition_if_current(
        &self,
        seq: u64,
        from: ServiceState,
        to: ServiceState,
    ) -> bool {
        let mut shared = self.inner.shared.lock().await;
        if shared.session_seq != seq || shared.state != from {
            return false;
        }
        shared.state = to;
        self.notify(&mut shared, to, None).await;
        true
    }

    /// Successful session completion: release the session, return to idle.
    async fn finish_if_current(&self, seq: u64) {
        let mut shared = self.inner.shared.lock().await;
        if shared.session_seq != seq {
            return;
        }
        shared.session = None;
        shared.state = ServiceState::Idle;
        shared.typed_cursor = 0;
        shared.last_error = None;
        self.notify(&mut shared, ServiceState::Idle, None).await;
        log::info!("Session complete");
    }

    async fn fail_if_current(&self, seq: u64, err: AppError) {
        let mut shared = self.inner.shared.lock().await;
        if shared.session_seq != seq || !shared.state.has_session() {
            return;
        }
        let _ = self.fail_locked(&mut shared, err).await;
    }

    /// Transition to Error, publish, and schedule the 5-second recovery to
    /// Idle. Returns the error for the caller's response.
    async fn fail_locked(&self, shared: &mut Shared, err: AppError) -> AppError {
        log::error!("Session failed: {}", err);
        let message = err.to_string();
        shared.session = None;
        shared.state = ServiceState::Error;
        shared.last_error = Some(message.clone());
        shared.error_seq += 1;
        let error_seq = shared.error_seq;
        self.notify(shared, ServiceState::Error, Some(message)).await;

        let orchestrator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ERROR_RECOVERY_DELAY).await;
            let mut shared = orchestrator.inner.shared.lock().await;
            if shared.state == ServiceState::Error && shared.error_seq == error_seq {
                shared.state = ServiceState::Idle;
                // last_error stays visible to `status` until the next
                // successful state change.
                orchestrator
                    .notify(&mut shared, ServiceState::Idle, None)
                    .await;
            }
        });
        err
    }
}

/// Bridges the streaming transcriber's callbacks into the state machine.
struct OrchestratorCallback {
    orchestrator: Orchestrator,
    seq: u64,
}

#[async_trait]
impl StreamingCallback for OrchestratorCallback {
    async fn on_partial(&self, update: PartialUpdate) {
        self.orchestrator.handle_partial(self.seq, update).await;
    }

    async fn on_final(&self, update: crate::domain::models::FinalUpdate) {
        self.orchestrator.handle_final(self.seq, update.text).await;
    }

    async fn on_error(&self, code: String, message: String) {
        self.orchestrator
            .handle_stream_error(self.seq, code, message)
            .await;
    }
}
