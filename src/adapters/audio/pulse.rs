//! Linux PulseAudio capture implementation
//!
//! Records from the default input source in fixed-size blocks. Capture runs
//! on a blocking task; the handle owns a running flag observed between reads,
//! so stop requests complete promptly even during a read-error storm.

use crate::config::AudioConfig;
use crate::error::{AppError, Result};
use crate::ports::audio::{
    AudioFormat, AudioSourcePort, CaptureEvent, CaptureHandle, CaptureOutcome, FrameSink,
};
use crate::utils::wav;
use async_trait::async_trait;
use chrono::Local;
use libpulse_binding::sample::{Format, Spec};
use libpulse_binding::stream::Direction;
use libpulse_simple_binding::Simple;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// PulseAudio microphone source
pub struct PulseAudioSource {
    config: AudioConfig,
    data_dir: PathBuf,
}

impl PulseAudioSource {
    pub fn new(config: AudioConfig, data_dir: PathBuf) -> Self {
        Self { config, data_dir }
    }

    /// Convert audio samples from i16 to f32 normalized format
    fn convert_samples(samples: &[i16]) -> Vec<f32> {
        samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }
}

struct PulseCaptureHandle {
    running: Arc<Mutex<bool>>,
    buffer: Arc<Mutex<Vec<f32>>>,
    started: Instant,
    path_hint: PathBuf,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for PulseCaptureHandle {
    fn drop(&mut self) {
        // A handle dropped without stop() must still halt the reader.
        *self.running.lock().unwrap() = false;
    }
}

#[async_trait]
impl CaptureHandle for PulseCaptureHandle {
    async fn stop(mut self: Box<Self>) -> Result<CaptureOutcome> {
        {
            let mut running = self.running.lock().unwrap();
            *running = false;
        }
        if let Some(join) = self.join.take() {
            join.await
                .map_err(|e| AppError::AudioCapture(format!("capture task join: {}", e)))?;
        }
        let samples = std::mem::take(&mut *self.buffer.lock().unwrap());
        let path_hint = std::mem::take(&mut self.path_hint);
        Ok(CaptureOutcome {
            samples,
            duration: self.started.elapsed(),
            path_hint,
        })
    }

    fn running_duration(&self) -> Duration {
        self.started.elapsed()
    }
}

#[async_trait]
impl AudioSourcePort for PulseAudioSource {
    async fn start(
        &self,
        sink: FrameSink,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureHandle>> {
        let spec = Spec {
            format: Format::S16le,
            channels: self.config.channels as u8,
            rate: self.config.sample_rate,
        };
        if !spec.is_valid() {
            return Err(AppError::DeviceUnavailable(format!(
                "invalid sample spec: {} Hz, {} channels",
                self.config.sample_rate, self.config.channels
            )));
        }

        let running = Arc::new(Mutex::new(true));
        // Batch sessions accumulate into the caller's buffer; streaming
        // forwards blocks and keeps no back-buffer.
        let buffer: Arc<Mutex<Vec<f32>>> = match &sink {
            FrameSink::Buffer(shared) => Arc::clone(shared),
            FrameSink::Blocks(_) => Arc::new(Mutex::new(Vec::new())),
        };
        let started = Instant::now();
        let path_hint = wav::artifact_path(&self.data_dir, Local::now());

        let frames_per_block = self.config.frames_per_block;
        let max_duration = self.config.max_duration();
        let running_task = Arc::clone(&running);
        let buffer_task = Arc::clone(&buffer);
        let (open_tx, open_rx) = oneshot::channel::<Result<()>>();

        let join = tokio::task::spawn_blocking(move || {
            let simple = match Simple::new(
                None,               // default server
                "voicetyped",      // application name
                Direction::Record, // recording from the default source
                None,              // default input device
                "voice capture",   // stream description
                &spec,
                None, // default channel map
                None, // default buffering attributes
            ) {
                Ok(s) => s,
                Err(e) => {
                    let _ = open_tx.send(Err(AppError::DeviceUnavailable(format!("{}", e))));
                    return;
                }
            };
            let _ = open_tx.send(Ok(()));

            log::info!(
                "Capture started: {} Hz, {} channel(s), {} frames/block",
                spec.rate,
                spec.channels,
                frames_per_block
            );

            // 2 bytes per sample at S16LE.
            let block_bytes = frames_per_block * spec.channels as usize * 2;
            let mut read_buffer = vec![0u8; block_bytes];
            let loop_started = Instant::now();

            while *running_task.lock().unwrap() {
                match simple.read(&mut read_buffer) {
                    Ok(()) => {
                        let mut i16_samples = Vec::with_capacity(block_bytes / 2);
                        for chunk in read_buffer.chunks_exact(2) {
                            i16_samples.push(i16::from_le_bytes([chunk[0], chunk[1]]));
                        }
                        let block = Self::convert_samples(&i16_samples);
                        match &sink {
                            FrameSink::Buffer(_) => {
                                buffer_task.lock().unwrap().extend_from_slice(&block);
                            }
                            FrameSink::Blocks(tx) => {
                                if tx.send(block).is_err() {
                                    log::debug!(
                                        "Frame receiver dropped; capture continues until stop"
                                    );
                                }
                            }
                        }
                    }
                    Err(e) => {
                        // Read errors are skipped while the session lives;
                        // the running flag is re-checked next iteration.
                        log::warn!("Audio read failed, retrying: {}", e);
                        continue;
                    }
                }

                if loop_started.elapsed() >= max_duration {
                    log::info!(
                        "Max capture duration reached after {:?}",
                        loop_started.elapsed()
                    );
                    *running_task.lock().unwrap() = false;
                    let _ = events.send(CaptureEvent::MaxDurationReached);
                    break;
                }
            }

            log::info!("Capture stopped");
        });

        match open_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                join.abort();
                return Err(e);
            }
            Err(_) => {
                return Err(AppError::DeviceUnavailable(
                    "capture task exited before opening the device".to_string(),
                ));
            }
        }

        Ok(Box::new(PulseCaptureHandle {
            running,
            buffer,
            started,
            path_hint,
            join: Some(join),
        }))
    }
}
