//! Streaming transcription over a bidirectional WebSocket
//!
//! Session protocol: a `config` message, then base64 `audio` chunks with a
//! strictly increasing `seq`, then `end`. The server answers with zero or
//! more `partial` frames carrying a stable-prefix length, terminated by one
//! `final` (or `error`). Callbacks fire serially from the single receive
//! task.

use crate::config::StreamingConfig;
use crate::domain::models::{FinalUpdate, PartialUpdate};
use crate::error::{AppError, Result};
use crate::ports::transcription::{
    StreamingCallback, StreamingSessionHandle, StreamingTranscriberPort,
};
use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Config { chunk_frames: usize },
    Audio { data: String, seq: u64 },
    End,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ServerMessage {
    Partial {
        text: String,
        stable_len: usize,
        seq: u64,
    },
    Final {
        text: String,
    },
    Error {
        code: String,
        message: String,
    },
}

/// WebSocket streaming transcriber for the configured endpoint
pub struct WsStreamingTranscriber {
    endpoint: String,
    key: String,
    chunk_frames: usize,
}

impl WsStreamingTranscriber {
    pub fn new(streaming: &StreamingConfig, key: String) -> Self {
        Self {
            endpoint: streaming.endpoint.clone(),
            key,
            chunk_frames: streaming.chunk_frames,
        }
    }

    /// Session URL with the provider key as an authentication query parameter.
    fn session_url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, separator, self.key)
    }
}

/// One live WebSocket session
pub struct WsStreamingSession {
    sender: Arc<Mutex<Option<WsSink>>>,
    seq: AtomicU64,
    cancel: CancellationToken,
    /// Triggered when the receive loop terminates, for `wait`.
    done: CancellationToken,
    receiver_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[async_trait]
impl StreamingTranscriberPort for WsStreamingTranscriber {
    async fn connect(
        &self,
        callback: Box<dyn StreamingCallback>,
    ) -> Result<Box<dyn StreamingSessionHandle>> {
        let url = self.session_url();
        log::info!("Connecting streaming session to {}", self.endpoint);

        let (ws_stream, _) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| AppError::ProviderTransport("streaming handshake timed out".to_string()))?
            .map_err(|e| AppError::ProviderTransport(format!("streaming connect: {}", e)))?;

        let (mut write, mut read) = ws_stream.split();

        let config = serde_json::to_string(&ClientMessage::Config {
            chunk_frames: self.chunk_frames,
        })?;
        write
            .send(Message::Text(config))
            .await
            .map_err(|e| AppError::ProviderTransport(format!("streaming config send: {}", e)))?;

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let loop_done = done.clone();

        let receiver_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    message = read.next() => message,
                };
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(ServerMessage::Partial {
                                text,
                                stable_len,
                                seq,
                            }) => {
                                callback
                                    .on_partial(PartialUpdate {
                                        text,
                                        stable_len,
                                        seq,
                                    })
                                    .await;
                            }
                            Ok(ServerMessage::Final { text }) => {
                                callback.on_final(FinalUpdate { text }).await;
                                break;
                            }
                            Ok(ServerMessage::Error { code, message }) => {
                                callback.on_error(code, message).await;
                                break;
                            }
                            Err(e) => {
                                log::warn!("Undecodable streaming frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("Streaming channel closed by server");
                        callback
                            .on_error(
                                "closed".to_string(),
                                "channel closed before final".to_string(),
                            )
                            .await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        callback.on_error("transport".to_string(), e.to_string()).await;
                        break;
                    }
                }
            }
            loop_done.cancel();
        });

        Ok(Box::new(WsStreamingSession {
            sender: Arc::new(Mutex::new(Some(write))),
            seq: AtomicU64::new(0),
            cancel,
            done,
            receiver_task: std::sync::Mutex::new(Some(receiver_task)),
        }))
    }
}

impl WsStreamingSession {
    async fn send(&self, message: ClientMessage) -> Result<()> {
        let encoded = serde_json::to_string(&message)?;
        let mut sender = self.sender.lock().await;
        match sender.as_mut() {
            Some(ws) => ws
                .send(Message::Text(encoded))
                .await
                .map_err(|e| AppError::ProviderTransport(format!("streaming send: {}", e))),
            None => Err(AppError::ProviderTransport(
                "streaming session is closed".to_string(),
            )),
        }
    }
}

#[async_trait]
impl StreamingSessionHandle for WsStreamingSession {
    async fn send_audio(&self, pcm: &[u8]) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let data = base64::engine::general_purpose::STANDARD.encode(pcm);
        self.send(ClientMessage::Audio { data, seq }).await
    }

    async fn end(&self) -> Result<()> {
        self.send(ClientMessage::End).await
    }

    async fn close(&self) {
        self.cancel.cancel();
        let mut sender = self.sender.lock().await;
        if let Some(mut ws) = sender.take() {
            let _ = ws.send(Message::Close(None)).await;
            let _ = ws.close().await;
        }
    }

    async fn wait(&self) {
        self.done.cancelled().await;
    }
}

impl Drop for WsStreamingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.receiver_task.lock().unwrap().take() {
            task.abort();
        }
    }
}
