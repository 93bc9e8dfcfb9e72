//! Overlay peer socket
//!
//! A second local socket, distinct from the control socket, carrying the
//! optional preview window. Exactly one peer at a time; a second connect
//! attempt is refused. One JSON object per write in either direction; an
//! inbound object larger than the 4 KiB receive buffer is a protocol
//! violation and drops the peer.

use crate::error::{AppError, Result};
use crate::ports::overlay::{OverlayEvent, OverlayPort};
use crate::service::protocol::{OverlayInbound, OverlayOutbound};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

const RECV_BUFFER_BYTES: usize = 4096;

/// Shared overlay peer state, handed to the orchestrator as a port.
pub struct OverlayHub {
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
    events: mpsc::UnboundedSender<OverlayEvent>,
}

impl OverlayHub {
    async fn send(&self, message: &OverlayOutbound) -> Result<()> {
        let encoded = serde_json::to_vec(message)?;
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(half) => half
                .write_all(&encoded)
                .await
                .map_err(|e| AppError::OverlayFailed(format!("overlay write: {}", e))),
            None => Err(AppError::OverlayFailed("no overlay peer".to_string())),
        }
    }

    async fn drop_peer(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.writer.lock().await = None;
    }
}

#[async_trait]
impl OverlayPort for OverlayHub {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn show(&self) -> Result<()> {
        self.send(&OverlayOutbound::Show).await
    }

    async fn hide(&self) -> Result<()> {
        self.send(&OverlayOutbound::Hide).await
    }

    async fn update(&self, text: &str, stable_len: usize) -> Result<()> {
        self.send(&OverlayOutbound::Update {
            text: text.to_string(),
            stable_len,
        })
        .await
    }
}

/// Overlay-socket listener
pub struct OverlayServer {
    listener: UnixListener,
    path: PathBuf,
    hub: Arc<OverlayHub>,
}

impl OverlayServer {
    /// Bind the overlay socket, unlinking any stale path entry.
    pub fn bind(
        path: &Path,
    ) -> Result<(Self, Arc<OverlayHub>, mpsc::UnboundedReceiver<OverlayEvent>)> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                AppError::ConfigInvalid(format!(
                    "cannot remove stale socket {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }
        let listener = UnixListener::bind(path).map_err(|e| {
            AppError::ConfigInvalid(format!("cannot bind {}: {}", path.display(), e))
        })?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(OverlayHub {
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
            events: events_tx,
        });
        log::info!("Overlay socket listening at {}", path.display());
        Ok((
            Self {
                listener,
                path: path.to_path_buf(),
                hub: Arc::clone(&hub),
            },
            hub,
            events_rx,
        ))
    }

    /// Accept loop; one live peer at a time.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            let stream = match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    log::error!("Overlay accept failed: {}", e);
                    continue;
                }
            };
            if self.hub.is_connected() {
                log::warn!("Refusing second overlay peer");
                drop(stream);
                continue;
            }
            let (read_half, write_half) = stream.into_split();
            *self.hub.writer.lock().await = Some(write_half);
            self.hub.connected.store(true, Ordering::SeqCst);
            log::info!("Overlay peer connected");

            let hub = Arc::clone(&self.hub);
            tokio::spawn(async move {
                read_peer(read_half, hub).await;
            });
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::debug!("Overlay socket cleanup: {}", e);
        }
        log::info!("Overlay socket closed");
    }
}

async fn read_peer(mut read_half: OwnedReadHalf, hub: Arc<OverlayHub>) {
    let mut buffer = vec![0u8; RECV_BUFFER_BYTES];
    loop {
        match read_half.read(&mut buffer).await {
            Ok(0) => {
                log::info!("Overlay peer disconnected");
                break;
            }
            Ok(n) if n == buffer.len() => {
                log::error!("Overlay message exceeds {} bytes; dropping peer", n);
                break;
            }
            Ok(n) => match serde_json::from_slice::<OverlayInbound>(&buffer[..n]) {
                Ok(OverlayInbound::Confirm) => {
                    let _ = hub.events.send(OverlayEvent::Confirm);
                }
                Ok(OverlayInbound::Cancel) => {
                    let _ = hub.events.send(OverlayEvent::Cancel);
                }
                Err(e) => {
                    log::warn!("Undecodable overlay message: {}", e);
                }
            },
            Err(e) => {
                log::warn!("Overlay read failed: {}", e);
                break;
            }
        }
    }
    hub.drop_peer().await;
    let _ = hub.events.send(OverlayEvent::Disconnected);
}
