/// Overlay peer port trait
///
/// The optional preview window is an externally launched process connected
/// over a second local socket. The service pushes text updates; the peer
/// answers with confirm or cancel.
use crate::error::Result;
use async_trait::async_trait;

/// Messages received from the overlay peer (or about it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    /// Emit the accumulated text and end the session.
    Confirm,
    /// End the session without emitting.
    Cancel,
    /// The peer connection dropped.
    Disconnected,
}

/// Port trait for the overlay peer
#[async_trait]
pub trait OverlayPort: Send + Sync {
    /// Whether a peer is currently connected.
    fn is_connected(&self) -> bool;

    async fn show(&self) -> Result<()>;

    async fn hide(&self) -> Result<()>;

    /// Forward a partial or final text update.
    async fn update(&self, text: &str, stable_len: usize) -> Result<()>;
}
