/// Text emitter port trait
///
/// Injects transcribed text at the cursor of the focused application.
/// Backends: Wayland keystrokes, X11 keystrokes, clipboard-only fallback.
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Port trait for text emission
///
/// Incremental emits preserve ordering: a second call never starts before
/// the first completes. Emits of empty text are no-ops. All operations
/// observe the ambient cancellation token and return `Cancelled` promptly.
#[async_trait]
pub trait TextEmitterPort: Send + Sync {
    /// Emit a complete string.
    async fn emit_full(&self, cancel: &CancellationToken, text: &str) -> Result<()>;

    /// Append characters after previously emitted text.
    async fn emit_incremental(&self, cancel: &CancellationToken, new_chars: &str) -> Result<()>;

    /// Erase the last `count` emitted characters.
    async fn backspace(&self, cancel: &CancellationToken, count: usize) -> Result<()>;

    /// Flush backend-buffered incremental text, if any. The clipboard
    /// fallback cannot type mid-stream and only writes here; keystroke
    /// backends have nothing to flush.
    async fn commit(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    /// Backend identifier for logs and status output.
    fn backend_name(&self) -> &'static str;
}
