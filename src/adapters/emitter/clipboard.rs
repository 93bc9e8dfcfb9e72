//! Clipboard-only fallback emitter
//!
//! Used when no keystroke synthesizer is available. Cannot type mid-stream:
//! incremental text accumulates in memory and reaches the clipboard in one
//! write on `commit` (or through `emit_full`). The user pastes manually.

use super::run_command;
use crate::error::Result;
use crate::ports::emitter::TextEmitterPort;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Writes text to the system clipboard via `wl-copy` or `xclip`
pub struct ClipboardEmitter {
    program: String,
    args: Vec<String>,
    pending: Mutex<String>,
}

impl ClipboardEmitter {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
            pending: Mutex::new(String::new()),
        }
    }

    async fn write_clipboard(&self, cancel: &CancellationToken, text: &str) -> Result<()> {
        run_command(cancel, &self.program, &self.args, Some(text.as_bytes())).await
    }
}

#[async_trait]
impl TextEmitterPort for ClipboardEmitter {
    async fn emit_full(&self, cancel: &CancellationToken, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.pending.lock().await.clear();
        self.write_clipboard(cancel, text).await
    }

    async fn emit_incremental(&self, _cancel: &CancellationToken, new_chars: &str) -> Result<()> {
        self.pending.lock().await.push_str(new_chars);
        Ok(())
    }

    async fn backspace(&self, _cancel: &CancellationToken, count: usize) -> Result<()> {
        let mut pending = self.pending.lock().await;
        for _ in 0..count {
            pending.pop();
        }
        Ok(())
    }

    async fn commit(&self, cancel: &CancellationToken) -> Result<()> {
        let accumulated = std::mem::take(&mut *self.pending.lock().await);
        if accumulated.is_empty() {
            return Ok(());
        }
        self.write_clipboard(cancel, &accumulated).await
    }

    fn backend_name(&self) -> &'static str {
        "clipboard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incremental_buffers_without_spawning() {
        // A nonexistent program proves no subprocess runs before commit.
        let emitter = ClipboardEmitter::new("no-such-clipboard-tool", vec![]);
        let cancel = CancellationToken::new();
        emitter.emit_incremental(&cancel, "hello ").await.unwrap();
        emitter.emit_incremental(&cancel, "world").await.unwrap();
        assert_eq!(*emitter.pending.lock().await, "hello world");
    }

    #[tokio::test]
    async fn test_backspace_trims_pending() {
        let emitter = ClipboardEmitter::new("no-such-clipboard-tool", vec![]);
        let cancel = CancellationToken::new();
        emitter.emit_incremental(&cancel, "abcd").await.unwrap();
        emitter.backspace(&cancel, 2).await.unwrap();
        assert_eq!(*emitter.pending.lock().await, "ab");
    }

    #[tokio::test]
    async fn test_commit_writes_accumulated_via_cat() {
        // `cat` consumes stdin and exits 0, standing in for wl-copy.
        let emitter = ClipboardEmitter::new("cat", vec![]);
        let cancel = CancellationToken::new();
        emitter.emit_incremental(&cancel, "buffered").await.unwrap();
        emitter.commit(&cancel).await.unwrap();
        assert!(emitter.pending.lock().await.is_empty());
    }
}
