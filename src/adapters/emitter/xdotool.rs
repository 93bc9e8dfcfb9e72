//! X11 keystroke synthesizer backed by `xdotool`
//!
//! Invoked with `--clearmodifiers` so a still-held hotkey modifier does not
//! corrupt the synthesized keystrokes, and `--` so leading-dash text is not
//! parsed as options.

use super::run_command;
use crate::error::Result;
use crate::ports::emitter::TextEmitterPort;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Types text via `xdotool` on an X11 session
pub struct XdotoolEmitter {
    order: Mutex<()>,
}

impl XdotoolEmitter {
    pub fn new() -> Self {
        Self {
            order: Mutex::new(()),
        }
    }
}

impl Default for XdotoolEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEmitterPort for XdotoolEmitter {
    async fn emit_full(&self, cancel: &CancellationToken, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let _order = self.order.lock().await;
        run_command(
            cancel,
            "xdotool",
            ["type", "--clearmodifiers", "--", text],
            None,
        )
        .await
    }

    async fn emit_incremental(&self, cancel: &CancellationToken, new_chars: &str) -> Result<()> {
        self.emit_full(cancel, new_chars).await
    }

    async fn backspace(&self, cancel: &CancellationToken, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let _order = self.order.lock().await;
        let repeat = count.to_string();
        run_command(
            cancel,
            "xdotool",
            ["key", "--clearmodifiers", "--repeat", repeat.as_str(), "BackSpace"],
            None,
        )
        .await
    }

    fn backend_name(&self) -> &'static str {
        "xdotool"
    }
}
