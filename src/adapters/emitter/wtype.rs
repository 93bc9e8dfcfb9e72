//! Wayland keystroke synthesizer backed by `wtype`

use super::run_command;
use crate::error::Result;
use crate::ports::emitter::TextEmitterPort;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Types text via `wtype` on a Wayland session
pub struct WtypeEmitter {
    /// Serializes emits; a later call never starts before an earlier one ends.
    order: Mutex<()>,
}

impl WtypeEmitter {
    pub fn new() -> Self {
        Self {
            order: Mutex::new(()),
        }
    }
}

impl Default for WtypeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEmitterPort for WtypeEmitter {
    async fn emit_full(&self, cancel: &CancellationToken, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let _order = self.order.lock().await;
        run_command(cancel, "wtype", ["--", text], None).await
    }

    async fn emit_incremental(&self, cancel: &CancellationToken, new_chars: &str) -> Result<()> {
        self.emit_full(cancel, new_chars).await
    }

    async fn backspace(&self, cancel: &CancellationToken, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let _order = self.order.lock().await;
        let mut args = Vec::with_capacity(count * 2);
        for _ in 0..count {
            args.push("-k");
            args.push("BackSpace");
        }
        run_command(cancel, "wtype", args, None).await
    }

    fn backend_name(&self) -> &'static str {
        "wtype"
    }
}
