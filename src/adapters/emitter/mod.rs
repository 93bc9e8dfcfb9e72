//! Text emitter backends
//!
//! Three interchangeable variants, probed once at service startup:
//! 1. `wtype` when running on a Wayland session
//! 2. `xdotool` when running on X11
//! 3. clipboard-only fallback (`wl-copy` / `xclip`) when no keystroke
//!    synthesizer is available

pub mod clipboard;
pub mod wtype;
pub mod xdotool;

pub use clipboard::ClipboardEmitter;
pub use wtype::WtypeEmitter;
pub use xdotool::XdotoolEmitter;

use crate::error::{AppError, Result};
use crate::ports::emitter::TextEmitterPort;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Pick the first available backend.
pub fn detect_backend() -> Result<Arc<dyn TextEmitterPort>> {
    let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
    let x11 = std::env::var_os("DISPLAY").is_some();

    if wayland && find_in_path("wtype").is_some() {
        log::info!("Text emitter: wtype (Wayland)");
        return Ok(Arc::new(WtypeEmitter::new()));
    }
    if x11 && find_in_path("xdotool").is_some() {
        log::info!("Text emitter: xdotool (X11)");
        return Ok(Arc::new(XdotoolEmitter::new()));
    }
    if wayland && find_in_path("wl-copy").is_some() {
        log::info!("Text emitter: clipboard fallback (wl-copy)");
        return Ok(Arc::new(ClipboardEmitter::new("wl-copy", vec![])));
    }
    if find_in_path("xclip").is_some() {
        log::info!("Text emitter: clipboard fallback (xclip)");
        return Ok(Arc::new(ClipboardEmitter::new(
            "xclip",
            vec!["-selection".to_string(), "clipboard".to_string()],
        )));
    }
    Err(AppError::TypingUnavailable)
}

/// Clipboard-only backend, regardless of keystroke availability. Used by
/// the `transcript last --clip` CLI path.
pub fn detect_clipboard() -> Result<ClipboardEmitter> {
    if std::env::var_os("WAYLAND_DISPLAY").is_some() && find_in_path("wl-copy").is_some() {
        return Ok(ClipboardEmitter::new("wl-copy", vec![]));
    }
    if find_in_path("xclip").is_some() {
        return Ok(ClipboardEmitter::new(
            "xclip",
            vec!["-selection".to_string(), "clipboard".to_string()],
        ));
    }
    Err(AppError::TypingUnavailable)
}

/// Stand-in installed when no backend probes successfully; every emit
/// surfaces `TypingUnavailable` so sessions fail visibly instead of
/// silently dropping text.
pub struct UnavailableEmitter;

#[async_trait::async_trait]
impl TextEmitterPort for UnavailableEmitter {
    async fn emit_full(&self, _cancel: &CancellationToken, _text: &str) -> Result<()> {
        Err(AppError::TypingUnavailable)
    }

    async fn emit_incremental(&self, _cancel: &CancellationToken, _new_chars: &str) -> Result<()> {
        Err(AppError::TypingUnavailable)
    }

    async fn backspace(&self, _cancel: &CancellationToken, _count: usize) -> Result<()> {
        Err(AppError::TypingUnavailable)
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}

/// Locate an executable on PATH.
pub(crate) fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Run an injection command to completion, killing it on cancellation.
pub(crate) async fn run_command<I, S>(
    cancel: &CancellationToken,
    program: &str,
    args: I,
    stdin_data: Option<&[u8]>,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args).stdout(Stdio::null()).stderr(Stdio::piped());
    command.stdin(if stdin_data.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = command
        .spawn()
        .map_err(|e| AppError::TypingFailed(format!("{} spawn: {}", program, e)))?;

    if let Some(data) = stdin_data {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::TypingFailed(format!("{}: no stdin", program)))?;
        stdin
            .write_all(data)
            .await
            .map_err(|e| AppError::TypingFailed(format!("{} stdin: {}", program, e)))?;
        drop(stdin);
    }

    let mut stderr_pipe = child.stderr.take();
    let status = tokio::select! {
        _ = cancel.cancelled() => None,
        status = child.wait() => Some(status),
    };
    let Some(status) = status else {
        let _ = child.kill().await;
        return Err(AppError::Cancelled);
    };
    let status =
        status.map_err(|e| AppError::TypingFailed(format!("{} wait: {}", program, e)))?;

    if status.success() {
        Ok(())
    } else {
        let mut stderr = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut stderr).await;
        }
        Err(AppError::TypingFailed(format!(
            "{} exited with {}: {}",
            program,
            status,
            stderr.trim()
        )))
    }
}
