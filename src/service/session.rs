//! The in-progress work item
//!
//! At most one session exists at any time: created on the transition out of
//! idle, destroyed on the return to idle. It owns the cancellation handle
//! propagated to all background work for the session.

use crate::ports::audio::CaptureHandle;
use crate::ports::transcription::StreamingSessionHandle;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct Session {
    /// Cancellation handle observed by every background task of this session.
    pub cancel: CancellationToken,
    /// Recording start timestamp.
    pub started: Instant,
    /// Live capture, present while audio is being read.
    pub capture: Option<Box<dyn CaptureHandle>>,
    /// Live streaming transcriber, present in streaming sessions.
    pub streaming: Option<Arc<dyn StreamingSessionHandle>>,
    /// Cumulative text of the latest streaming update.
    pub last_text: String,
    /// Highest stable prefix length observed so far (characters).
    pub last_stable_len: usize,
}

impl Session {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            started: Instant::now(),
            capture: None,
            streaming: None,
            last_text: String::new(),
            last_stable_len: 0,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // A dropped session can leave no background work running.
        self.cancel.cancel();
    }
}
