//! Desktop notification adapter
//!
//! One evolving notification per state change, replaced in place via the
//! server-assigned id. Delivery failures are logged and swallowed so a
//! headless session never breaks the pipeline.

use crate::domain::models::ServiceState;
use crate::ports::notifier::{NotifierPort, SlotId};
use async_trait::async_trait;
use notify_rust::{Notification, NotificationHandle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// (summary, body, icon) triplet for a state.
fn content(state: ServiceState, detail: Option<&str>) -> (String, String, &'static str) {
    match state {
        ServiceState::Idle => (
            "Voice typing".to_string(),
            "Ready".to_string(),
            "audio-input-microphone",
        ),
        ServiceState::Recording => (
            "Recording".to_string(),
            detail.unwrap_or("0:00").to_string(),
            "media-record",
        ),
        ServiceState::Transcribing => (
            "Transcribing".to_string(),
            "Uploading audio".to_string(),
            "emblem-synchronizing",
        ),
        ServiceState::Typing => (
            "Typing".to_string(),
            "Inserting text".to_string(),
            "input-keyboard",
        ),
        ServiceState::Streaming => (
            "Streaming".to_string(),
            detail.unwrap_or("Live transcription").to_string(),
            "media-record",
        ),
        ServiceState::Error => (
            "Voice typing error".to_string(),
            detail.unwrap_or("Unknown error").to_string(),
            "dialog-error",
        ),
    }
}

/// Desktop notifier
#[derive(Clone, Default)]
pub struct DesktopNotifier {
    handles: Arc<Mutex<HashMap<SlotId, NotificationHandle>>>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn show_and_store(
        handles: &Arc<Mutex<HashMap<SlotId, NotificationHandle>>>,
        id: Option<SlotId>,
        state: ServiceState,
        detail: Option<String>,
    ) -> SlotId {
        let (summary, body, icon) = content(state, detail.as_deref());
        let mut notification = Notification::new();
        notification
            .summary(&summary)
            .body(&body)
            .icon(icon)
            .appname("voicetyped");
        if let Some(id) = id {
            notification.id(id);
        }
        match notification.show() {
            Ok(handle) => {
                let id = handle.id();
                handles.lock().unwrap().insert(id, handle);
                id
            }
            Err(e) => {
                log::warn!("Notification delivery failed: {}", e);
                0
            }
        }
    }
}

#[async_trait]
impl NotifierPort for DesktopNotifier {
    async fn publish(&self, state: ServiceState, detail: Option<String>) -> SlotId {
        let handles = Arc::clone(&self.handles);
        tokio::task::spawn_blocking(move || Self::show_and_store(&handles, None, state, detail))
            .await
            .unwrap_or(0)
    }

    async fn update(&self, slot: SlotId, state: ServiceState, detail: Option<String>) {
        if slot == 0 {
            // Initial publish never reached the server; try fresh.
            let _ = self.publish(state, detail).await;
            return;
        }
        let handles = Arc::clone(&self.handles);
        let _ = tokio::task::spawn_blocking(move || {
            Self::show_and_store(&handles, Some(slot), state, detail)
        })
        .await;
    }

    async fn dismiss(&self, slot: SlotId) {
        let handle = self.handles.lock().unwrap().remove(&slot);
        if let Some(handle) = handle {
            let _ = tokio::task::spawn_blocking(move || handle.close()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_triplets() {
        let (summary, body, icon) = content(ServiceState::Recording, Some("1:07"));
        assert_eq!(summary, "Recording");
        assert_eq!(body, "1:07");
        assert_eq!(icon, "media-record");

        let (_, body, icon) = content(ServiceState::Error, Some("device unavailable"));
        assert_eq!(body, "device unavailable");
        assert_eq!(icon, "dialog-error");

        let (_, body, _) = content(ServiceState::Idle, None);
        assert_eq!(body, "Ready");
    }
}
