/// Notifier port trait
///
/// Publishes one evolving user-visible notification per state change.
/// Delivery failures are the adapter's problem to log; they never abort a
/// session, so these operations are infallible at the port boundary.
use crate::domain::models::ServiceState;
use async_trait::async_trait;

/// Identifier of a published notification slot.
pub type SlotId = u32;

/// Port trait for user-visible status notifications
#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Publish a notification for `state`, returning its slot id.
    /// `Recording` accepts an elapsed-duration detail formatted as `M:SS`.
    async fn publish(&self, state: ServiceState, detail: Option<String>) -> SlotId;

    /// Replace the content of an existing slot.
    async fn update(&self, slot: SlotId, state: ServiceState, detail: Option<String>);

    /// Remove a slot.
    async fn dismiss(&self, slot: SlotId);
}

/// Format an elapsed duration as `M:SS` for the recording notification body.
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
