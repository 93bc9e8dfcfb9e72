/// Transcript store port trait
///
/// Append-only persistent log of completed transcripts, newest first.
use crate::domain::models::TranscriptRecord;
use crate::error::Result;
use async_trait::async_trait;

/// Port trait for transcript persistence
#[async_trait]
pub trait TranscriptStorePort: Send + Sync {
    /// Append one completed transcript; returns the new record id.
    async fn append(
        &self,
        duration_ms: i64,
        text: &str,
        audio_path: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<i64>;

    /// The most recent record, if any.
    async fn get_last(&self) -> Result<Option<TranscriptRecord>>;

    /// Records in timestamp-descending order, optionally limited.
    async fn list(&self, limit: Option<u32>) -> Result<Vec<TranscriptRecord>>;
}
