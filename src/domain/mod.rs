/// Domain layer - core data model
///
/// Platform-agnostic types shared by the service, adapters, and the client.
pub mod models;

pub use models::{FinalUpdate, PartialUpdate, ServiceState, TranscriptRecord};
