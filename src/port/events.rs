use async_trait::async_trait;

use crate::domain::{EventId, EventRecord, StoreError};

/// Read/write access to the event listing slice this subsystem owns.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, event_id: &EventId) -> Result<Option<EventRecord>, StoreError>;

    async fn insert(&self, event: EventRecord) -> Result<(), StoreError>;

    /// Flip `is_cancelled`. Called only by the refund orchestrator, and only
    /// once every ticket in the batch reached a pending or terminal state.
    async fn mark_cancelled(&self, event_id: &EventId) -> Result<(), StoreError>;
}
