use serde::{Deserialize, Serialize};

use super::ids::EventId;

/// The slice of an event listing this subsystem reads and writes. The refund
/// orchestrator is the sole writer of the cancellation flip, and flips it
/// only after every ticket in the batch has at least reached a pending or
/// terminal refund state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub name: String,
    pub is_cancelled: bool,
}
