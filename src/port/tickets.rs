use async_trait::async_trait;

use crate::domain::{
    ConversationId, EventId, NewTicket, RefundCorrelation, RefundResolution, RefundTransition,
    StoreError, Ticket, TicketId, UserId,
};

/// Persistent store of tickets.
///
/// Status changes are single atomic patches: the store applies the domain
/// transition inside its own critical section, so concurrent per-ticket
/// refund tasks and webhook handlers never observe a read-modify-write
/// window.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;

    async fn get(&self, ticket_id: &TicketId) -> Result<Option<Ticket>, StoreError>;

    /// Tickets with status `valid` or `used` for the event; already-refunded
    /// or never-purchased tickets are excluded from reprocessing.
    async fn list_refundable(&self, event_id: &EventId) -> Result<Vec<Ticket>, StoreError>;

    /// Indexed point lookup by the gateway's refund conversation id.
    async fn find_by_refund_conversation_id(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Ticket>, StoreError>;

    /// Atomically transition a ticket into `refund_pending`, recording the
    /// correlation keys. Fails if the ticket is not refundable.
    async fn mark_refund_pending(
        &self,
        ticket_id: &TicketId,
        correlation: RefundCorrelation,
    ) -> Result<Ticket, StoreError>;

    /// Atomically apply a webhook-delivered refund outcome.
    async fn resolve_refund(
        &self,
        ticket_id: &TicketId,
        resolution: RefundResolution,
    ) -> Result<RefundTransition, StoreError>;

    async fn find_for_user(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<Ticket>, StoreError>;
}
