use thiserror::Error;

use super::ids::TicketId;
use super::ticket::TicketStatus;

/// Persistence-layer failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("payment record not found")]
    PaymentNotFound,
    #[error("ticket not found")]
    TicketNotFound,
    #[error("event not found")]
    EventNotFound,
    #[error("duplicate checkout request id: {0}")]
    DuplicateCheckoutRequestId(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// A status change that the entity's state machine does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid ticket status transition: {from:?} -> {attempted}")]
pub struct TransitionError {
    pub from: TicketStatus,
    pub attempted: &'static str,
}

/// Outbound gateway failures. A gateway *rejection* (non-"0" response code)
/// is not an error here - it comes back as an un-accepted acknowledgement.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("credential request failed: {0}")]
    Credential(String),
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned malformed response: {0}")]
    MalformedResponse(String),
}

/// Failures while reconciling an inbound webhook delivery.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Payment record not found")]
    UnknownCheckoutRequest(String),
    #[error("Ticket not found")]
    UnknownConversation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the refund orchestration as a whole. Per-ticket failures are
/// never surfaced here - they are captured in the batch summary instead.
#[derive(Error, Debug)]
pub enum RefundError {
    #[error("Event not found")]
    EventNotFound,
    #[error("Event is already canceled")]
    AlreadyCanceled,
    #[error(
        "All refund requests initiated but event cancellation failed. Please contact support."
    )]
    CancellationFailed(#[source] StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-ticket refund failure, captured at the task boundary so one ticket's
/// problem never aborts its siblings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketRefundError {
    #[error("M-Pesa payment information not found")]
    MissingReceipt,
    #[error("Customer phone number not found")]
    MissingPhoneNumber,
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Other(String),
}

/// One failed entry of the aggregate refund result.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTicket {
    pub ticket_id: TicketId,
    pub error: String,
}
