use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TransitionError;
use super::ids::{ConversationId, EventId, TicketId, UserId};
use super::webhook::RefundMetadata;

/// Lifecycle of one sold seat.
///
/// Refund states are entered only from `Valid` or `Used`. `Refunded`,
/// `RefundFailed` and `RefundTimeout` are terminal for automated processing;
/// the latter two require manual operator intervention to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Valid,
    Used,
    Refunded,
    Cancelled,
    RefundPending,
    RefundFailed,
    RefundTimeout,
}

impl TicketStatus {
    /// Whether the refund orchestrator may start a refund from this status.
    pub fn is_refundable(self) -> bool {
        matches!(self, TicketStatus::Valid | TicketStatus::Used)
    }
}

/// Correlation keys returned by an accepted disbursement request, stored on
/// the ticket so the later result/timeout callback can be resolved to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundCorrelation {
    pub conversation_id: ConversationId,
    pub originator_conversation_id: ConversationId,
}

/// Terminal outcome delivered by the refund result or timeout webhook.
#[derive(Debug, Clone)]
pub enum RefundResolution {
    Completed {
        transaction_id: String,
        metadata: RefundMetadata,
        completed_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        error_code: i64,
        failed_at: DateTime<Utc>,
    },
    TimedOut {
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl RefundResolution {
    pub fn status(&self) -> TicketStatus {
        match self {
            RefundResolution::Completed { .. } => TicketStatus::Refunded,
            RefundResolution::Failed { .. } => TicketStatus::RefundFailed,
            RefundResolution::TimedOut { .. } => TicketStatus::RefundTimeout,
        }
    }
}

/// Result of applying a refund resolution to a ticket: either the patched
/// ticket, or a signal that an earlier delivery already settled it.
#[derive(Debug, Clone)]
pub enum RefundTransition {
    Applied(Ticket),
    AlreadySettled,
}

/// Persistent record of one sold seat, created by the purchase confirmation
/// handler from a completed payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub purchased_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub payment_intent_id: Option<String>,
    pub amount: Option<f64>,

    // M-Pesa purchase details carried from the collection webhook; the
    // refund orchestrator requires the receipt and phone number later.
    pub mpesa_receipt_number: Option<String>,
    pub phone_number: Option<String>,
    pub transaction_date: Option<String>,

    // Refund correlation, set when a disbursement request is accepted.
    pub refund_conversation_id: Option<ConversationId>,
    pub refund_originator_conversation_id: Option<ConversationId>,

    // Refund outcome, set by the refund confirmation handler.
    pub refund_transaction_id: Option<String>,
    pub refund_metadata: Option<RefundMetadata>,
    pub refund_error: Option<String>,
    pub refund_error_code: Option<i64>,
    pub refund_completed_at: Option<DateTime<Utc>>,
    pub refund_failed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Transition into `RefundPending`, storing the correlation keys for the
    /// eventual webhook. Allowed only from `Valid` or `Used`.
    pub fn begin_refund(&self, correlation: RefundCorrelation) -> Result<Ticket, TransitionError> {
        if !self.status.is_refundable() {
            return Err(TransitionError {
                from: self.status,
                attempted: "refund_pending",
            });
        }

        let mut ticket = self.clone();
        ticket.status = TicketStatus::RefundPending;
        ticket.refund_conversation_id = Some(correlation.conversation_id);
        ticket.refund_originator_conversation_id = Some(correlation.originator_conversation_id);
        Ok(ticket)
    }

    /// Apply the webhook-delivered refund outcome.
    ///
    /// Allowed from `RefundPending`. A redelivery that lands on the same
    /// terminal status is reported as `AlreadySettled` rather than an error;
    /// a delivery that would move the ticket to a *different* terminal status
    /// is rejected so a timeout and a failure are never conflated.
    pub fn resolve_refund(
        &self,
        resolution: RefundResolution,
    ) -> Result<RefundTransition, TransitionError> {
        let target = resolution.status();

        if self.status == target {
            return Ok(RefundTransition::AlreadySettled);
        }

        if self.status != TicketStatus::RefundPending {
            return Err(TransitionError {
                from: self.status,
                attempted: match target {
                    TicketStatus::Refunded => "refunded",
                    TicketStatus::RefundFailed => "refund_failed",
                    _ => "refund_timeout",
                },
            });
        }

        let mut ticket = self.clone();
        ticket.status = target;
        match resolution {
            RefundResolution::Completed {
                transaction_id,
                metadata,
                completed_at,
            } => {
                ticket.refund_transaction_id = Some(transaction_id);
                ticket.refund_metadata = Some(metadata);
                ticket.refund_completed_at = Some(completed_at);
            }
            RefundResolution::Failed {
                error,
                error_code,
                failed_at,
            } => {
                ticket.refund_error = Some(error);
                ticket.refund_error_code = Some(error_code);
                ticket.refund_failed_at = Some(failed_at);
            }
            RefundResolution::TimedOut { error, failed_at } => {
                ticket.refund_error = Some(error);
                ticket.refund_failed_at = Some(failed_at);
            }
        }
        Ok(RefundTransition::Applied(ticket))
    }
}

/// Fields fixed when the purchase confirmation handler materializes a ticket
/// from a successful collection webhook.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub event_id: EventId,
    pub user_id: UserId,
    pub payment_intent_id: String,
    pub amount: f64,
    pub mpesa_receipt_number: String,
    pub phone_number: String,
    pub transaction_date: String,
}
