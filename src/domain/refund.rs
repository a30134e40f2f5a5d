use serde::{Deserialize, Serialize};

use super::error::{FailedTicket, TicketRefundError};
use super::ids::{ConversationId, TicketId};

/// Outcome of one ticket's refund attempt during the fan-out. Failures are
/// values here, never propagated errors, so siblings always run to
/// completion.
#[derive(Debug, Clone)]
pub enum TicketOutcome {
    /// Disbursement accepted; settlement will arrive via webhook.
    Pending {
        ticket_id: TicketId,
        conversation_id: ConversationId,
    },
    /// Ticket already refunded or already in flight; counted as success and
    /// no duplicate disbursement is issued.
    Skipped { ticket_id: TicketId },
    /// Permanent or gateway-rejected per-ticket failure.
    Failed {
        ticket_id: TicketId,
        error: TicketRefundError,
    },
}

impl TicketOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TicketOutcome::Failed { .. })
    }
}

/// Aggregate result of a bulk refund run. `success` means zero hard
/// failures; actual completions are reported later by the refund webhook,
/// so `successful_refunds` stays zero at initiation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSummary {
    pub success: bool,
    pub total_tickets: usize,
    pub successful_refunds: usize,
    pub failed_refunds: usize,
    pub pending_refunds: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<FailedTicket>,
}

impl RefundSummary {
    /// Summary for an event with nothing left to refund.
    pub fn empty() -> Self {
        Self {
            success: true,
            total_tickets: 0,
            successful_refunds: 0,
            failed_refunds: 0,
            pending_refunds: 0,
            errors: Vec::new(),
        }
    }

    /// Fold the settled per-ticket outcomes into the aggregate.
    pub fn from_outcomes(outcomes: Vec<TicketOutcome>) -> Self {
        let total_tickets = outcomes.len();
        let success = !outcomes.iter().any(TicketOutcome::is_failure);
        let mut pending_refunds = 0;
        let mut errors = Vec::new();

        for outcome in outcomes {
            match outcome {
                TicketOutcome::Pending { .. } | TicketOutcome::Skipped { .. } => {
                    pending_refunds += 1;
                }
                TicketOutcome::Failed { ticket_id, error } => {
                    errors.push(FailedTicket {
                        ticket_id,
                        error: error.to_string(),
                    });
                }
            }
        }

        Self {
            success,
            total_tickets,
            successful_refunds: 0,
            failed_refunds: errors.len(),
            pending_refunds,
            errors,
        }
    }
}
