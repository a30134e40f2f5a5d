use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::domain::{
    ConversationId, DisbursementCallback, EventId, EventRecord, RefundCorrelation, RefundError,
    RefundResolution, RefundSummary, RefundTransition, StoreError, Ticket, TicketOutcome,
    TicketRefundError, TicketStatus, WebhookError,
};
use crate::port::{DisburseRequest, EventStore, PaymentGateway, TicketStore};

/// Bulk refund orchestration for a canceled event, plus the webhook handlers
/// that finalize each disbursement.
pub struct RefundService {
    events: Arc<dyn EventStore>,
    tickets: Arc<dyn TicketStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RefundService {
    pub fn new(
        events: Arc<dyn EventStore>,
        tickets: Arc<dyn TicketStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            events,
            tickets,
            gateway,
        }
    }

    /// Refund every refundable ticket of the event, then cancel the event.
    ///
    /// Tickets are processed concurrently and independently; every task
    /// settles before the aggregate is computed, and no per-ticket failure
    /// aborts a sibling. The event is canceled only when zero tickets
    /// hard-failed. Cancellation deliberately happens *after* the
    /// disbursement requests: a crash in between leaves tickets correctly
    /// `refund_pending` with the event still open, recoverable by re-running
    /// cancellation (the per-ticket skip check prevents double-refunding).
    pub async fn refund_event_tickets(
        &self,
        event_id: &EventId,
    ) -> Result<RefundSummary, RefundError> {
        let event = self
            .events
            .get(event_id)
            .await?
            .ok_or(RefundError::EventNotFound)?;

        if event.is_cancelled {
            return Err(RefundError::AlreadyCanceled);
        }

        let tickets = self.tickets.list_refundable(event_id).await?;

        if tickets.is_empty() {
            // Nothing to refund, just cancel the event.
            self.events.mark_cancelled(event_id).await?;
            info!(event_id = %event_id, "event canceled, no refundable tickets");
            return Ok(RefundSummary::empty());
        }

        info!(
            event_id = %event_id,
            tickets = tickets.len(),
            "starting bulk refund"
        );

        let outcomes = join_all(
            tickets
                .into_iter()
                .map(|ticket| self.refund_ticket(&event, ticket)),
        )
        .await;

        let summary = RefundSummary::from_outcomes(outcomes);

        if summary.success {
            // Refund requests are already irreversibly in flight; a failing
            // cancel-write is a distinct fatal condition and must never
            // trigger re-issuing refunds.
            if let Err(e) = self.events.mark_cancelled(event_id).await {
                error!(
                    event_id = %event_id,
                    "ADMIN ALERT: refunds initiated but event cancellation failed: {e}"
                );
                return Err(RefundError::CancellationFailed(e));
            }

            info!(
                event_id = %event_id,
                pending = summary.pending_refunds,
                "bulk refund initiated, event canceled"
            );
        } else {
            error!(
                event_id = %event_id,
                failed = summary.failed_refunds,
                pending = summary.pending_refunds,
                total = summary.total_tickets,
                "bulk refund partially failed, event left open"
            );
        }

        Ok(summary)
    }

    /// One ticket's refund attempt. Every failure is converted to a value at
    /// this boundary - nothing propagates out of the fan-out.
    async fn refund_ticket(&self, event: &EventRecord, ticket: Ticket) -> TicketOutcome {
        // Idempotent re-run guard: already refunded or already in flight.
        if matches!(
            ticket.status,
            TicketStatus::Refunded | TicketStatus::RefundPending
        ) {
            return TicketOutcome::Skipped {
                ticket_id: ticket.id,
            };
        }

        if ticket
            .mpesa_receipt_number
            .as_deref()
            .unwrap_or_default()
            .is_empty()
        {
            return TicketOutcome::Failed {
                ticket_id: ticket.id,
                error: TicketRefundError::MissingReceipt,
            };
        }

        let phone_number = match ticket.phone_number.as_deref() {
            Some(phone) if !phone.is_empty() => phone.to_string(),
            _ => {
                return TicketOutcome::Failed {
                    ticket_id: ticket.id,
                    error: TicketRefundError::MissingPhoneNumber,
                }
            }
        };

        let ack = match self
            .gateway
            .disburse(DisburseRequest {
                amount: ticket.amount.unwrap_or(0.0),
                phone_number,
                remarks: format!("Refund for event: {}", event.name),
                occasion: format!("Event canceled - Ticket #{}", ticket.id),
            })
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                error!(ticket_id = %ticket.id, "failed to refund ticket: {e}");
                return TicketOutcome::Failed {
                    ticket_id: ticket.id,
                    error: TicketRefundError::Other(e.to_string()),
                };
            }
        };

        if !ack.accepted {
            let reason = ack
                .rejection_reason
                .unwrap_or_else(|| "Refund request failed".to_string());
            error!(ticket_id = %ticket.id, "refund rejected by gateway: {reason}");
            return TicketOutcome::Failed {
                ticket_id: ticket.id,
                error: TicketRefundError::Rejected(reason),
            };
        }

        let (conversation_id, originator_conversation_id) =
            match (ack.conversation_id, ack.originator_conversation_id) {
                (Some(c), Some(o)) => (c, o),
                _ => {
                    error!(ticket_id = %ticket.id, "gateway accepted refund without conversation ids");
                    return TicketOutcome::Failed {
                        ticket_id: ticket.id,
                        error: TicketRefundError::Other(
                            "Gateway acknowledgement missing conversation id".to_string(),
                        ),
                    };
                }
            };

        // Disbursement settles asynchronously; park the ticket as pending
        // with the correlation keys the webhook will echo back.
        match self
            .tickets
            .mark_refund_pending(
                &ticket.id,
                RefundCorrelation {
                    conversation_id: conversation_id.clone(),
                    originator_conversation_id,
                },
            )
            .await
        {
            Ok(_) => TicketOutcome::Pending {
                ticket_id: ticket.id,
                conversation_id,
            },
            Err(e) => {
                error!(ticket_id = %ticket.id, "failed to mark ticket refund_pending: {e}");
                TicketOutcome::Failed {
                    ticket_id: ticket.id,
                    error: TicketRefundError::Other(e.to_string()),
                }
            }
        }
    }

    /// Consume a disbursement result webhook, finalizing the ticket as
    /// `refunded` or `refund_failed`.
    pub async fn handle_refund_result(
        &self,
        callback: &DisbursementCallback,
    ) -> Result<RefundTransition, WebhookError> {
        let result = &callback.result;
        let ticket = self.find_ticket(&result.conversation_id).await?;

        info!(
            ticket_id = %ticket.id,
            code = result.result_code,
            transaction_id = %result.transaction_id,
            "refund result received"
        );

        let now = Utc::now();
        let resolution = if result.result_code == 0 {
            let metadata = result.refund_metadata(
                ticket.amount.unwrap_or(0.0),
                ticket.phone_number.as_deref().unwrap_or_default(),
                &now.to_rfc3339(),
            );
            RefundResolution::Completed {
                transaction_id: result.transaction_id.clone(),
                metadata,
                completed_at: now,
            }
        } else {
            error!(
                ticket_id = %ticket.id,
                code = result.result_code,
                "ADMIN ALERT: Manual refund required, refund failed: {}",
                result.result_desc
            );
            RefundResolution::Failed {
                error: result.result_desc.clone(),
                error_code: result.result_code,
                failed_at: now,
            }
        };

        self.apply_resolution(&ticket, resolution).await
    }

    /// Consume a disbursement timeout webhook. The money-movement outcome is
    /// unknown; the ticket lands in `refund_timeout`, never silently equated
    /// with success or failure.
    pub async fn handle_refund_timeout(
        &self,
        callback: &DisbursementCallback,
    ) -> Result<RefundTransition, WebhookError> {
        let result = &callback.result;
        let ticket = self.find_ticket(&result.conversation_id).await?;

        error!(
            ticket_id = %ticket.id,
            "ADMIN ALERT: Refund timed out, manual intervention required"
        );

        let error = if result.result_desc.is_empty() {
            "Request timed out".to_string()
        } else {
            result.result_desc.clone()
        };

        self.apply_resolution(
            &ticket,
            RefundResolution::TimedOut {
                error,
                failed_at: Utc::now(),
            },
        )
        .await
    }

    /// Apply a webhook-delivered resolution to the ticket.
    ///
    /// The provider can deliver a timeout and a late result for the same
    /// disbursement; once the ticket sits in a terminal state the extra
    /// delivery is discarded and acknowledged, never bounced back for
    /// redelivery. The ticket keeps its first terminal state.
    async fn apply_resolution(
        &self,
        ticket: &Ticket,
        resolution: RefundResolution,
    ) -> Result<RefundTransition, WebhookError> {
        match self.tickets.resolve_refund(&ticket.id, resolution).await {
            Ok(transition) => Ok(transition),
            Err(StoreError::Transition(e)) => {
                warn!(ticket_id = %ticket.id, "discarding late refund delivery: {e}");
                Ok(RefundTransition::AlreadySettled)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_ticket(&self, conversation_id: &str) -> Result<Ticket, WebhookError> {
        let conversation_id = ConversationId::new(conversation_id);
        self.tickets
            .find_by_refund_conversation_id(&conversation_id)
            .await?
            .ok_or_else(|| {
                error!(
                    conversation_id = %conversation_id,
                    "ticket not found for refund callback"
                );
                WebhookError::UnknownConversation(conversation_id.as_str().to_string())
            })
    }
}
