use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::{
    CheckoutRequestId, CollectionCallback, EventId, NewPaymentRecord, NewTicket, PaymentId,
    PaymentRecord, PaymentSettlement, PaymentStatus, StoreError, Ticket, UserId, WaitingListId,
    WebhookError,
};
use crate::port::{CollectRequest, PaymentGateway, PaymentStore, TicketStore};

/// Purchase-initiation entry point payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub event_id: String,
    pub user_id: String,
    pub waiting_list_id: String,
    pub amount: f64,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InitiatePaymentResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payment_id: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

/// What a single collection webhook delivery amounted to.
#[derive(Debug, Clone)]
pub enum ConfirmationOutcome {
    /// Payment succeeded; exactly one ticket was materialized.
    TicketIssued(Ticket),
    /// Provider reported a business failure; no ticket created.
    PaymentFailed,
    /// Redelivery of an already-settled payment; nothing changed.
    AlreadySettled,
}

/// Tracks a mobile-money purchase from initiation through webhook-confirmed
/// settlement.
pub struct PurchaseService {
    payments: Arc<dyn PaymentStore>,
    tickets: Arc<dyn TicketStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PurchaseService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        tickets: Arc<dyn TicketStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            payments,
            tickets,
            gateway,
        }
    }

    /// Initiate a collection for a waiting-list reservation.
    ///
    /// Input errors are reported synchronously with nothing mutated; a
    /// pending payment record is written only after the gateway accepts the
    /// request, keyed by the checkout request id it issued.
    pub async fn initiate(&self, request: InitiatePaymentRequest) -> InitiatePaymentResponse {
        if request.event_id.is_empty()
            || request.user_id.is_empty()
            || request.waiting_list_id.is_empty()
            || request.amount <= 0.0
        {
            return InitiatePaymentResponse::failure("Missing required fields");
        }

        let phone_number = match request.phone_number.filter(|p| !p.is_empty()) {
            Some(phone) => phone,
            None => return InitiatePaymentResponse::failure("Phone number is required"),
        };

        let ack = match self
            .gateway
            .collect(CollectRequest {
                amount: request.amount,
                phone_number: phone_number.clone(),
                account_reference: request.event_id.clone(),
                description: "Ticket Purchase".to_string(),
            })
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                error!("failed to initiate collection: {e}");
                return InitiatePaymentResponse::failure(
                    "Failed to initiate payment. Please try again.",
                );
            }
        };

        if !ack.accepted {
            return InitiatePaymentResponse::failure(
                ack.rejection_reason
                    .unwrap_or_else(|| "Payment request failed".to_string()),
            );
        }

        let checkout_request_id = match ack.checkout_request_id {
            Some(id) => id,
            None => {
                error!("gateway accepted collection without a checkout request id");
                return InitiatePaymentResponse::failure(
                    "Failed to initiate payment. Please try again.",
                );
            }
        };

        let record = match self
            .payments
            .create(NewPaymentRecord {
                event_id: EventId::new(request.event_id),
                user_id: UserId::new(request.user_id),
                waiting_list_id: WaitingListId::new(request.waiting_list_id),
                checkout_request_id,
                amount: request.amount,
                phone_number,
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!("failed to persist payment record: {e}");
                return InitiatePaymentResponse::failure(
                    "Failed to initiate payment. Please try again.",
                );
            }
        };

        info!(payment_id = %record.id, "payment initiated");

        InitiatePaymentResponse {
            success: true,
            payment_id: Some(record.id.as_str().to_string()),
            error: None,
            message: Some("Payment initiated. Check your phone for M-Pesa prompt.".to_string()),
        }
    }

    /// Consume one collection webhook delivery.
    ///
    /// Delivery is at-least-once: an already-settled payment record
    /// short-circuits to an acknowledgement without creating a second
    /// ticket. An unknown checkout request id is a rejection so the
    /// provider's retry policy stays observable.
    pub async fn confirm(
        &self,
        callback: &CollectionCallback,
    ) -> Result<ConfirmationOutcome, WebhookError> {
        let stk = &callback.body.stk_callback;
        let checkout_request_id = CheckoutRequestId::new(stk.checkout_request_id.clone());

        info!(
            checkout_request_id = %checkout_request_id,
            code = stk.result_code,
            desc = %stk.result_desc,
            "collection result received"
        );

        let record = self
            .payments
            .find_by_checkout_request_id(&checkout_request_id)
            .await?
            .ok_or_else(|| {
                error!(
                    checkout_request_id = %checkout_request_id,
                    "payment record not found for collection callback"
                );
                WebhookError::UnknownCheckoutRequest(stk.checkout_request_id.clone())
            })?;

        if record.status.is_terminal() {
            info!(payment_id = %record.id, "payment already settled, skipping redelivery");
            return Ok(ConfirmationOutcome::AlreadySettled);
        }

        if stk.result_code == 0 {
            let details = stk.payment_details();

            let ticket = self
                .tickets
                .insert(NewTicket {
                    event_id: record.event_id.clone(),
                    user_id: record.user_id.clone(),
                    payment_intent_id: details.mpesa_receipt_number.clone(),
                    amount: details.amount,
                    mpesa_receipt_number: details.mpesa_receipt_number.clone(),
                    phone_number: details.phone_number,
                    transaction_date: details.transaction_date.clone(),
                })
                .await?;

            self.payments
                .settle(
                    &record.id,
                    PaymentSettlement::Completed {
                        mpesa_receipt_number: details.mpesa_receipt_number,
                        transaction_date: details.transaction_date,
                    },
                )
                .await?;

            info!(payment_id = %record.id, ticket_id = %ticket.id, "payment completed, ticket issued");
            Ok(ConfirmationOutcome::TicketIssued(ticket))
        } else {
            self.payments
                .settle(
                    &record.id,
                    PaymentSettlement::Failed {
                        error_message: stk.result_desc.clone(),
                    },
                )
                .await?;

            info!(payment_id = %record.id, "payment failed: {}", stk.result_desc);
            Ok(ConfirmationOutcome::PaymentFailed)
        }
    }

    /// Point lookup backing the payment-status page.
    pub async fn payment(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, StoreError> {
        self.payments.get(payment_id).await
    }

    /// Payment history for one user.
    pub async fn payments_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.payments.list_by_user(user_id).await
    }

    /// Payments currently in the given status, used for operator
    /// reconciliation (e.g. listing everything still pending).
    pub async fn payments_with_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.payments.list_by_status(status).await
    }

    /// The ticket a user holds for an event, if any.
    pub async fn ticket_for_user(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<Ticket>, StoreError> {
        self.tickets.find_for_user(event_id, user_id).await
    }
}
