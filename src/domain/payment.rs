use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CheckoutRequestId, EventId, PaymentId, UserId, WaitingListId};

/// Lifecycle of one collection attempt. Created as `Pending`; moved to a
/// terminal status exactly once, by the purchase confirmation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Webhook deliveries are at-least-once; a record already settled must
    /// short-circuit instead of being reprocessed.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Persistent record of one purchase attempt, keyed by the gateway-issued
/// checkout request id. Exactly one record exists per checkout request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub waiting_list_id: WaitingListId,
    pub checkout_request_id: CheckoutRequestId,
    pub amount: f64,
    pub phone_number: String,
    pub status: PaymentStatus,
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a payment record fixed at initiation time. The store assigns
/// the id and timestamps and forces status to `Pending`.
#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub event_id: EventId,
    pub user_id: UserId,
    pub waiting_list_id: WaitingListId,
    pub checkout_request_id: CheckoutRequestId,
    pub amount: f64,
    pub phone_number: String,
}

/// Terminal patch applied by the purchase confirmation handler.
#[derive(Debug, Clone)]
pub enum PaymentSettlement {
    Completed {
        mpesa_receipt_number: String,
        transaction_date: String,
    },
    Failed {
        error_message: String,
    },
}

impl PaymentSettlement {
    pub fn status(&self) -> PaymentStatus {
        match self {
            PaymentSettlement::Completed { .. } => PaymentStatus::Completed,
            PaymentSettlement::Failed { .. } => PaymentStatus::Failed,
        }
    }
}
