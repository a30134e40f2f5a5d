use async_trait::async_trait;

use crate::domain::{CheckoutRequestId, ConversationId, GatewayError};

/// Outbound collection (customer -> merchant) request. The call returns an
/// acknowledgement immediately; actual success or failure arrives later via
/// webhook.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub amount: f64,
    pub phone_number: String,
    /// Echoed back by the provider as the account reference.
    pub account_reference: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CollectAck {
    pub accepted: bool,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<CheckoutRequestId>,
    pub rejection_reason: Option<String>,
}

/// Outbound disbursement (merchant -> customer) request, used for refunds.
/// Same acknowledge-now, settle-later pattern as collection.
#[derive(Debug, Clone)]
pub struct DisburseRequest {
    pub amount: f64,
    pub phone_number: String,
    pub remarks: String,
    pub occasion: String,
}

#[derive(Debug, Clone)]
pub struct DisburseAck {
    pub accepted: bool,
    pub conversation_id: Option<ConversationId>,
    pub originator_conversation_id: Option<ConversationId>,
    pub rejection_reason: Option<String>,
}

/// Thin adapter over the external payment provider.
///
/// A non-"0" provider response code is an outright rejection: the call fails
/// fast with `accepted: false` and no retry, because webhook semantics make
/// blind retries unsafe. Retrying is the caller's decision.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn collect(&self, request: CollectRequest) -> Result<CollectAck, GatewayError>;

    async fn disburse(&self, request: DisburseRequest) -> Result<DisburseAck, GatewayError>;
}
