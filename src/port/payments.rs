use async_trait::async_trait;

use crate::domain::{
    CheckoutRequestId, NewPaymentRecord, PaymentId, PaymentRecord, PaymentSettlement,
    PaymentStatus, StoreError, UserId,
};

/// Persistent store of payment records.
///
/// `find_by_checkout_request_id` is the join key between the outbound
/// collection request and the inbound webhook and is looked up once per
/// delivery (including retried deliveries), so implementations must back it
/// with an index.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a new record with status forced to `Pending`. Rejects a
    /// duplicate checkout request id - exactly one record exists per key.
    async fn create(&self, payment: NewPaymentRecord) -> Result<PaymentRecord, StoreError>;

    async fn get(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, StoreError>;

    /// Indexed point lookup by the gateway correlation key.
    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<Option<PaymentRecord>, StoreError>;

    /// Apply the terminal settlement patch as a single atomic update.
    async fn settle(
        &self,
        payment_id: &PaymentId,
        settlement: PaymentSettlement,
    ) -> Result<PaymentRecord, StoreError>;

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>, StoreError>;

    async fn list_by_status(&self, status: PaymentStatus)
        -> Result<Vec<PaymentRecord>, StoreError>;
}
