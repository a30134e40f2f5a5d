//! In-memory store adapters.
//!
//! Point lookups by checkout request id and refund conversation id go
//! through secondary indexes, mirroring what a database-backed replacement
//! would index. Each status patch runs under the write lock, which is what
//! makes it atomic with respect to concurrent refund tasks and webhook
//! handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    CheckoutRequestId, ConversationId, EventId, EventRecord, NewPaymentRecord, NewTicket,
    PaymentId, PaymentRecord, PaymentSettlement, PaymentStatus, RefundCorrelation,
    RefundResolution, RefundTransition, StoreError, Ticket, TicketId, TicketStatus, UserId,
};
use crate::port::{EventStore, PaymentStore, TicketStore};

struct PaymentData {
    records: HashMap<PaymentId, PaymentRecord>,
    checkout_index: HashMap<CheckoutRequestId, PaymentId>,
}

/// In-memory payment record store.
pub struct InMemoryPaymentStore {
    data: Arc<RwLock<PaymentData>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(PaymentData {
                records: HashMap::new(),
                checkout_index: HashMap::new(),
            })),
        }
    }
}

impl Default for InMemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let mut data = self.data.write().await;

        if data.checkout_index.contains_key(&payment.checkout_request_id) {
            return Err(StoreError::DuplicateCheckoutRequestId(
                payment.checkout_request_id.as_str().to_string(),
            ));
        }

        let now = Utc::now();
        let record = PaymentRecord {
            id: PaymentId::new(Uuid::new_v4().to_string()),
            event_id: payment.event_id,
            user_id: payment.user_id,
            waiting_list_id: payment.waiting_list_id,
            checkout_request_id: payment.checkout_request_id,
            amount: payment.amount,
            phone_number: payment.phone_number,
            status: PaymentStatus::Pending,
            mpesa_receipt_number: None,
            transaction_date: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        data.checkout_index
            .insert(record.checkout_request_id.clone(), record.id.clone());
        data.records.insert(record.id.clone(), record.clone());

        Ok(record)
    }

    async fn get(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data.records.get(payment_id).cloned())
    }

    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .checkout_index
            .get(checkout_request_id)
            .and_then(|id| data.records.get(id))
            .cloned())
    }

    async fn settle(
        &self,
        payment_id: &PaymentId,
        settlement: PaymentSettlement,
    ) -> Result<PaymentRecord, StoreError> {
        let mut data = self.data.write().await;
        let record = data
            .records
            .get_mut(payment_id)
            .ok_or(StoreError::PaymentNotFound)?;

        record.status = settlement.status();
        match settlement {
            PaymentSettlement::Completed {
                mpesa_receipt_number,
                transaction_date,
            } => {
                record.mpesa_receipt_number = Some(mpesa_receipt_number);
                record.transaction_date = Some(transaction_date);
            }
            PaymentSettlement::Failed { error_message } => {
                record.error_message = Some(error_message);
            }
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .records
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }
}

struct TicketData {
    tickets: HashMap<TicketId, Ticket>,
    conversation_index: HashMap<ConversationId, TicketId>,
}

/// In-memory ticket store.
pub struct InMemoryTicketStore {
    data: Arc<RwLock<TicketData>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(TicketData {
                tickets: HashMap::new(),
                conversation_index: HashMap::new(),
            })),
        }
    }

    /// Seed a pre-built ticket, indexing any refund correlation it carries.
    pub async fn seed(&self, ticket: Ticket) {
        let mut data = self.data.write().await;
        if let Some(conversation_id) = &ticket.refund_conversation_id {
            data.conversation_index
                .insert(conversation_id.clone(), ticket.id.clone());
        }
        data.tickets.insert(ticket.id.clone(), ticket);
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let mut data = self.data.write().await;

        let ticket = Ticket {
            id: TicketId::new(Uuid::new_v4().to_string()),
            event_id: ticket.event_id,
            user_id: ticket.user_id,
            purchased_at: Utc::now(),
            status: TicketStatus::Valid,
            payment_intent_id: Some(ticket.payment_intent_id),
            amount: Some(ticket.amount),
            mpesa_receipt_number: Some(ticket.mpesa_receipt_number),
            phone_number: Some(ticket.phone_number),
            transaction_date: Some(ticket.transaction_date),
            refund_conversation_id: None,
            refund_originator_conversation_id: None,
            refund_transaction_id: None,
            refund_metadata: None,
            refund_error: None,
            refund_error_code: None,
            refund_completed_at: None,
            refund_failed_at: None,
        };

        data.tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, ticket_id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        let data = self.data.read().await;
        Ok(data.tickets.get(ticket_id).cloned())
    }

    async fn list_refundable(&self, event_id: &EventId) -> Result<Vec<Ticket>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .tickets
            .values()
            .filter(|t| &t.event_id == event_id && t.status.is_refundable())
            .cloned()
            .collect())
    }

    async fn find_by_refund_conversation_id(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Ticket>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .conversation_index
            .get(conversation_id)
            .and_then(|id| data.tickets.get(id))
            .cloned())
    }

    async fn mark_refund_pending(
        &self,
        ticket_id: &TicketId,
        correlation: RefundCorrelation,
    ) -> Result<Ticket, StoreError> {
        let mut data = self.data.write().await;
        let current = data
            .tickets
            .get(ticket_id)
            .ok_or(StoreError::TicketNotFound)?;

        let conversation_id = correlation.conversation_id.clone();
        let updated = current.begin_refund(correlation)?;

        data.conversation_index
            .insert(conversation_id, ticket_id.clone());
        data.tickets.insert(ticket_id.clone(), updated.clone());

        Ok(updated)
    }

    async fn resolve_refund(
        &self,
        ticket_id: &TicketId,
        resolution: RefundResolution,
    ) -> Result<RefundTransition, StoreError> {
        let mut data = self.data.write().await;
        let current = data
            .tickets
            .get(ticket_id)
            .ok_or(StoreError::TicketNotFound)?;

        let transition = current.resolve_refund(resolution)?;
        if let RefundTransition::Applied(updated) = &transition {
            data.tickets.insert(ticket_id.clone(), updated.clone());
        }

        Ok(transition)
    }

    async fn find_for_user(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<Ticket>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .tickets
            .values()
            .find(|t| &t.event_id == event_id && &t.user_id == user_id)
            .cloned())
    }
}

/// In-memory event store.
pub struct InMemoryEventStore {
    events: Arc<RwLock<HashMap<EventId, EventRecord>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get(&self, event_id: &EventId) -> Result<Option<EventRecord>, StoreError> {
        let events = self.events.read().await;
        Ok(events.get(event_id).cloned())
    }

    async fn insert(&self, event: EventRecord) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        events.insert(event.id.clone(), event);
        Ok(())
    }

    async fn mark_cancelled(&self, event_id: &EventId) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        let event = events.get_mut(event_id).ok_or(StoreError::EventNotFound)?;
        event.is_cancelled = true;
        Ok(())
    }
}
