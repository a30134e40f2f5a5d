use std::sync::Arc;

use crate::adapter::{InMemoryEventStore, InMemoryPaymentStore, InMemoryTicketStore};
use crate::port::{EventStore, PaymentGateway, PaymentStore, TicketStore};
use crate::service::{PurchaseService, RefundService};

/// The wired-up application services, shared as state by the HTTP surface.
#[derive(Clone)]
pub struct Services {
    pub purchases: Arc<PurchaseService>,
    pub refunds: Arc<RefundService>,
}

impl Services {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        tickets: Arc<dyn TicketStore>,
        events: Arc<dyn EventStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            purchases: Arc::new(PurchaseService::new(
                payments,
                tickets.clone(),
                gateway.clone(),
            )),
            refunds: Arc::new(RefundService::new(events, tickets, gateway)),
        }
    }
}

/// Set up the settlement system on in-memory stores.
///
/// Store adapters sit behind the ports, so swapping in database-backed
/// implementations is a wiring change here, not a service change.
pub fn boot(gateway: Arc<dyn PaymentGateway>) -> Services {
    let payments: Arc<dyn PaymentStore> = Arc::new(InMemoryPaymentStore::new());
    let tickets: Arc<dyn TicketStore> = Arc::new(InMemoryTicketStore::new());
    let events: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());

    tracing::info!("Settlement system initialized");

    Services::new(payments, tickets, events, gateway)
}
