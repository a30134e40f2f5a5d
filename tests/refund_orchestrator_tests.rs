//! Bulk refund fan-out tests: isolation, idempotency, aggregate decision,
//! and cancellation ordering.


use std::sync::Arc;

use context::{make_ticket, BrokenCancelEventStore, MockGateway, StaleListTicketStore, TestContext};
use settlement::adapter::{InMemoryPaymentStore, InMemoryTicketStore};
use settlement::domain::{EventId, EventRecord, RefundError, TicketStatus};
use settlement::port::{EventStore, TicketStore};
use settlement::service::Services;

#[tokio::test]
async fn test_refund_marks_tickets_pending_and_cancels_event() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    let t1 = ctx.seed_ticket(&event_id, Some("SFC1"), Some("254700000001")).await;
    let t2 = ctx.seed_ticket(&event_id, Some("SFC2"), Some("254700000002")).await;

    let summary = ctx
        .services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.total_tickets, 2);
    assert_eq!(summary.pending_refunds, 2);
    assert_eq!(summary.failed_refunds, 0);
    assert_eq!(summary.successful_refunds, 0);

    for id in [&t1.id, &t2.id] {
        let ticket = ctx.tickets.get(id).await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::RefundPending);
        assert!(ticket.refund_conversation_id.is_some());
        assert!(ticket.refund_originator_conversation_id.is_some());
    }

    let event = ctx.events.get(&event_id).await.unwrap().unwrap();
    assert!(event.is_cancelled);
}

#[tokio::test]
async fn test_disburse_request_carries_event_and_ticket_context() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    let ticket = ctx.seed_ticket(&event_id, Some("SFC1"), Some("254700000001")).await;

    ctx.services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap();

    let calls = ctx.gateway.disburse_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].amount, 500.0);
    assert_eq!(calls[0].remarks, "Refund for event: Rust Nairobi Meetup");
    assert_eq!(
        calls[0].occasion,
        format!("Event canceled - Ticket #{}", ticket.id)
    );
}

#[tokio::test]
async fn test_missing_phone_number_fails_only_that_ticket() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    let broken = ctx.seed_ticket(&event_id, Some("SFC1"), None).await;
    let ok = ctx.seed_ticket(&event_id, Some("SFC2"), Some("254700000002")).await;

    let summary = ctx
        .services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap();

    assert!(!summary.success);
    assert_eq!(summary.total_tickets, 2);
    assert_eq!(summary.pending_refunds, 1);
    assert_eq!(summary.failed_refunds, 1);
    assert_eq!(summary.errors[0].ticket_id, broken.id);
    assert_eq!(summary.errors[0].error, "Customer phone number not found");

    // The healthy sibling still went out.
    let sibling = ctx.tickets.get(&ok.id).await.unwrap().unwrap();
    assert_eq!(sibling.status, TicketStatus::RefundPending);

    // And the event stays open for a retry.
    let event = ctx.events.get(&event_id).await.unwrap().unwrap();
    assert!(!event.is_cancelled);
}

#[tokio::test]
async fn test_missing_receipt_fails_ticket_without_gateway_call() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    ctx.seed_ticket(&event_id, None, Some("254700000001")).await;

    let summary = ctx
        .services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap();

    assert!(!summary.success);
    assert_eq!(summary.failed_refunds, 1);
    assert_eq!(summary.errors[0].error, "M-Pesa payment information not found");
    assert_eq!(ctx.gateway.disburse_call_count(), 0);
}

#[tokio::test]
async fn test_gateway_rejection_captured_per_ticket() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    ctx.seed_ticket(&event_id, Some("SFC1"), Some("254700000001")).await;
    ctx.seed_ticket(&event_id, Some("SFC2"), Some("254700000002")).await;
    let rejected = ctx.seed_ticket(&event_id, Some("SFC3"), Some("254700000003")).await;

    ctx.gateway
        .reject_disburse_for("254700000003", "The balance is insufficient for the transaction");

    let summary = ctx
        .services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap();

    assert!(!summary.success);
    assert_eq!(summary.total_tickets, 3);
    assert_eq!(summary.pending_refunds, 2);
    assert_eq!(summary.failed_refunds, 1);
    assert_eq!(summary.errors[0].ticket_id, rejected.id);
    assert_eq!(
        summary.errors[0].error,
        "The balance is insufficient for the transaction"
    );

    // Every ticket was attempted despite the rejection.
    assert_eq!(ctx.gateway.disburse_call_count(), 3);

    let ticket = ctx.tickets.get(&rejected.id).await.unwrap().unwrap();
    assert_eq!(ticket.status, TicketStatus::Valid);

    let event = ctx.events.get(&event_id).await.unwrap().unwrap();
    assert!(!event.is_cancelled);
}

#[tokio::test]
async fn test_event_without_refundable_tickets_is_cancelled() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;

    let summary = ctx
        .services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.total_tickets, 0);
    assert_eq!(summary.pending_refunds, 0);

    let event = ctx.events.get(&event_id).await.unwrap().unwrap();
    assert!(event.is_cancelled);
}

#[tokio::test]
async fn test_unknown_event_is_an_error() {
    let ctx = TestContext::new();

    let err = ctx
        .services
        .refunds
        .refund_event_tickets(&EventId::new("missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::EventNotFound));
}

#[tokio::test]
async fn test_already_cancelled_event_is_rejected() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    ctx.events.mark_cancelled(&event_id).await.unwrap();

    let err = ctx
        .services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::AlreadyCanceled));
    assert_eq!(ctx.gateway.disburse_call_count(), 0);
}

#[tokio::test]
async fn test_already_pending_ticket_in_listing_is_skipped() {
    // A stale listing can still surface a ticket that is already in flight;
    // the orchestrator must not disburse for it twice.
    let payments = Arc::new(InMemoryPaymentStore::new());
    let inner = Arc::new(InMemoryTicketStore::new());
    let tickets = Arc::new(StaleListTicketStore::new(inner.clone()));
    let events = Arc::new(settlement::adapter::InMemoryEventStore::new());
    let gateway = Arc::new(MockGateway::new());

    let services = Services::new(payments, tickets.clone(), events.clone(), gateway.clone());

    let event_id = EventId::new("event-stale");
    events
        .insert(EventRecord {
            id: event_id.clone(),
            name: "Rust Nairobi Meetup".to_string(),
            is_cancelled: false,
        })
        .await
        .unwrap();

    let fresh = make_ticket(&event_id, Some("SFC1"), Some("254700000001"));
    inner.seed(fresh.clone()).await;

    let mut in_flight = make_ticket(&event_id, Some("SFC2"), Some("254700000002"));
    in_flight.status = TicketStatus::RefundPending;
    inner.seed(in_flight.clone()).await;
    tickets.push_stale(in_flight.clone());

    let summary = services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.total_tickets, 2);
    assert_eq!(summary.pending_refunds, 2);
    assert_eq!(summary.failed_refunds, 0);

    // Only the fresh ticket reached the gateway.
    assert_eq!(gateway.disburse_call_count(), 1);
    assert_eq!(
        gateway.disburse_calls.lock().unwrap()[0].occasion,
        format!("Event canceled - Ticket #{}", fresh.id)
    );
}

#[tokio::test]
async fn test_cancellation_failure_after_refunds_is_fatal() {
    let payments = Arc::new(InMemoryPaymentStore::new());
    let inner = Arc::new(InMemoryTicketStore::new());
    let events = Arc::new(BrokenCancelEventStore::new());
    let gateway = Arc::new(MockGateway::new());

    let services = Services::new(payments, inner.clone(), events.clone(), gateway.clone());

    let event_id = EventId::new("event-broken");
    events
        .insert(EventRecord {
            id: event_id.clone(),
            name: "Rust Nairobi Meetup".to_string(),
            is_cancelled: false,
        })
        .await
        .unwrap();

    let ticket = make_ticket(&event_id, Some("SFC1"), Some("254700000001"));
    inner.seed(ticket.clone()).await;

    let err = services
        .refunds
        .refund_event_tickets(&event_id)
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::CancellationFailed(_)));
    assert_eq!(
        err.to_string(),
        "All refund requests initiated but event cancellation failed. Please contact support."
    );

    // The refund itself is already in flight and stays pending.
    let pending = inner.get(&ticket.id).await.unwrap().unwrap();
    assert_eq!(pending.status, TicketStatus::RefundPending);
}
