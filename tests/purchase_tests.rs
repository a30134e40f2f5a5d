//! Purchase initiation and collection-webhook confirmation tests.


use context::{collection_callback, stk_failure, stk_success, TestContext};
use settlement::domain::{PaymentId, PaymentStatus, TicketStatus, WebhookError};
use settlement::port::{PaymentStore, TicketStore};
use settlement::service::{ConfirmationOutcome, InitiatePaymentRequest};

fn initiate_request(phone_number: Option<&str>) -> InitiatePaymentRequest {
    InitiatePaymentRequest {
        event_id: "event-1".to_string(),
        user_id: "user-1".to_string(),
        waiting_list_id: "waiting-1".to_string(),
        amount: 500.0,
        phone_number: phone_number.map(str::to_string),
    }
}

#[tokio::test]
async fn test_initiate_creates_pending_record() {
    let ctx = TestContext::new();

    let response = ctx
        .services
        .purchases
        .initiate(initiate_request(Some("254712345678")))
        .await;

    assert!(response.success);
    assert_eq!(
        response.message.as_deref(),
        Some("Payment initiated. Check your phone for M-Pesa prompt.")
    );

    let payment_id = PaymentId::new(response.payment_id.unwrap());
    let record = ctx.payments.get(&payment_id).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.amount, 500.0);
    assert_eq!(record.phone_number, "254712345678");

    let calls = ctx.gateway.collect_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].account_reference, "event-1");
    assert_eq!(calls[0].description, "Ticket Purchase");
}

#[tokio::test]
async fn test_initiate_requires_phone_number() {
    let ctx = TestContext::new();

    let response = ctx
        .services
        .purchases
        .initiate(initiate_request(None))
        .await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Phone number is required"));
    assert_eq!(ctx.gateway.collect_calls.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn test_initiate_validates_required_fields() {
    let ctx = TestContext::new();

    let mut request = initiate_request(Some("254712345678"));
    request.event_id = String::new();

    let response = ctx.services.purchases.initiate(request).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Missing required fields"));

    let mut request = initiate_request(Some("254712345678"));
    request.amount = 0.0;

    let response = ctx.services.purchases.initiate(request).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Missing required fields"));
}

#[tokio::test]
async fn test_initiate_surfaces_gateway_rejection() {
    let ctx = TestContext::new();
    ctx.gateway.reject_collect("Invalid PhoneNumber");

    let response = ctx
        .services
        .purchases
        .initiate(initiate_request(Some("12345")))
        .await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Invalid PhoneNumber"));
}

#[tokio::test]
async fn test_successful_confirmation_issues_ticket_and_settles_payment() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    let record = ctx.seed_payment(&event_id, "ws_CO_100").await;

    let callback =
        collection_callback(&stk_success("ws_CO_100", 500.0, "SFC29H0EJP", "254712345678"));
    let outcome = ctx.services.purchases.confirm(&callback).await.unwrap();

    let ConfirmationOutcome::TicketIssued(ticket) = outcome else {
        panic!("expected a ticket to be issued");
    };
    assert_eq!(ticket.status, TicketStatus::Valid);
    assert_eq!(ticket.event_id, event_id);
    assert_eq!(ticket.user_id, record.user_id);
    assert_eq!(ticket.mpesa_receipt_number.as_deref(), Some("SFC29H0EJP"));
    assert_eq!(ticket.phone_number.as_deref(), Some("254712345678"));
    assert_eq!(ticket.amount, Some(500.0));

    let settled = ctx.payments.get(&record.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Completed);
    assert_eq!(settled.mpesa_receipt_number.as_deref(), Some("SFC29H0EJP"));
    assert_eq!(settled.transaction_date.as_deref(), Some("20250102120000"));
}

#[tokio::test]
async fn test_confirmation_redelivery_is_idempotent() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    let record = ctx.seed_payment(&event_id, "ws_CO_100").await;

    let callback =
        collection_callback(&stk_success("ws_CO_100", 500.0, "SFC29H0EJP", "254712345678"));

    let first = ctx.services.purchases.confirm(&callback).await.unwrap();
    assert!(matches!(first, ConfirmationOutcome::TicketIssued(_)));

    // Provider retries the same delivery; no second ticket materializes.
    let second = ctx.services.purchases.confirm(&callback).await.unwrap();
    assert!(matches!(second, ConfirmationOutcome::AlreadySettled));

    let tickets = ctx
        .tickets
        .list_refundable(&event_id)
        .await
        .unwrap();
    assert_eq!(tickets.len(), 1);

    let settled = ctx.payments.get(&record.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_failed_collection_settles_payment_without_ticket() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    let record = ctx.seed_payment(&event_id, "ws_CO_100").await;

    let callback =
        collection_callback(&stk_failure("ws_CO_100", 1032, "Request cancelled by user"));
    let outcome = ctx.services.purchases.confirm(&callback).await.unwrap();

    assert!(matches!(outcome, ConfirmationOutcome::PaymentFailed));

    let settled = ctx.payments.get(&record.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Failed);
    assert_eq!(
        settled.error_message.as_deref(),
        Some("Request cancelled by user")
    );

    let tickets = ctx.tickets.list_refundable(&event_id).await.unwrap();
    assert!(tickets.is_empty());
}

#[tokio::test]
async fn test_failure_redelivery_is_idempotent() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;
    ctx.seed_payment(&event_id, "ws_CO_100").await;

    let callback =
        collection_callback(&stk_failure("ws_CO_100", 1032, "Request cancelled by user"));

    ctx.services.purchases.confirm(&callback).await.unwrap();
    let second = ctx.services.purchases.confirm(&callback).await.unwrap();
    assert!(matches!(second, ConfirmationOutcome::AlreadySettled));
}

#[tokio::test]
async fn test_unknown_checkout_request_is_rejected() {
    let ctx = TestContext::new();

    let callback =
        collection_callback(&stk_success("ws_CO_missing", 500.0, "SFC29H0EJP", "254712345678"));
    let err = ctx.services.purchases.confirm(&callback).await.unwrap_err();

    assert!(matches!(err, WebhookError::UnknownCheckoutRequest(_)));
}

#[tokio::test]
async fn test_duplicate_checkout_request_id_rejected_by_store() {
    let ctx = TestContext::new();
    let event_id = ctx.seed_event("Rust Nairobi Meetup").await;

    ctx.seed_payment(&event_id, "ws_CO_100").await;

    let err = ctx
        .payments
        .create(settlement::domain::NewPaymentRecord {
            event_id: event_id.clone(),
            user_id: settlement::domain::UserId::new("user-x"),
            waiting_list_id: settlement::domain::WaitingListId::new("waiting-x"),
            checkout_request_id: settlement::domain::CheckoutRequestId::new("ws_CO_100"),
            amount: 500.0,
            phone_number: "254712345678".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        settlement::domain::StoreError::DuplicateCheckoutRequestId(_)
    ));
}
