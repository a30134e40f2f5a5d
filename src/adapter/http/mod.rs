//! HTTP surface: the two exposed entry points plus the three provider
//! webhooks.
//!
//! Webhook handlers always answer with a well-formed `CallbackAck`: an
//! unacknowledged delivery is treated as undelivered by the provider and
//! resent indefinitely, so even malformed input and internal errors produce
//! a reject envelope rather than an opaque failure.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::{
    CallbackAck, CollectionCallback, DisbursementCallback, EventId, PaymentId, PaymentStatus,
    RefundError, UserId, WebhookError,
};
use crate::service::{InitiatePaymentRequest, Services};

pub fn router(services: Services) -> Router {
    Router::new()
        .route("/api/payments", post(initiate_payment).get(payments_by_status))
        .route("/api/payments/:payment_id", get(payment_status))
        .route("/api/users/:user_id/payments", get(user_payments))
        .route("/api/events/:event_id/refunds", post(refund_event))
        .route("/api/events/:event_id/tickets/:user_id", get(user_ticket))
        .route("/api/mpesa/callback", post(collection_callback))
        .route("/api/mpesa/b2c/callback", post(refund_result_callback))
        .route("/api/mpesa/b2c/timeout", post(refund_timeout_callback))
        .with_state(services)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

async fn initiate_payment(
    State(services): State<Services>,
    payload: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> impl IntoResponse {
    match payload {
        Ok(Json(request)) => {
            let response = services.purchases.initiate(request).await;
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: rejection.body_text(),
            }),
        )
            .into_response(),
    }
}

async fn payment_status(
    State(services): State<Services>,
    Path(payment_id): Path<String>,
) -> impl IntoResponse {
    match services
        .purchases
        .payment(&PaymentId::new(payment_id))
        .await
    {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "Payment not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("payment lookup failed: {e}");
            internal_error()
        }
    }
}

#[derive(Deserialize)]
struct PaymentsQuery {
    status: PaymentStatus,
}

async fn payments_by_status(
    State(services): State<Services>,
    Query(query): Query<PaymentsQuery>,
) -> impl IntoResponse {
    match services.purchases.payments_with_status(query.status).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!("payment listing failed: {e}");
            internal_error()
        }
    }
}

async fn user_payments(
    State(services): State<Services>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match services
        .purchases
        .payments_for_user(&UserId::new(user_id))
        .await
    {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!("payment listing failed: {e}");
            internal_error()
        }
    }
}

async fn user_ticket(
    State(services): State<Services>,
    Path((event_id, user_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match services
        .purchases
        .ticket_for_user(&EventId::new(event_id), &UserId::new(user_id))
        .await
    {
        Ok(Some(ticket)) => (StatusCode::OK, Json(ticket)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "Ticket not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("ticket lookup failed: {e}");
            internal_error()
        }
    }
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Internal server error".to_string(),
        }),
    )
        .into_response()
}

async fn refund_event(
    State(services): State<Services>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    match services
        .refunds
        .refund_event_tickets(&EventId::new(event_id))
        .await
    {
        // The summary itself reports partial failure; the caller decides
        // whether to retry (safe, per-ticket idempotency) or escalate.
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            let status = match &e {
                RefundError::EventNotFound => StatusCode::NOT_FOUND,
                RefundError::AlreadyCanceled => StatusCode::CONFLICT,
                RefundError::CancellationFailed(_) | RefundError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (
                status,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn collection_callback(
    State(services): State<Services>,
    payload: Result<Json<CollectionCallback>, JsonRejection>,
) -> (StatusCode, Json<CallbackAck>) {
    let Ok(Json(callback)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(CallbackAck::rejected("Invalid callback payload")),
        );
    };

    match services.purchases.confirm(&callback).await {
        Ok(_) => (StatusCode::OK, Json(CallbackAck::accepted())),
        Err(e) => reject(e),
    }
}

async fn refund_result_callback(
    State(services): State<Services>,
    payload: Result<Json<DisbursementCallback>, JsonRejection>,
) -> (StatusCode, Json<CallbackAck>) {
    let Ok(Json(callback)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(CallbackAck::rejected("Invalid callback payload")),
        );
    };

    match services.refunds.handle_refund_result(&callback).await {
        Ok(_) => (StatusCode::OK, Json(CallbackAck::accepted())),
        Err(e) => reject(e),
    }
}

async fn refund_timeout_callback(
    State(services): State<Services>,
    payload: Result<Json<DisbursementCallback>, JsonRejection>,
) -> (StatusCode, Json<CallbackAck>) {
    let Ok(Json(callback)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(CallbackAck::rejected("Invalid callback payload")),
        );
    };

    match services.refunds.handle_refund_timeout(&callback).await {
        Ok(_) => (StatusCode::OK, Json(CallbackAck::accepted())),
        Err(e) => reject(e),
    }
}

/// Map a reconciliation failure to the ack envelope the provider expects:
/// 404 for an unresolvable correlation id, 500 for anything internal.
fn reject(e: WebhookError) -> (StatusCode, Json<CallbackAck>) {
    match e {
        WebhookError::UnknownCheckoutRequest(_) => (
            StatusCode::NOT_FOUND,
            Json(CallbackAck::rejected("Payment record not found")),
        ),
        WebhookError::UnknownConversation(_) => (
            StatusCode::NOT_FOUND,
            Json(CallbackAck::rejected("Ticket not found")),
        ),
        WebhookError::Store(e) => {
            error!("webhook processing error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackAck::rejected("Internal server error")),
            )
        }
    }
}
