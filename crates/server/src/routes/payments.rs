use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::{error, info, warn};

use service::payments::gateway::CardDetails;
use service::payments::{initiation, notification, PaymentError, ReconciliationOutcome};

use crate::errors::ApiError;
use crate::observability;
use crate::routes::auth::{AuthContext, ServerState};

/// Proxy the gateway's bearer-token generation for operators.
pub async fn token(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_admin()?;
    let data = state
        .gateway
        .generate_token()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true, "data": data })))
}

#[derive(Debug, Deserialize)]
pub struct InitializePaymentRequest {
    pub term: i32,
}

#[utoipa::path(post, path = "/payments/initialize", tag = "payments", request_body = crate::openapi::InitializePaymentRequest, responses((status = 200, description = "Checkout initiated"), (status = 409, description = "Already paid")))]
pub async fn initialize(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<InitializePaymentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome =
        initiation::initialize_checkout(&state.db, &state.gateway, ctx.user_id, input.term)
            .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "reference": outcome.reference,
        "data": outcome.gateway_response,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub term: i32,
    pub card_name: String,
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

#[utoipa::path(post, path = "/payments/subscription", tag = "payments", request_body = crate::openapi::SubscriptionRequest, responses((status = 200, description = "Subscription initiated"), (status = 409, description = "Already paid")))]
pub async fn subscription(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<SubscriptionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let card = CardDetails {
        card_name: input.card_name,
        card_number: input.card_number,
        expiry_month: input.expiry_month,
        expiry_year: input.expiry_year,
        cvv: input.cvv,
    };
    let outcome = initiation::initialize_subscription(
        &state.db,
        &state.gateway,
        ctx.user_id,
        input.term,
        card,
    )
    .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "reference": outcome.reference,
        "data": outcome.gateway_response,
    })))
}

/// Gateway webhook: acknowledge immediately, reconcile asynchronously.
///
/// The provider retries on slow or missing acks, so nothing here may block on
/// reconciliation; duplicates are handled by the marker check, not by the
/// transport. Internal errors never reach the remote caller.
#[utoipa::path(post, path = "/payments/webhook", tag = "payments", responses((status = 200, description = "Acknowledged")))]
pub async fn webhook(State(state): State<ServerState>, body: Bytes) -> StatusCode {
    observability::WEBHOOK_EVENTS_TOTAL.inc();

    let parsed = notification::parse_notification(&body);
    let notification = match parsed {
        Ok(n) => n,
        Err(e @ PaymentError::UnsupportedEventType(_)) => {
            info!(error = %e, "webhook event skipped");
            observability::RECONCILE_SKIPPED_TOTAL.inc();
            return StatusCode::OK;
        }
        Err(e) => {
            warn!(error = %e, "webhook payload rejected");
            observability::RECONCILE_SKIPPED_TOTAL.inc();
            return StatusCode::OK;
        }
    };

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        match dispatcher.reconcile(&notification).await {
            Ok(ReconciliationOutcome::Applied(ent)) => {
                observability::RECONCILE_APPLIED_TOTAL.inc();
                info!(
                    event_id = %notification.event_id,
                    installments = ent.installments_paid,
                    fully_paid = ent.fully_paid,
                    "webhook reconciled"
                );
            }
            Ok(ReconciliationOutcome::AlreadyProcessed) => {
                observability::RECONCILE_DUPLICATE_TOTAL.inc();
                info!(event_id = %notification.event_id, "webhook duplicate ignored");
            }
            Err(e) => {
                observability::RECONCILE_FAILED_TOTAL.inc();
                error!(
                    event_id = %notification.event_id,
                    code = e.code(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "webhook reconciliation failed"
                );
            }
        }
    });

    StatusCode::OK
}
