//! HTTP handlers.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::middleware::apply_admission_headers;
use crate::ratelimit::Admission;
use crate::subscriptions::{
    apply_payment_event, expire_subscriptions, PaymentEvent, PaymentEventError, PaymentOutcome,
    PaymentStatus, SubscriptionStore,
};

/// Header carrying the scheduler's shared secret.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Header carrying the payment provider's shared secret.
pub const PAYMENT_SIGNATURE_HEADER: &str = "x-cakto-signature";

/// Shared application state.
pub struct AppState {
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// Shared secret the scheduler must present, open when unset
    pub cron_secret: Option<String>,
    /// Shared secret the payment provider must present, open when unset
    pub webhook_secret: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Rate limit check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

/// Failure body of the subscription endpoints.
#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub ok: bool,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success body of the payment webhook.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<String>,
}

impl From<PaymentOutcome> for WebhookResponse {
    fn from(outcome: PaymentOutcome) -> Self {
        let (status, email, ignored) = match outcome {
            PaymentOutcome::Activated { email } => (Some(PaymentStatus::Active), Some(email), None),
            PaymentOutcome::Cancelled { email } => {
                (Some(PaymentStatus::Cancelled), Some(email), None)
            }
            PaymentOutcome::Ignored { kind } => (None, None, Some(kind)),
        };
        Self {
            ok: true,
            status,
            email,
            ignored,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SecretQuery {
    pub secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

fn failure(status: StatusCode, error: &'static str, message: Option<String>) -> Response {
    (
        status,
        Json(FailureResponse {
            ok: false,
            error,
            message,
        }),
    )
        .into_response()
}

/// Whether the caller presented `expected`, by header or else by query value.
///
/// An unset or empty secret admits every caller.
fn secret_accepted(
    expected: Option<&str>,
    headers: &HeaderMap,
    header: &str,
    query: Option<&str>,
) -> bool {
    let Some(expected) = expected.filter(|s| !s.is_empty()) else {
        return true;
    };
    let provided = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or(query);
    provided == Some(expected)
}

/// Liveness endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "lexgate",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Report the caller's quota after counting this request.
///
/// Rejections are produced by the rate limit layer before this runs.
pub async fn check(Extension(admission): Extension<Admission>) -> Response {
    let mut response = Json(CheckResponse {
        allowed: true,
        limit: admission.limit,
        remaining: admission.remaining,
        reset: admission.reset_time,
    })
    .into_response();
    apply_admission_headers(&mut response, &admission);
    response
}

/// Expire lapsed subscriptions. Called by the scheduler.
pub async fn expire(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SecretQuery>,
    headers: HeaderMap,
) -> Response {
    let accepted = secret_accepted(
        state.cron_secret.as_deref(),
        &headers,
        CRON_SECRET_HEADER,
        query.secret.as_deref(),
    );
    if !accepted {
        warn!("Refused subscription expiry call with missing or wrong secret");
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized", None);
    }

    match expire_subscriptions(state.subscriptions.as_ref(), Utc::now()).await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                processed = report.processed,
                total_expired = report.total_expired,
                "Subscription expiry completed"
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Subscription expiry failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                Some(e.to_string()),
            )
        }
    }
}

/// Apply a payment provider event. Called by the provider's webhook.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let accepted = secret_accepted(
        state.webhook_secret.as_deref(),
        &headers,
        PAYMENT_SIGNATURE_HEADER,
        query.token.as_deref(),
    );
    if !accepted {
        warn!("Refused payment webhook with missing or wrong signature");
        return failure(StatusCode::UNAUTHORIZED, "Invalid signature", None);
    }

    let event: PaymentEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Malformed payment webhook payload");
            return failure(StatusCode::BAD_REQUEST, "Malformed payload", None);
        }
    };

    match apply_payment_event(state.subscriptions.as_ref(), &event, Utc::now()).await {
        Ok(outcome) => (StatusCode::OK, Json(WebhookResponse::from(outcome))).into_response(),
        Err(PaymentEventError::MissingType) => {
            failure(StatusCode::BAD_REQUEST, "Malformed payload", None)
        }
        Err(PaymentEventError::MissingEmail) => {
            failure(StatusCode::UNPROCESSABLE_ENTITY, "Missing email", None)
        }
        Err(PaymentEventError::Store(e)) => {
            error!(error = %e, event = %event.kind, "Payment webhook failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
        }
    }
}

/// Answer methods a route does not serve.
pub async fn method_not_allowed() -> Response {
    failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
}
