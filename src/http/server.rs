//! HTTP server implementation.

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers::{self, AppState};
use super::middleware::RateLimitLayer;
use crate::config::RateLimitingConfig;
use crate::error::{LexgateError, Result};
use crate::ratelimit::{Clock, LimitConfig, RateLimiter, SweepPolicy, WindowStore};

/// Rate limiters guarding the service's endpoints.
#[derive(Debug, Clone)]
pub struct Limiters {
    pub check: RateLimiter,
    pub expire: RateLimiter,
    pub webhook: RateLimiter,
}

impl Limiters {
    /// Build every endpoint limiter over one shared store.
    ///
    /// A probabilistic sweep policy is applied on each limiter's check path;
    /// other policies are left to the store owner.
    pub fn from_config(
        config: &RateLimitingConfig,
        store: &WindowStore,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let sweep = match config.sweep.policy()? {
            policy @ SweepPolicy::Probabilistic { .. } => policy,
            _ => SweepPolicy::Disabled,
        };

        let build = |scope: &str, limit: LimitConfig| -> Result<RateLimiter> {
            RateLimiter::builder(scope, limit, store.clone())
                .clock(Arc::clone(&clock))
                .sweep(sweep)
                .build()
        };

        Ok(Self {
            check: build("check", config.check.resolve()?)?,
            expire: build("expire", config.expire.resolve()?)?,
            webhook: build("webhook", config.webhook.resolve()?)?,
        })
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>, limiters: Limiters) -> Router {
    let check_routes = Router::new()
        .route("/api/rate-limit/check", post(handlers::check))
        .route_layer(RateLimitLayer::new(limiters.check));

    let expire_routes = Router::new()
        .route("/api/subscriptions/expire", post(handlers::expire))
        .route_layer(RateLimitLayer::new(limiters.expire));

    let webhook_routes = Router::new()
        .route(
            "/api/webhooks/payment",
            post(handlers::payment_webhook).fallback(handlers::method_not_allowed),
        )
        .route_layer(RateLimitLayer::new(limiters.webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(check_routes)
        .merge(expire_routes)
        .merge(webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for the gating service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    router: Router,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, router: Router) -> Self {
        Self { addr, router }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "HTTP server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                LexgateError::Io(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::PAYMENT_SIGNATURE_HEADER;
    use crate::ratelimit::{LimitSpec, ManualClock, SweepConfig, SweepMode};
    use crate::subscriptions::{MemorySubscriptionStore, PaymentStatus, Subscriber};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    fn app(
        cron_secret: Option<&str>,
        expire_limit: LimitSpec,
    ) -> (Router, Arc<MemorySubscriptionStore>) {
        let subscriptions = Arc::new(MemorySubscriptionStore::with_subscribers(vec![Subscriber {
            id: "1".to_string(),
            email: "ana@example.com".to_string(),
            status: PaymentStatus::Active,
            expires_at: Some(Utc::now() - chrono::Duration::days(1)),
            ..Default::default()
        }]));

        let config = RateLimitingConfig {
            check: LimitSpec::Custom(LimitConfig::new(2, 60_000)),
            expire: expire_limit,
            ..Default::default()
        };
        let limiters = Limiters::from_config(
            &config,
            &WindowStore::new(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
        .unwrap();

        let state = Arc::new(AppState {
            subscriptions: subscriptions.clone(),
            cron_secret: cron_secret.map(str::to_string),
            webhook_secret: Some("wh-s3cret".to_string()),
        });
        (router(state, limiters), subscriptions)
    }

    fn unlimited() -> LimitSpec {
        LimitSpec::Custom(LimitConfig::new(10, 60_000))
    }

    fn webhook(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/webhooks/payment")
            .header(PAYMENT_SIGNATURE_HEADER, "wh-s3cret")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.5")
            .body(Body::empty())
            .unwrap()
    }

    async fn json(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(None, unlimited());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_check_endpoint_reports_quota() {
        let (app, _) = app(None, unlimited());

        let response = app.clone().oneshot(post("/api/rate-limit/check")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "1");
        let body = json(response).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["limit"], 2);
        assert_eq!(body["remaining"], 1);
        assert_eq!(body["reset"], 1_700_000_060_000u64);

        app.clone().oneshot(post("/api/rate-limit/check")).await.unwrap();
        let response = app.oneshot(post("/api/rate-limit/check")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json(response).await["error"], "rate_limit_exceeded");
    }

    #[tokio::test]
    async fn test_endpoints_count_separately() {
        let (app, _) = app(None, unlimited());

        for _ in 0..3 {
            app.clone().oneshot(post("/api/rate-limit/check")).await.unwrap();
        }
        let response = app.oneshot(post("/api/subscriptions/expire")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expire_runs_sweep() {
        let (app, subscriptions) = app(None, unlimited());

        let response = app.oneshot(post("/api/subscriptions/expire")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["processed"], 1);
        assert_eq!(body["total_active_checked"], 1);
        assert_eq!(body["results"][0]["status"], "updated");
        assert_eq!(subscriptions.get("1").unwrap().status, PaymentStatus::Expired);
    }

    #[tokio::test]
    async fn test_expire_requires_secret_when_configured() {
        let (app, subscriptions) = app(Some("s3cret"), unlimited());

        let response = app.clone().oneshot(post("/api/subscriptions/expire")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json(response).await,
            serde_json::json!({ "ok": false, "error": "Unauthorized" })
        );
        assert_eq!(subscriptions.get("1").unwrap().status, PaymentStatus::Active);

        let mut with_header = post("/api/subscriptions/expire");
        with_header
            .headers_mut()
            .insert("x-cron-secret", "s3cret".parse().unwrap());
        let response = app.clone().oneshot(with_header).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post("/api/subscriptions/expire?secret=s3cret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expire_is_rate_limited() {
        let (app, _) = app(None, LimitSpec::Custom(LimitConfig::new(1, 60_000)));

        let response = app.clone().oneshot(post("/api/subscriptions/expire")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(post("/api/subscriptions/expire")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");
    }

    #[tokio::test]
    async fn test_webhook_activates_and_cancels() {
        let (app, subscriptions) = app(None, unlimited());

        let response = app
            .clone()
            .oneshot(webhook(serde_json::json!({
                "type": "payment.succeeded",
                "data": { "email": "Carla@Example.com", "plan": "anual" }
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json(response).await,
            serde_json::json!({ "ok": true, "status": "ativo", "email": "carla@example.com" })
        );
        assert_eq!(subscriptions.len(), 2);

        let response = app
            .clone()
            .oneshot(webhook(serde_json::json!({
                "type": "subscription.canceled",
                "data": { "email": "ana@example.com" }
            })))
            .await
            .unwrap();
        assert_eq!(
            json(response).await,
            serde_json::json!({ "ok": true, "status": "cancelado", "email": "ana@example.com" })
        );
        assert_eq!(subscriptions.get("1").unwrap().status, PaymentStatus::Cancelled);

        let response = app
            .oneshot(webhook(serde_json::json!({
                "type": "customer.updated",
                "data": { "email": "ana@example.com" }
            })))
            .await
            .unwrap();
        assert_eq!(
            json(response).await,
            serde_json::json!({ "ok": true, "ignored": "customer.updated" })
        );
    }

    #[tokio::test]
    async fn test_webhook_error_statuses() {
        let (app, subscriptions) = app(None, unlimited());

        let mut unsigned = webhook(serde_json::json!({
            "type": "invoice.paid",
            "data": { "email": "ana@example.com" }
        }));
        unsigned.headers_mut().remove(PAYMENT_SIGNATURE_HEADER);
        let response = app.clone().oneshot(unsigned).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json(response).await,
            serde_json::json!({ "ok": false, "error": "Invalid signature" })
        );

        let response = app
            .clone()
            .oneshot(webhook(serde_json::json!({ "type": "invoice.paid" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Malformed payload");

        let response = app
            .clone()
            .oneshot(webhook(serde_json::json!({ "type": "", "data": {} })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(webhook(serde_json::json!({ "type": "invoice.paid", "data": {} })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(response).await["error"], "Missing email");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/webhooks/payment")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json(response).await["error"], "Method not allowed");

        assert_eq!(subscriptions.get("1").unwrap().status, PaymentStatus::Active);
    }

    #[tokio::test]
    async fn test_webhook_accepts_token_query() {
        let (app, _) = app(None, unlimited());

        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/payment?token=wh-s3cret")
            .body(Body::from(
                r#"{"type":"invoice.paid","data":{"email":"ana@example.com"}}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_limiters_from_config_validate() {
        let config = RateLimitingConfig {
            check: LimitSpec::Custom(LimitConfig::new(0, 60_000)),
            ..Default::default()
        };
        let result =
            Limiters::from_config(&config, &WindowStore::new(), Arc::new(ManualClock::new(0)));
        assert!(result.is_err());

        let config = RateLimitingConfig {
            sweep: SweepConfig {
                mode: SweepMode::Probabilistic,
                probability: 2.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let result =
            Limiters::from_config(&config, &WindowStore::new(), Arc::new(ManualClock::new(0)));
        assert!(result.is_err());
    }

    #[test]
    fn test_limiters_use_distinct_scopes() {
        let limiters = Limiters::from_config(
            &RateLimitingConfig::default(),
            &WindowStore::new(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        assert_eq!(limiters.check.scope(), "check");
        assert_eq!(limiters.expire.scope(), "expire");
        assert_eq!(limiters.webhook.scope(), "webhook");
        assert_eq!(limiters.check.config().max_requests, 100);
        assert_eq!(limiters.expire.config().max_requests, 10);
    }
}
