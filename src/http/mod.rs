//! HTTP surface: the rate limit middleware, handlers and server.

mod handlers;
mod middleware;
mod server;

pub use handlers::{
    AppState, CheckResponse, FailureResponse, HealthResponse, WebhookResponse, CRON_SECRET_HEADER,
    PAYMENT_SIGNATURE_HEADER,
};
pub use middleware::{apply_admission_headers, wrap, RateLimitLayer, RateLimitService};
pub use server::{router, HttpServer, Limiters};
