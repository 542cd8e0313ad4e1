//! Tower middleware guarding a service with a [`RateLimiter`].
//!
//! The check runs synchronously inside `call`, before the inner future is
//! created, so the read-increment-compare for a caller never spans an await
//! point.

use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::ratelimit::{Admission, Decision, RateLimiter, Rejection};

/// Layer applying a [`RateLimiter`] to every request of the wrapped service.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Guard `service` with `limiter`.
///
/// Rejected requests are answered with 429 and never reach `service`.
/// Admitted requests carry their [`Admission`] in the request extensions and
/// get the inner response back unchanged, errors included.
pub fn wrap<S>(service: S, limiter: RateLimiter) -> RateLimitService<S> {
    RateLimitLayer::new(limiter).layer(service)
}

/// Service produced by [`RateLimitLayer`].
#[derive(Debug, Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S, B> Service<Request<B>> for RateLimitService<S>
where
    S: Service<Request<B>, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        match self.limiter.check(req.headers()) {
            Decision::Reject(rejection) => {
                let response = rejection.into_response();
                Box::pin(async move { Ok(response) })
            }
            Decision::Admit(admission) => {
                req.extensions_mut().insert(admission);
                Box::pin(self.inner.call(req))
            }
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(Rejection::STATUS).unwrap_or(StatusCode::TOO_MANY_REQUESTS);
        let mut response = (status, Json(self.body())).into_response();
        insert_headers(&mut response, self.headers());
        response
    }
}

/// Copy `X-RateLimit-*` headers for an admitted request onto `response`.
pub fn apply_admission_headers(response: &mut Response, admission: &Admission) {
    insert_headers(response, admission.headers());
}

fn insert_headers<I>(response: &mut Response, headers: I)
where
    I: IntoIterator<Item = (&'static str, String)>,
{
    let map = response.headers_mut();
    for (name, value) in headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            map.insert(HeaderName::from_static(name), value);
        }
    }
}
