//! Core rate limiter implementation.

use axum::http::HeaderMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::decision::{Admission, Decision, Rejection};
use super::identity::{CallerIdentity, HeaderIdentityResolver, IdentityResolver};
use super::key::WindowKey;
use super::rules::{LimitConfig, Preset};
use super::store::WindowStore;
use super::sweep::SweepPolicy;
use crate::error::Result;

/// A fixed-window rate limiter for one protected endpoint.
///
/// The limiter is cheaply cloneable and safe to share across tasks and
/// threads. Its counters live in the [`WindowStore`] it was built with.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

struct LimiterInner {
    /// Namespace for this limiter's keys in the shared store
    scope: String,
    config: LimitConfig,
    store: WindowStore,
    resolver: Arc<dyn IdentityResolver>,
    clock: Arc<dyn Clock>,
    sweep: SweepPolicy,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("scope", &self.inner.scope)
            .field("config", &self.inner.config)
            .field("sweep", &self.inner.sweep)
            .finish()
    }
}

impl RateLimiter {
    /// Start building a limiter for `scope` backed by `store`.
    pub fn builder(
        scope: impl Into<String>,
        config: impl Into<LimitConfig>,
        store: WindowStore,
    ) -> RateLimiterBuilder {
        RateLimiterBuilder {
            scope: scope.into(),
            config: config.into(),
            store,
            resolver: Arc::new(HeaderIdentityResolver),
            clock: Arc::new(SystemClock),
            sweep: SweepPolicy::Disabled,
        }
    }

    /// Build a limiter with default collaborators.
    pub fn new(scope: impl Into<String>, config: LimitConfig, store: WindowStore) -> Result<Self> {
        Self::builder(scope, config, store).build()
    }

    /// Build a limiter from a preset, scoped under the preset's name.
    pub fn from_preset(preset: Preset, store: WindowStore) -> Result<Self> {
        Self::builder(preset.name(), preset, store).build()
    }

    /// Check a request by its headers.
    ///
    /// Counts the request and decides whether it may proceed.
    pub fn check(&self, headers: &HeaderMap) -> Decision {
        let identity = self.inner.resolver.resolve(headers);
        self.check_identity(&identity)
    }

    /// Check a request from an already resolved caller.
    pub fn check_identity(&self, identity: &CallerIdentity) -> Decision {
        let inner = &*self.inner;
        let now = inner.clock.now_millis();

        if inner.sweep.should_sweep_on_check() {
            inner.store.sweep(now);
        }

        let key = WindowKey::new(&inner.scope, identity);
        let record = inner.store.hit(key, now, inner.config.window_ms);

        trace!(
            scope = %inner.scope,
            identity = %identity,
            count = record.count,
            reset_time = record.reset_time,
            "Checked rate limit"
        );

        if record.count > inner.config.max_requests {
            let rejection = Rejection {
                message: inner.config.message.clone(),
                retry_after_secs: record.secs_until_reset(now),
                limit: inner.config.max_requests,
                window_ms: inner.config.window_ms,
                reset_time: record.reset_time,
            };
            debug!(
                scope = %inner.scope,
                identity = %identity,
                retry_after_secs = rejection.retry_after_secs,
                "Rate limit exceeded"
            );
            Decision::Reject(rejection)
        } else {
            Decision::Admit(Admission {
                limit: inner.config.max_requests,
                remaining: record.remaining(inner.config.max_requests),
                reset_time: record.reset_time,
            })
        }
    }

    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    pub fn config(&self) -> &LimitConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &WindowStore {
        &self.inner.store
    }
}

/// Builder for [`RateLimiter`]. Validation happens in [`build`](Self::build).
pub struct RateLimiterBuilder {
    scope: String,
    config: LimitConfig,
    store: WindowStore,
    resolver: Arc<dyn IdentityResolver>,
    clock: Arc<dyn Clock>,
    sweep: SweepPolicy,
}

impl RateLimiterBuilder {
    pub fn resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sweep policy applied on the check path.
    ///
    /// Only [`SweepPolicy::Probabilistic`] acts per check; periodic sweeping
    /// is owned by whoever owns the store (see `spawn_sweeper`).
    pub fn sweep(mut self, sweep: SweepPolicy) -> Self {
        self.sweep = sweep;
        self
    }

    /// Validate the configuration and build the limiter.
    pub fn build(self) -> Result<RateLimiter> {
        self.config.validate()?;
        self.sweep.validate()?;

        info!(
            scope = %self.scope,
            max_requests = self.config.max_requests,
            window_ms = self.config.window_ms,
            "Creating rate limiter"
        );

        Ok(RateLimiter {
            inner: Arc::new(LimiterInner {
                scope: self.scope,
                config: self.config,
                store: self.store,
                resolver: self.resolver,
                clock: self.clock,
                sweep: self.sweep,
            }),
        })
    }
}
