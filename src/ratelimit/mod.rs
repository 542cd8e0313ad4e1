//! Rate limiting logic and state management.

mod clock;
mod decision;
mod identity;
mod key;
mod limiter;
mod rules;
mod store;
mod sweep;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{Admission, Decision, Rejection, RejectionBody, RATE_LIMIT_EXCEEDED};
pub use identity::{
    CallerIdentity, HeaderIdentityResolver, IdentityResolver, IdentitySource, UNKNOWN_IDENTITY,
};
pub use key::WindowKey;
pub use limiter::{RateLimiter, RateLimiterBuilder};
pub use rules::{LimitConfig, LimitSpec, Preset, DEFAULT_MESSAGE};
pub use store::WindowStore;
pub use sweep::{spawn_sweeper, SweepConfig, SweepMode, SweepPolicy};
pub use window::WindowRecord;
