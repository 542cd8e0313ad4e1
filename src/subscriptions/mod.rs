//! Subscription lifecycle: records, storage seam, payment events and the
//! expiry sweep.

mod expiry;
mod model;
mod store;
mod webhook;

pub use expiry::{expire_subscriptions, ExpiryOutcome, ExpiryReport, OutcomeStatus};
pub use model::{NewSubscriber, PaymentStatus, Subscriber, SubscriberUpdate};
pub use store::{MemorySubscriptionStore, SubscriptionStore};
pub use webhook::{
    apply_payment_event, PaymentData, PaymentEvent, PaymentEventError, PaymentOutcome,
    ACTIVATING_EVENTS, CANCELLING_EVENTS, DEFAULT_PLAN,
};
