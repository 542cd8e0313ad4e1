//! Payment provider events that open or close a subscriber's access.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::model::{NewSubscriber, PaymentStatus, SubscriberUpdate};
use super::store::SubscriptionStore;
use crate::error::LexgateError;

/// Events that grant access.
pub const ACTIVATING_EVENTS: [&str; 3] =
    ["payment.succeeded", "subscription.activated", "invoice.paid"];

/// Events that revoke access.
pub const CANCELLING_EVENTS: [&str; 3] = [
    "payment.refunded",
    "subscription.canceled",
    "invoice.payment_failed",
];

/// Plan recorded when the event does not name one.
pub const DEFAULT_PLAN: &str = "mensal";

/// A webhook delivery from the payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: PaymentData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentData {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    /// End of the paid period; absent for plans that never expire
    #[serde(default)]
    pub period_end: Option<DateTime<Utc>>,
}

/// What an event did to the subscriber base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Activated { email: String },
    Cancelled { email: String },
    /// The event type does not affect access
    Ignored { kind: String },
}

#[derive(Debug, Error)]
pub enum PaymentEventError {
    #[error("event type is missing")]
    MissingType,

    #[error("event carries no email")]
    MissingEmail,

    #[error(transparent)]
    Store(#[from] LexgateError),
}

/// Apply a payment event to the subscriber store.
///
/// Activating events mark the subscriber active and record the billing
/// details, creating the subscriber when the email is unknown. Cancelling
/// events mark an existing subscriber cancelled and never create one.
pub async fn apply_payment_event(
    store: &dyn SubscriptionStore,
    event: &PaymentEvent,
    now: DateTime<Utc>,
) -> Result<PaymentOutcome, PaymentEventError> {
    let kind = event.kind.trim();
    if kind.is_empty() {
        return Err(PaymentEventError::MissingType);
    }

    let data = &event.data;
    let email = data
        .email
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if email.is_empty() {
        return Err(PaymentEventError::MissingEmail);
    }

    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    if ACTIVATING_EVENTS.contains(&kind) {
        let fields = SubscriberUpdate {
            status: Some(PaymentStatus::Active),
            plan: Some(data.plan.clone().unwrap_or_else(|| DEFAULT_PLAN.to_string())),
            customer_id: data.customer_id.clone(),
            subscription_id: data.subscription_id.clone(),
            paid_at: Some(data.paid_at.unwrap_or(now)),
            expires_at: Some(data.period_end),
            notes: Some(format!("Ativado via webhook {} em {}", kind, stamp)),
        };

        match store.find_by_email(&email).await? {
            Some(existing) => store.update(&existing.id, fields).await?,
            None => {
                let created = store
                    .create(NewSubscriber {
                        email: email.clone(),
                        full_name: data.full_name.clone(),
                        fields,
                    })
                    .await?;
                debug!(id = %created.id, "Created subscriber from payment event");
            }
        }

        info!(event = kind, %email, "Subscriber activated");
        return Ok(PaymentOutcome::Activated { email });
    }

    if CANCELLING_EVENTS.contains(&kind) {
        if let Some(existing) = store.find_by_email(&email).await? {
            let update = SubscriberUpdate {
                status: Some(PaymentStatus::Cancelled),
                notes: Some(format!("Cancelado por webhook {} em {}", kind, stamp)),
                ..Default::default()
            };
            store.update(&existing.id, update).await?;
        }

        info!(event = kind, %email, "Subscriber cancelled");
        return Ok(PaymentOutcome::Cancelled { email });
    }

    debug!(event = kind, "Ignoring payment event");
    Ok(PaymentOutcome::Ignored {
        kind: kind.to_string(),
    })
}
