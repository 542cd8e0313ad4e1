//! Sweep of lapsed subscriptions.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{PaymentStatus, Subscriber, SubscriberUpdate};
use super::store::SubscriptionStore;
use crate::error::Result;

/// Summary of one expiry run.
#[derive(Debug, Clone, Serialize)]
pub struct ExpiryReport {
    pub ok: bool,
    pub run_id: Uuid,
    /// Subscribers successfully marked as expired
    pub processed: usize,
    pub total_expired: usize,
    pub total_active_checked: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub executed_at: DateTime<Utc>,
    pub results: Vec<ExpiryOutcome>,
}

/// What happened to one lapsed subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiryOutcome {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Updated,
    Error,
}

/// Mark every active subscriber whose expiry date is at or before `now` as
/// expired.
///
/// A failed update is recorded in the report and the run continues. Failing
/// to list subscribers fails the run.
pub async fn expire_subscriptions(
    store: &dyn SubscriptionStore,
    now: DateTime<Utc>,
) -> Result<ExpiryReport> {
    let run_id = Uuid::new_v4();
    let active = store.list_by_status(PaymentStatus::Active).await?;
    let lapsed: Vec<&Subscriber> = active.iter().filter(|s| s.is_lapsed(now)).collect();

    info!(
        %run_id,
        active = active.len(),
        lapsed = lapsed.len(),
        "Checking subscriptions for expiry"
    );

    let mut results = Vec::with_capacity(lapsed.len());
    let mut processed = 0;

    for subscriber in &lapsed {
        let update = SubscriberUpdate {
            status: Some(PaymentStatus::Expired),
            notes: Some(expiry_note(subscriber.notes.as_deref(), now)),
            ..Default::default()
        };

        match store.update(&subscriber.id, update).await {
            Ok(()) => {
                processed += 1;
                info!(%run_id, email = %subscriber.email, "Subscriber marked as expired");
                results.push(ExpiryOutcome {
                    email: subscriber.email.clone(),
                    expired_at: subscriber.expires_at,
                    status: OutcomeStatus::Updated,
                    error: None,
                });
            }
            Err(e) => {
                warn!(
                    %run_id,
                    email = %subscriber.email,
                    error = %e,
                    "Failed to expire subscriber"
                );
                results.push(ExpiryOutcome {
                    email: subscriber.email.clone(),
                    expired_at: None,
                    status: OutcomeStatus::Error,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(ExpiryReport {
        ok: true,
        run_id,
        processed,
        total_expired: lapsed.len(),
        total_active_checked: active.len(),
        executed_at: now,
        results,
    })
}

fn serialize_millis<S: Serializer>(
    at: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Append the automatic-expiry marker to existing notes.
fn expiry_note(existing: Option<&str>, now: DateTime<Utc>) -> String {
    let marker = format!(
        "Expirado automaticamente em {}",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    match existing {
        Some(notes) if !notes.is_empty() => format!("{} | {}", notes, marker),
        _ => marker,
    }
}
