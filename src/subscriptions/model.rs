//! Subscriber records as stored by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment status of a subscriber, as written by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "expirado")]
    Expired,
    #[default]
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "cancelado")]
    Cancelled,
}

/// A paying user of the case-management application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(rename = "status_pagamento")]
    pub status: PaymentStatus,
    /// Billing plan, e.g. `mensal`, `anual` or `vitalicio`
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default, rename = "cakto_customer_id")]
    pub customer_id: Option<String>,
    #[serde(default, rename = "cakto_subscription_id")]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    /// Subscribers without an expiry date never expire
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Subscriber {
    /// Whether the subscription has lapsed at `now`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Apply the fields set in `update`, leaving the others untouched.
    pub fn apply(&mut self, update: SubscriberUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(plan) = update.plan {
            self.plan = Some(plan);
        }
        if let Some(customer_id) = update.customer_id {
            self.customer_id = Some(customer_id);
        }
        if let Some(subscription_id) = update.subscription_id {
            self.subscription_id = Some(subscription_id);
        }
        if let Some(paid_at) = update.paid_at {
            self.paid_at = Some(paid_at);
        }
        if let Some(expires_at) = update.expires_at {
            self.expires_at = expires_at;
        }
        if let Some(notes) = update.notes {
            self.notes = Some(notes);
        }
    }
}

/// Partial update applied to a subscriber.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriberUpdate {
    #[serde(rename = "status_pagamento", skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(rename = "cakto_customer_id", skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(rename = "cakto_subscription_id", skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// `Some(None)` clears the expiry date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A subscriber to be created by the backend, which assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewSubscriber {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub fields: SubscriberUpdate,
}
