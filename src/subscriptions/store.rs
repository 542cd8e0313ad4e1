//! Subscriber storage seam.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use super::model::{NewSubscriber, PaymentStatus, Subscriber, SubscriberUpdate};
use crate::error::{LexgateError, Result};

/// Access to subscriber records held by the backend.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// All subscribers currently in `status`.
    async fn list_by_status(&self, status: PaymentStatus) -> Result<Vec<Subscriber>>;

    /// The subscriber registered under `email`, if any.
    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>>;

    /// Apply `update` to the subscriber with `id`.
    async fn update(&self, id: &str, update: SubscriberUpdate) -> Result<()>;

    /// Create a subscriber and return it with its assigned id.
    async fn create(&self, subscriber: NewSubscriber) -> Result<Subscriber>;
}

/// Subscriber store kept in process memory.
///
/// Used for local runs and tests; production deployments implement
/// [`SubscriptionStore`] against the hosted backend.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscribers: RwLock<HashMap<String, Subscriber>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscribers(subscribers: impl IntoIterator<Item = Subscriber>) -> Self {
        let subscribers = subscribers
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        Self {
            subscribers: RwLock::new(subscribers),
        }
    }

    /// Load subscribers from a YAML list.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let subscribers: Vec<Subscriber> = serde_yaml::from_str(yaml)
            .map_err(|e| LexgateError::Config(format!("Failed to parse subscribers: {}", e)))?;
        Ok(Self::with_subscribers(subscribers))
    }

    /// Load subscribers from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading subscribers");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn get(&self, id: &str) -> Option<Subscriber> {
        self.subscribers.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn list_by_status(&self, status: PaymentStatus) -> Result<Vec<Subscriber>> {
        let subscribers = self.subscribers.read();
        let mut matching: Vec<Subscriber> = subscribers
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let subscribers = self.subscribers.read();
        Ok(subscribers
            .values()
            .filter(|s| s.email.eq_ignore_ascii_case(email))
            .min_by(|a, b| a.id.cmp(&b.id))
            .cloned())
    }

    async fn update(&self, id: &str, update: SubscriberUpdate) -> Result<()> {
        let mut subscribers = self.subscribers.write();
        let subscriber = subscribers
            .get_mut(id)
            .ok_or_else(|| LexgateError::Store(format!("subscriber {} not found", id)))?;

        subscriber.apply(update);
        Ok(())
    }

    async fn create(&self, new: NewSubscriber) -> Result<Subscriber> {
        let mut subscriber = Subscriber {
            id: Uuid::new_v4().to_string(),
            email: new.email,
            full_name: new.full_name,
            ..Default::default()
        };
        subscriber.apply(new.fields);

        self.subscribers
            .write()
            .insert(subscriber.id.clone(), subscriber.clone());
        Ok(subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"
- id: "1"
  email: ana@example.com
  status_pagamento: ativo
  expires_at: 2026-01-01T00:00:00Z
- id: "2"
  email: bruno@example.com
  status_pagamento: pendente
"#;

    #[test]
    fn test_from_yaml() {
        let store = MemorySubscriptionStore::from_yaml(USERS).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("2").unwrap().status, PaymentStatus::Pending);
        assert!(store.get("2").unwrap().expires_at.is_none());
    }

    #[test]
    fn test_from_yaml_rejects_unknown_status() {
        let yaml = r#"
- id: "1"
  email: ana@example.com
  status_pagamento: suspenso
"#;
        assert!(matches!(
            MemorySubscriptionStore::from_yaml(yaml),
            Err(LexgateError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let store = MemorySubscriptionStore::from_yaml(USERS).unwrap();

        let active = store.list_by_status(PaymentStatus::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].email, "ana@example.com");

        let expired = store.list_by_status(PaymentStatus::Expired).await.unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn test_update() {
        let store = MemorySubscriptionStore::from_yaml(USERS).unwrap();

        store
            .update(
                "1",
                SubscriberUpdate {
                    status: Some(PaymentStatus::Expired),
                    notes: Some("manual".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store.get("1").unwrap();
        assert_eq!(updated.status, PaymentStatus::Expired);
        assert_eq!(updated.notes.as_deref(), Some("manual"));
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let store = MemorySubscriptionStore::from_yaml(USERS).unwrap();

        let found = store.find_by_email("bruno@example.com").await.unwrap();
        assert_eq!(found.unwrap().id, "2");

        let found = store.find_by_email("ANA@example.com").await.unwrap();
        assert_eq!(found.unwrap().id, "1");

        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let store = MemorySubscriptionStore::new();

        let created = store
            .create(NewSubscriber {
                email: "carla@example.com".to_string(),
                full_name: Some("Carla Souza".to_string()),
                fields: SubscriberUpdate {
                    status: Some(PaymentStatus::Active),
                    plan: Some("anual".to_string()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(store.len(), 1);

        let stored = store.get(&created.id).unwrap();
        assert_eq!(stored, created);
        assert_eq!(stored.status, PaymentStatus::Active);
        assert_eq!(stored.plan.as_deref(), Some("anual"));
        assert_eq!(stored.full_name.as_deref(), Some("Carla Souza"));
    }

    #[test]
    fn test_update_missing_subscriber() {
        let store = MemorySubscriptionStore::new();
        let result = tokio_test::block_on(store.update("404", SubscriberUpdate::default()));
        assert!(matches!(result, Err(LexgateError::Store(_))));
    }
}
