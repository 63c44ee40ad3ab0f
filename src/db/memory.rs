//! In-memory user store
//!
//! Backs dev mode when MongoDB is unreachable, and serves as the test
//! fake for the payment gate and progress tracker. Applies the same
//! `UserPatch` semantics as the MongoDB implementation, including the
//! compare-and-swap guard on subscription grants.

use async_trait::async_trait;
use bson::DateTime;
use dashmap::DashMap;

use crate::db::patch::UserPatch;
use crate::db::store::{grant_fields, SubscriptionGrant, UserStore};
use crate::db::schemas::UserDoc;
use crate::types::{AshramError, Result};

/// Process-local user store keyed by user id
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserDoc>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly (tests)
    pub fn insert(&self, user: UserDoc) {
        self.users.insert(user.user_id.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<UserDoc>> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }
        Ok(self.users.get(user_id).map(|entry| entry.clone()))
    }

    async fn ensure(&self, user_id: &str, display_name: Option<&str>) -> Result<UserDoc> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }
        let mut entry = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserDoc::new(user_id.to_string(), display_name.map(String::from)));
        if let Some(name) = display_name {
            if entry.display_name.as_deref() != Some(name) {
                entry.display_name = Some(name.to_string());
            }
        }
        Ok(entry.clone())
    }

    async fn merge(&self, user_id: &str, patch: UserPatch) -> Result<()> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }
        // Validate before creating the record, like the Mongo path
        patch.validate()?;

        let mut entry = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserDoc::new(user_id.to_string(), None));
        patch.apply_to(entry.value_mut())
    }

    async fn grant_subscription(
        &self,
        user_id: &str,
        expected: Option<DateTime>,
        grant: &SubscriptionGrant,
    ) -> Result<bool> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }

        let mut entry = match self.users.get_mut(user_id) {
            Some(entry) => entry,
            None => return Ok(false),
        };

        // CAS: the stored expiry must still be what the grant was
        // computed from (millisecond comparison, as MongoDB stores it)
        if entry.subscription_expires != expected {
            return Ok(false);
        }

        grant_fields(entry.value_mut(), grant);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::PaymentRecord;
    use chrono::{Duration, Utc};

    fn grant(expires: chrono::DateTime<Utc>) -> SubscriptionGrant {
        SubscriptionGrant {
            expires,
            plan: "Yogi Monthly".into(),
            payment: PaymentRecord {
                order_id: "order_1".into(),
                payment_id: "pay_1".into(),
                signature: "sig".into(),
                amount: 49900,
            },
            granted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let store = MemoryUserStore::new();
        let first = store.ensure("uid", Some("Asha")).await.unwrap();
        let second = store.ensure("uid", None).await.unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(second.display_name.as_deref(), Some("Asha"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn merge_bootstraps_missing_record() {
        let store = MemoryUserStore::new();
        store
            .merge(
                "uid",
                UserPatch::Theme {
                    theme: "dark".into(),
                },
            )
            .await
            .unwrap();
        let user = store.fetch("uid").await.unwrap().unwrap();
        assert_eq!(user.theme.as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn grant_cas_rejects_stale_expectation() {
        let store = MemoryUserStore::new();
        store.ensure("uid", None).await.unwrap();

        let first_expiry = Utc::now() + Duration::days(30);
        assert!(store
            .grant_subscription("uid", None, &grant(first_expiry))
            .await
            .unwrap());

        // Second grant computed against the pre-first-grant state loses
        let applied = store
            .grant_subscription("uid", None, &grant(Utc::now() + Duration::days(60)))
            .await
            .unwrap();
        assert!(!applied);

        let user = store.fetch("uid").await.unwrap().unwrap();
        assert_eq!(
            user.subscription_expires.unwrap().to_chrono().timestamp_millis(),
            bson::DateTime::from_chrono(first_expiry).to_chrono().timestamp_millis()
        );
    }

    #[tokio::test]
    async fn empty_user_id_rejected_locally() {
        let store = MemoryUserStore::new();
        assert!(matches!(
            store.fetch("").await,
            Err(AshramError::MissingIdentifier("userId"))
        ));
    }
}
