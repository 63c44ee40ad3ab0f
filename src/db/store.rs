//! User record store abstraction
//!
//! The core components talk to an injected `UserStore` instead of a
//! module-level client, so the payment gate and tracker can be exercised
//! against the in-memory store in tests and in dev mode without MongoDB.

use async_trait::async_trait;
use bson::{doc, Bson, DateTime};
use chrono::{DateTime as ChronoDateTime, Utc};
use tracing::debug;

use crate::db::mongo::MongoCollection;
use crate::db::patch::UserPatch;
use crate::db::schemas::{PaymentRecord, UserDoc, USER_COLLECTION};
use crate::types::{AshramError, Result};

/// The subscription fields written by one verified payment, persisted
/// as a single partial-merge write.
#[derive(Debug, Clone)]
pub struct SubscriptionGrant {
    pub expires: ChronoDateTime<Utc>,
    pub plan: String,
    pub payment: PaymentRecord,
    pub granted_at: ChronoDateTime<Utc>,
}

/// Store of user records keyed by identity-provider user id
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a record, if present
    async fn fetch(&self, user_id: &str) -> Result<Option<UserDoc>>;

    /// Fetch the record, creating it with empty progress/reader maps if
    /// absent (first-login bootstrap). Safe to call concurrently.
    async fn ensure(&self, user_id: &str, display_name: Option<&str>) -> Result<UserDoc>;

    /// Apply one field-scoped partial write. Creates the record first if
    /// it does not exist yet.
    async fn merge(&self, user_id: &str, patch: UserPatch) -> Result<()>;

    /// Apply a subscription grant if and only if the stored
    /// `subscriptionExpires` still equals `expected` (compare-and-swap).
    /// Returns false when a concurrent grant won the race.
    async fn grant_subscription(
        &self,
        user_id: &str,
        expected: Option<DateTime>,
        grant: &SubscriptionGrant,
    ) -> Result<bool>;
}

/// MongoDB-backed user store
#[derive(Clone)]
pub struct MongoUserStore {
    users: MongoCollection<UserDoc>,
}

impl MongoUserStore {
    pub fn new(users: MongoCollection<UserDoc>) -> Self {
        Self { users }
    }

    pub fn collection_name() -> &'static str {
        USER_COLLECTION
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<UserDoc>> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }
        self.users.find_one(doc! { "userId": user_id }).await
    }

    async fn ensure(&self, user_id: &str, display_name: Option<&str>) -> Result<UserDoc> {
        if let Some(mut user) = self.fetch(user_id).await? {
            // Refresh the display name when the identity provider sends
            // a newer one
            if let Some(name) = display_name {
                if user.display_name.as_deref() != Some(name) {
                    self.users
                        .update_one(
                            doc! { "userId": user_id },
                            doc! { "$set": {
                                "displayName": name,
                                "metadata.updated_at": DateTime::now(),
                            }},
                        )
                        .await?;
                    user.display_name = Some(name.to_string());
                }
            }
            return Ok(user);
        }

        let fresh = UserDoc::new(user_id.to_string(), display_name.map(String::from));
        match self.users.insert_one(fresh).await {
            Ok(_) => {
                debug!(user_id, "created user record on first access");
            }
            // Unique index on userId: a concurrent bootstrap already
            // created the record, fall through to the re-read.
            Err(AshramError::Database(msg)) if msg.contains("E11000") => {
                debug!(user_id, "user record created concurrently");
            }
            Err(e) => return Err(e),
        }

        self.fetch(user_id)
            .await?
            .ok_or_else(|| AshramError::Database("user record vanished after insert".into()))
    }

    async fn merge(&self, user_id: &str, patch: UserPatch) -> Result<()> {
        if user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }

        let update = patch.update_document()?;
        let result = self
            .users
            .update_one(doc! { "userId": user_id }, update.clone())
            .await?;

        if result.matched_count == 0 {
            // First write from a brand-new login; bootstrap then retry once
            self.ensure(user_id, None).await?;
            self.users
                .update_one(doc! { "userId": user_id }, update)
                .await?;
        }

        Ok(())
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

        // CAS guard: the filter pins the expiry this grant was computed
        // from. A null expectation matches both an absent and a null
        // stored field.
        let expected_bson = match expected {
            Some(dt) => Bson::DateTime(dt),
            None => Bson::Null,
        };
        let filter = doc! {
            "userId": user_id,
            "subscriptionExpires": expected_bson,
        };

        let payment = bson::to_bson(&grant.payment)?;
        let update = doc! {
            "$set": {
                "isSubscribed": true,
                "subscriptionExpires": DateTime::from_chrono(grant.expires),
                "subscriptionPlan": grant.plan.as_str(),
                "lastSubscriptionDate": DateTime::from_chrono(grant.granted_at),
                "lastPayment": payment,
                "metadata.updated_at": DateTime::now(),
            }
        };

        let result = self.users.update_one(filter, update).await?;
        Ok(result.matched_count > 0)
    }
}

/// Build the update document used by `grant_subscription`; shared with
/// the memory store so both implementations persist the same shape.
pub(crate) fn grant_fields(user: &mut UserDoc, grant: &SubscriptionGrant) {
    user.is_subscribed = true;
    user.subscription_expires = Some(DateTime::from_chrono(grant.expires));
    user.subscription_plan = Some(grant.plan.clone());
    user.last_subscription_date = Some(DateTime::from_chrono(grant.granted_at));
    user.last_payment = Some(grant.payment.clone());
    user.metadata.updated_at = Some(DateTime::now());
}
