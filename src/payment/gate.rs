//! Payment verification gate
//!
//! The only point where an unauthenticated "I paid you" claim becomes a
//! trusted ledger mutation. Fail-closed: a signature mismatch rejects
//! with no write at all. After a valid signature, the grant is applied
//! as one partial-merge write guarded by a compare-and-swap on the
//! previously read expiry, so two concurrent verifications for the same
//! user cannot compute their base date from the same stale read.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::db::schemas::PaymentRecord;
use crate::db::store::{SubscriptionGrant, UserStore};
use crate::ledger::{self, Plan};
use crate::payment::signature;
use crate::types::{AshramError, Result};

/// Bounded retries for the grant CAS before escalating to support
const MAX_GRANT_ATTEMPTS: u32 = 3;

/// An unverified payment claim as received from a checkout client
#[derive(Debug, Clone)]
pub struct PaymentClaim {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub user_id: String,
    /// Amount in minor currency units, as reported by the client;
    /// stored for audit only
    pub amount: i64,
    pub plan_name: String,
}

/// Result of a verified-and-applied payment
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub user_id: String,
    pub plan: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// The single-writer boundary for subscription grants
pub struct PaymentGate {
    store: Arc<dyn UserStore>,
    secret: String,
}

impl PaymentGate {
    pub fn new(store: Arc<dyn UserStore>, secret: String) -> Self {
        Self { store, secret }
    }

    /// Verify a payment claim and, on success, extend the subscription.
    ///
    /// Error split matters to support staff:
    /// - `SignatureMismatch`: forged/corrupt claim, nothing stored, no
    ///   refund action needed.
    /// - `Activation`: the signature was genuine but the grant did not
    ///   commit; money has moved at the gateway and the case needs
    ///   manual reconciliation.
    pub async fn verify_and_apply(&self, claim: PaymentClaim) -> Result<VerifiedPayment> {
        if claim.user_id.is_empty() {
            return Err(AshramError::MissingIdentifier("userId"));
        }
        if claim.order_id.is_empty() {
            return Err(AshramError::MissingIdentifier("orderId"));
        }
        if claim.payment_id.is_empty() {
            return Err(AshramError::MissingIdentifier("paymentId"));
        }

        let plan = Plan::from_label(&claim.plan_name)?;

        if !signature::verify(
            &claim.order_id,
            &claim.payment_id,
            &self.secret,
            &claim.signature,
        ) {
            // Log ids for fraud review; the unverified amount is not
            // stored anywhere as truth
            warn!(
                order_id = %claim.order_id,
                payment_id = %claim.payment_id,
                user_id = %claim.user_id,
                "payment signature mismatch, rejecting claim"
            );
            return Err(AshramError::SignatureMismatch);
        }

        // Signature holds; from here every failure is an activation
        // failure, never a trust failure.
        self.apply_grant(&claim, plan).await.map_err(|e| match e {
            AshramError::Activation(_) => e,
            other => {
                error!(
                    order_id = %claim.order_id,
                    payment_id = %claim.payment_id,
                    user_id = %claim.user_id,
                    error = %other,
                    "verified payment failed to activate"
                );
                AshramError::Activation(other.to_string())
            }
        })
    }

    async fn apply_grant(&self, claim: &PaymentClaim, plan: Plan) -> Result<VerifiedPayment> {
        for attempt in 1..=MAX_GRANT_ATTEMPTS {
            let now = Utc::now();
            let user = self.store.ensure(&claim.user_id, None).await?;
            let new_expiry = ledger::extend_subscription(&user, plan, now)?;

            let grant = SubscriptionGrant {
                expires: new_expiry,
                plan: claim.plan_name.clone(),
                payment: PaymentRecord {
                    order_id: claim.order_id.clone(),
                    payment_id: claim.payment_id.clone(),
                    signature: claim.signature.clone(),
                    amount: claim.amount,
                },
                granted_at: now,
            };

            let applied = self
                .store
                .grant_subscription(&claim.user_id, user.subscription_expires, &grant)
                .await?;

            if applied {
                info!(
                    order_id = %claim.order_id,
                    payment_id = %claim.payment_id,
                    user_id = %claim.user_id,
                    plan = %claim.plan_name,
                    expires = %new_expiry,
                    "subscription extended"
                );
                return Ok(VerifiedPayment {
                    user_id: claim.user_id.clone(),
                    plan: claim.plan_name.clone(),
                    expires_at: new_expiry,
                });
            }

            // A concurrent grant moved the expiry; recompute the base
            // date from a fresh read
            warn!(
                user_id = %claim.user_id,
                attempt,
                "subscription grant lost a concurrent race, retrying"
            );
        }

        // Exhaustion is a stale-read failure at this layer; the caller
        // wraps it into Activation because the signature already held.
        Err(AshramError::StaleRead(format!(
            "grant for order {} lost {} consecutive races",
            claim.order_id, MAX_GRANT_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryUserStore;
    use crate::ledger::effective_subscription;
    use crate::payment::signature::expected_signature;
    use chrono::Months;

    const SECRET: &str = "test_gateway_secret";

    fn gate_with_store() -> (PaymentGate, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        let gate = PaymentGate::new(store.clone(), SECRET.to_string());
        (gate, store)
    }

    fn signed_claim(user_id: &str, plan_name: &str) -> PaymentClaim {
        PaymentClaim {
            order_id: "order_1".into(),
            payment_id: "pay_1".into(),
            signature: expected_signature("order_1", "pay_1", SECRET),
            user_id: user_id.into(),
            amount: 49900,
            plan_name: plan_name.into(),
        }
    }

    #[tokio::test]
    async fn valid_claim_activates_subscription() {
        let (gate, store) = gate_with_store();

        let verified = gate
            .verify_and_apply(signed_claim("uid", "Yogi Monthly"))
            .await
            .unwrap();
        assert_eq!(verified.user_id, "uid");

        let user = store.fetch("uid").await.unwrap().unwrap();
        assert!(effective_subscription(&user, Utc::now()).active);
        assert_eq!(user.subscription_plan.as_deref(), Some("Yogi Monthly"));

        let payment = user.last_payment.unwrap();
        assert_eq!(payment.order_id, "order_1");
        assert_eq!(payment.amount, 49900);
    }

    #[tokio::test]
    async fn tampered_signature_rejected_with_no_mutation() {
        let (gate, store) = gate_with_store();

        let mut claim = signed_claim("uid", "Yogi Monthly");
        // Flip the final hex character
        let last = claim.signature.pop().unwrap();
        claim.signature.push(if last == '0' { '1' } else { '0' });

        let err = gate.verify_and_apply(claim).await.unwrap_err();
        assert!(matches!(err, AshramError::SignatureMismatch));

        // Fail closed: not even a bootstrap record is created
        assert!(store.fetch("uid").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn renewal_stacks_on_remaining_time() {
        let (gate, store) = gate_with_store();

        let first = gate
            .verify_and_apply(signed_claim("uid", "Yogi Monthly"))
            .await
            .unwrap();
        let second = gate
            .verify_and_apply(signed_claim("uid", "Yogi Monthly"))
            .await
            .unwrap();

        // Second term is stacked on the first expiry, not reset to
        // now + 1 month (millisecond precision via the stored value)
        let expected = bson::DateTime::from_chrono(first.expires_at)
            .to_chrono()
            .checked_add_months(Months::new(1))
            .unwrap();
        assert_eq!(second.expires_at, expected);

        let user = store.fetch("uid").await.unwrap().unwrap();
        assert_eq!(user.subscription_expires.unwrap().to_chrono(), expected);
    }

    #[tokio::test]
    async fn unknown_plan_rejected_before_any_write() {
        let (gate, store) = gate_with_store();

        let err = gate
            .verify_and_apply(signed_claim("uid", "Yogi Lifetime"))
            .await
            .unwrap_err();
        assert!(matches!(err, AshramError::BadRequest(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_user_id_rejected_locally() {
        let (gate, _) = gate_with_store();
        let err = gate
            .verify_and_apply(signed_claim("", "Yogi Monthly"))
            .await
            .unwrap_err();
        assert!(matches!(err, AshramError::MissingIdentifier("userId")));
    }

    /// Store whose CAS always reports a lost race
    struct ContestedStore(MemoryUserStore);

    #[async_trait::async_trait]
    impl crate::db::store::UserStore for ContestedStore {
        async fn fetch(&self, user_id: &str) -> crate::types::Result<Option<crate::db::schemas::UserDoc>> {
            self.0.fetch(user_id).await
        }

        async fn ensure(
            &self,
            user_id: &str,
            display_name: Option<&str>,
        ) -> crate::types::Result<crate::db::schemas::UserDoc> {
            self.0.ensure(user_id, display_name).await
        }

        async fn merge(&self, user_id: &str, patch: crate::db::patch::UserPatch) -> crate::types::Result<()> {
            self.0.merge(user_id, patch).await
        }

        async fn grant_subscription(
            &self,
            _user_id: &str,
            _expected: Option<bson::DateTime>,
            _grant: &SubscriptionGrant,
        ) -> crate::types::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn exhausted_cas_retries_escalate_to_activation() {
        let store = Arc::new(ContestedStore(MemoryUserStore::new()));
        let gate = PaymentGate::new(store, SECRET.to_string());

        // Signature holds, so a grant that can never commit must come
        // back as an activation failure, not a trust failure
        let err = gate
            .verify_and_apply(signed_claim("uid", "Yogi Monthly"))
            .await
            .unwrap_err();
        assert!(matches!(err, AshramError::Activation(_)));
    }

    #[tokio::test]
    async fn concurrent_grants_both_land_via_cas_retry() {
        let (gate, store) = gate_with_store();
        let gate = Arc::new(gate);

        let a = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.verify_and_apply(signed_claim("uid", "Yogi Monthly"))
                    .await
            })
        };
        let b = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.verify_and_apply(signed_claim("uid", "Yogi Monthly"))
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Two verified monthly payments extend by two months total; the
        // loser of the race recomputes from the winner's expiry
        let user = store.fetch("uid").await.unwrap().unwrap();
        let expiry = user.subscription_expires.unwrap().to_chrono();
        let lower_bound = Utc::now().checked_add_months(Months::new(2)).unwrap()
            - chrono::Duration::minutes(5);
        assert!(expiry > lower_bound);
    }
}
