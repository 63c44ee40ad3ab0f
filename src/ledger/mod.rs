//! Subscription ledger
//!
//! The single implementation of "is this user currently entitled to
//! premium content" and of the cumulative extension arithmetic. Every
//! access-deciding read path (account view, wisdom gating, admin
//! listing) goes through `effective_subscription`; no call site
//! recomputes the boolean on its own.
//!
//! Calendar arithmetic uses `chrono::Months`, which clamps to the last
//! valid day of the target month (Jan 31 + 1 month = Feb 28/29). Annual
//! extension is twelve months, so Feb 29 + 1 year clamps to Feb 28.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::db::schemas::UserDoc;
use crate::types::{AshramError, Result};

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Annual,
}

impl Plan {
    /// Parse a plan from its display label ("Yogi Monthly", "annual", ...).
    /// Unknown labels are an error: granting against an unrecognized plan
    /// would silently produce a zero-length subscription.
    pub fn from_label(label: &str) -> Result<Self> {
        let lower = label.to_lowercase();
        if lower.contains("monthly") {
            Ok(Self::Monthly)
        } else if lower.contains("annual") || lower.contains("yearly") {
            Ok(Self::Annual)
        } else {
            Err(AshramError::BadRequest(format!(
                "unknown plan: {:?}",
                label
            )))
        }
    }

    /// Term length in calendar months
    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Annual => 12,
        }
    }
}

/// Derived subscription state; never stored, always recomputed at read
/// time from the authoritative expiry field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSubscription {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Compute the effective subscription state for a record at `now`.
///
/// - No stored expiry: the stored flag stands (legacy/manual-grant
///   fallback).
/// - Expiry strictly in the future: active.
/// - Expiry at or before `now`: inactive, regardless of the stored flag.
pub fn effective_subscription(user: &UserDoc, now: DateTime<Utc>) -> EffectiveSubscription {
    let plan = user.subscription_plan.clone();
    match user.subscription_expires {
        None => EffectiveSubscription {
            active: user.is_subscribed,
            plan,
            expires_at: None,
        },
        Some(expires) => {
            let expires = expires.to_chrono();
            EffectiveSubscription {
                active: expires > now,
                plan,
                expires_at: Some(expires),
            }
        }
    }
}

/// Compute the new expiry for extending `user`'s subscription by one
/// `plan` term at `now`.
///
/// Renewal before expiry stacks on the remaining time; renewal after
/// lapse restarts from `now`.
pub fn extend_subscription(user: &UserDoc, plan: Plan, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let base = match user.subscription_expires.map(|dt| dt.to_chrono()) {
        Some(current) if current > now => current,
        _ => now,
    };

    base.checked_add_months(Months::new(plan.months()))
        .ok_or_else(|| AshramError::Internal("subscription expiry out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn user_with_expiry(expires: Option<DateTime<Utc>>, is_subscribed: bool) -> UserDoc {
        let mut user = UserDoc::new("uid".into(), None);
        user.subscription_expires = expires.map(bson::DateTime::from_chrono);
        user.is_subscribed = is_subscribed;
        user
    }

    #[test]
    fn future_expiry_is_active() {
        let now = Utc::now();
        let user = user_with_expiry(Some(now + Duration::days(3)), false);
        assert!(effective_subscription(&user, now).active);
    }

    #[test]
    fn past_expiry_overrides_stored_flag() {
        let now = Utc::now();
        let user = user_with_expiry(Some(now - Duration::days(3)), true);
        assert!(!effective_subscription(&user, now).active);
    }

    #[test]
    fn expiry_exactly_now_is_inactive() {
        let now = Utc::now();
        // bson::DateTime has millisecond precision; pin now to it so the
        // boundary comparison is exact
        let now = bson::DateTime::from_chrono(now).to_chrono();
        let user = user_with_expiry(Some(now), true);
        assert!(!effective_subscription(&user, now).active);
    }

    #[test]
    fn absent_expiry_falls_back_to_stored_flag() {
        let now = Utc::now();
        assert!(effective_subscription(&user_with_expiry(None, true), now).active);
        assert!(!effective_subscription(&user_with_expiry(None, false), now).active);
    }

    #[test]
    fn renewal_before_expiry_stacks() {
        let now = Utc::now();
        let current = now + Duration::days(10);
        let user = user_with_expiry(Some(current), true);

        let extended = extend_subscription(&user, Plan::Monthly, now).unwrap();
        let expected = bson::DateTime::from_chrono(current)
            .to_chrono()
            .checked_add_months(Months::new(1))
            .unwrap();
        assert_eq!(extended, expected);
    }

    #[test]
    fn renewal_after_lapse_restarts_from_now() {
        let now = Utc::now();
        let user = user_with_expiry(Some(now - Duration::days(5)), true);

        let extended = extend_subscription(&user, Plan::Annual, now).unwrap();
        assert_eq!(extended, now.checked_add_months(Months::new(12)).unwrap());
    }

    #[test]
    fn month_addition_clamps_to_end_of_february() {
        let base = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        let user = user_with_expiry(Some(base), true);

        let extended = extend_subscription(&user, Plan::Monthly, base - Duration::days(1)).unwrap();
        assert_eq!(extended, Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
    }

    #[test]
    fn leap_day_plus_one_year_clamps() {
        let base = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        let user = user_with_expiry(Some(base), true);

        let extended = extend_subscription(&user, Plan::Annual, base - Duration::days(1)).unwrap();
        assert_eq!(extended, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn plan_labels_parse_case_insensitively() {
        assert_eq!(Plan::from_label("Yogi Monthly").unwrap(), Plan::Monthly);
        assert_eq!(Plan::from_label("Yogi Annual").unwrap(), Plan::Annual);
        assert_eq!(Plan::from_label("ANNUAL").unwrap(), Plan::Annual);
        assert!(Plan::from_label("Yogi Lifetime").is_err());
        assert!(Plan::from_label("").is_err());
    }
}
