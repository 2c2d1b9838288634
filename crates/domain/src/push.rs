//! Web-push subscriptions, payloads and delivery tallies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{SubscriptionId, UserId};

/// A browser push subscription owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: SubscriptionId,
    pub endpoint: String,
    pub auth: String,
    pub p256dh: String,
    pub user_id: UserId,
    pub active: bool,
}

/// One concrete delivery destination selected for a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTarget {
    pub subscription_id: SubscriptionId,
    pub endpoint: String,
    pub auth: String,
    pub p256dh: String,
    pub user_id: UserId,
}

impl From<PushSubscription> for PushTarget {
    fn from(sub: PushSubscription) -> Self {
        Self {
            subscription_id: sub.id,
            endpoint: sub.endpoint,
            auth: sub.auth,
            p256dh: sub.p256dh,
            user_id: sub.user_id,
        }
    }
}

/// What the browser displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Tally of a broadcast to every active subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    pub success: u64,
    pub failed: u64,
    pub total: u64,
}

impl PushReport {
    /// Diagnostic for partial failures, e.g. `"2 falhas de 10"`.
    #[must_use]
    pub fn failure_summary(&self) -> Option<String> {
        (self.failed > 0).then(|| format!("{} falhas de {}", self.failed, self.total))
    }
}

/// Per-user tally inside a targeted fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDelivery {
    pub success: u64,
    pub failed: u64,
}

/// Tally of a send to an explicit list of subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFanoutReport {
    pub success: u64,
    pub failed: u64,
    pub user_results: BTreeMap<UserId, UserDelivery>,
}

impl PushFanoutReport {
    /// Build a report from individual `(user, delivered)` outcomes.
    #[must_use]
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (UserId, bool)>,
    {
        let mut report = Self::default();
        for (user_id, delivered) in outcomes {
            let entry = report.user_results.entry(user_id).or_default();
            if delivered {
                report.success += 1;
                entry.success += 1;
            } else {
                report.failed += 1;
                entry.failed += 1;
            }
        }
        report
    }

    /// Distinct users with at least one successful delivery.
    #[must_use]
    pub fn unique_users_reached(&self) -> u64 {
        self.user_results
            .values()
            .filter(|d| d.success > 0)
            .count() as u64
    }
}
