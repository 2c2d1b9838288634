//! Audience segmentation criteria for push campaigns.

use serde::{Deserialize, Serialize};

use crate::time::{Timestamp, days_before};
use crate::user::User;

/// Paid-subscription criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriptionFilter {
    #[default]
    All,
    Subscribers,
    NonSubscribers,
}

impl SubscriptionFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Subscribers => "subscribers",
            Self::NonSubscribers => "non-subscribers",
        }
    }
}

/// Declarative selection of push subscribers. All criteria are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudienceFilter {
    /// Role slugs; empty means any role.
    pub roles: Vec<String>,
    pub has_subscription: SubscriptionFilter,
    /// Only users active within the last N days.
    pub active_in_days: Option<u32>,
    /// Only users whose last activity is older than N days (or who never
    /// were active).
    pub inactive_for_days: Option<u32>,
}

impl AudienceFilter {
    /// True when the filter selects every active subscription.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.roles.is_empty()
            && self.has_subscription == SubscriptionFilter::All
            && self.active_in_days.is_none()
            && self.inactive_for_days.is_none()
    }

    /// Evaluate the filter against one user at `now`.
    ///
    /// This is the reference semantics the storage query implements.
    #[must_use]
    pub fn matches(&self, user: &User, now: Timestamp) -> bool {
        if !self.roles.is_empty() && !self.roles.iter().any(|r| *r == user.role) {
            return false;
        }
        let subscription_ok = match self.has_subscription {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Subscribers => user.is_subscriber,
            SubscriptionFilter::NonSubscribers => !user.is_subscriber,
        };
        if !subscription_ok {
            return false;
        }
        // A window reaching past the earliest timestamp covers all of history.
        if let Some(days) = self.active_in_days {
            let active = match days_before(now, days) {
                Some(since) => user.last_active_at.is_some_and(|at| at >= since),
                None => user.last_active_at.is_some(),
            };
            if !active {
                return false;
            }
        }
        if let Some(days) = self.inactive_for_days {
            let inactive = match days_before(now, days) {
                Some(before) => user.last_active_at.is_none_or(|at| at < before),
                None => user.last_active_at.is_none(),
            };
            if !inactive {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::UserId;
    use crate::time::now;

    fn user(role: &str, subscriber: bool, days_idle: Option<u32>) -> User {
        User {
            id: UserId::new("u"),
            email: "u@x.com".to_string(),
            name: None,
            phone: None,
            role: role.to_string(),
            is_subscriber: subscriber,
            last_active_at: days_idle.and_then(|d| days_before(now(), d)),
        }
    }

    #[test]
    fn should_be_unfiltered_by_default() {
        assert!(AudienceFilter::default().is_unfiltered());
    }

    #[test]
    fn should_not_be_unfiltered_with_any_criterion() {
        let f = AudienceFilter {
            active_in_days: Some(7),
            ..AudienceFilter::default()
        };
        assert!(!f.is_unfiltered());
    }

    #[test]
    fn should_deserialize_wire_shape() {
        let f: AudienceFilter = serde_json::from_value(serde_json::json!({
            "roles": ["subscriber"],
            "hasSubscription": "non-subscribers",
            "inactiveForDays": 30
        }))
        .unwrap();
        assert_eq!(f.roles, vec!["subscriber".to_string()]);
        assert_eq!(f.has_subscription, SubscriptionFilter::NonSubscribers);
        assert_eq!(f.inactive_for_days, Some(30));
        assert_eq!(f.active_in_days, None);
    }

    #[test]
    fn should_filter_by_role() {
        let f = AudienceFilter {
            roles: vec!["admin".to_string()],
            ..AudienceFilter::default()
        };
        assert!(f.matches(&user("admin", false, None), now()));
        assert!(!f.matches(&user("user", false, None), now()));
    }

    #[test]
    fn should_filter_by_subscription_state() {
        let subs = AudienceFilter {
            has_subscription: SubscriptionFilter::Subscribers,
            ..AudienceFilter::default()
        };
        let non = AudienceFilter {
            has_subscription: SubscriptionFilter::NonSubscribers,
            ..AudienceFilter::default()
        };
        assert!(subs.matches(&user("user", true, None), now()));
        assert!(!subs.matches(&user("user", false, None), now()));
        assert!(non.matches(&user("user", false, None), now()));
        assert!(!non.matches(&user("user", true, None), now()));
    }

    #[test]
    fn should_filter_by_activity_windows() {
        let active = AudienceFilter {
            active_in_days: Some(7),
            ..AudienceFilter::default()
        };
        let inactive = AudienceFilter {
            inactive_for_days: Some(30),
            ..AudienceFilter::default()
        };
        assert!(active.matches(&user("user", false, Some(2)), now()));
        assert!(!active.matches(&user("user", false, Some(10)), now()));
        assert!(!active.matches(&user("user", false, None), now()));
        assert!(inactive.matches(&user("user", false, Some(45)), now()));
        assert!(inactive.matches(&user("user", false, None), now()));
        assert!(!inactive.matches(&user("user", false, Some(3)), now()));
    }

    #[test]
    fn should_treat_window_beyond_calendar_as_all_history() {
        let active = AudienceFilter {
            active_in_days: Some(u32::MAX),
            ..AudienceFilter::default()
        };
        let inactive = AudienceFilter {
            inactive_for_days: Some(u32::MAX),
            ..AudienceFilter::default()
        };
        assert!(active.matches(&user("user", false, Some(3650)), now()));
        assert!(!active.matches(&user("user", false, None), now()));
        assert!(inactive.matches(&user("user", false, None), now()));
        assert!(!inactive.matches(&user("user", false, Some(3650)), now()));
    }

    #[test]
    fn should_and_combine_criteria() {
        let f = AudienceFilter {
            roles: vec!["user".to_string()],
            has_subscription: SubscriptionFilter::Subscribers,
            active_in_days: Some(7),
            inactive_for_days: None,
        };
        assert!(f.matches(&user("user", true, Some(1)), now()));
        assert!(!f.matches(&user("user", false, Some(1)), now()));
        assert!(!f.matches(&user("admin", true, Some(1)), now()));
    }
}
