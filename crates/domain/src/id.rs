//! Typed identifier newtypes backed by UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`AutomationRule`](crate::automation::AutomationRule).
    RuleId
);

define_id!(
    /// Unique identifier for an [`Action`](crate::automation::Action).
    ActionId
);

define_id!(
    /// Unique identifier for a [`NotificationTemplate`](crate::template::NotificationTemplate).
    TemplateId
);

define_id!(
    /// Unique identifier for an [`ExecutionLog`](crate::execution_log::ExecutionLog) row.
    ExecutionLogId
);

define_id!(
    /// Unique identifier for a [`PushCampaign`](crate::campaign::PushCampaign).
    CampaignId
);

define_id!(
    /// Unique identifier for a [`PushSubscription`](crate::push::PushSubscription).
    SubscriptionId
);

define_id!(
    /// Unique identifier for a [`DomainEvent`](crate::event::DomainEvent).
    EventId
);

define_id!(
    /// Unique identifier for a durable [`RunRecord`](crate::durable::RunRecord).
    RunId
);

/// Identifier of a user account.
///
/// Users are owned by the external authentication system, so their ids are
/// opaque strings rather than UUIDs generated here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
