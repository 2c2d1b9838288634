//! User: the slice of the account record automations read.

use serde::{Deserialize, Serialize};

use crate::id::UserId;
use crate::time::Timestamp;

/// A user account as seen by the automation engine.
///
/// Accounts are owned by the authentication system; this engine only
/// reads them to resolve recipients and segment audiences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    /// Role slug, e.g. `"user"`, `"subscriber"`, `"admin"`.
    pub role: String,
    /// Whether the account holds a paid subscription.
    pub is_subscriber: bool,
    pub last_active_at: Option<Timestamp>,
}

impl User {
    /// The part of `name` before the first space, if any name is set.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.name.as_deref().map(first_name)
    }
}

/// The substring before the first space of `name`.
#[must_use]
pub fn first_name(name: &str) -> &str {
    let name = name.trim();
    name.split_once(' ').map_or(name, |(first, _)| first)
}
