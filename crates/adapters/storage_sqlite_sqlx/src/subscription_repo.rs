//! `SQLite` implementation of [`SubscriptionRepository`], including the
//! audience segmentation query.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use kadernim_app::ports::SubscriptionRepository;
use kadernim_domain::audience::{AudienceFilter, SubscriptionFilter};
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::{SubscriptionId, UserId};
use kadernim_domain::push::{PushSubscription, PushTarget};
use kadernim_domain::time::{days_before, now};

use crate::codec::ts;
use crate::error::StorageError;

struct Wrapper(PushTarget);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let user_id: String = row.try_get("user_id")?;
        Ok(Self(PushTarget {
            subscription_id: SubscriptionId::from_uuid(row.try_get("id")?),
            endpoint: row.try_get("endpoint")?,
            auth: row.try_get("auth")?,
            p256dh: row.try_get("p256dh")?,
            user_id: UserId::new(user_id),
        }))
    }
}

const SELECT_TARGET: &str =
    "SELECT s.id, s.endpoint, s.auth, s.p256dh, s.user_id FROM push_subscriptions s";

const SELECT_ACTIVE: &str = r"
    SELECT s.id, s.endpoint, s.auth, s.p256dh, s.user_id FROM push_subscriptions s
    WHERE s.active = 1
    ORDER BY s.user_id, s.endpoint
";

const UPSERT: &str = r"
    INSERT INTO push_subscriptions (id, user_id, endpoint, auth, p256dh, active)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (endpoint) DO UPDATE SET
        user_id = excluded.user_id,
        auth = excluded.auth,
        p256dh = excluded.p256dh,
        active = excluded.active
";

/// Append the AND-ed criteria of `filter` to a query over
/// `push_subscriptions s JOIN users u`.
fn push_criteria(query: &mut QueryBuilder<'_, Sqlite>, filter: &AudienceFilter) {
    let at = now();
    if !filter.roles.is_empty() {
        query.push(" AND u.role IN (");
        let mut roles = query.separated(", ");
        for role in &filter.roles {
            roles.push_bind(role.clone());
        }
        roles.push_unseparated(")");
    }
    match filter.has_subscription {
        SubscriptionFilter::All => {}
        SubscriptionFilter::Subscribers => {
            query.push(" AND u.is_subscriber = 1");
        }
        SubscriptionFilter::NonSubscribers => {
            query.push(" AND u.is_subscriber = 0");
        }
    }
    // A window reaching past the earliest timestamp covers all of history.
    if let Some(days) = filter.active_in_days {
        match days_before(at, days) {
            Some(since) => {
                query
                    .push(" AND u.last_active_at >= ")
                    .push_bind(ts(since));
            }
            None => {
                query.push(" AND u.last_active_at IS NOT NULL");
            }
        }
    }
    if let Some(days) = filter.inactive_for_days {
        match days_before(at, days) {
            Some(before) => {
                query
                    .push(" AND (u.last_active_at IS NULL OR u.last_active_at < ")
                    .push_bind(ts(before))
                    .push(")");
            }
            None => {
                query.push(" AND u.last_active_at IS NULL");
            }
        }
    }
}

/// `SQLite`-backed push subscription store.
#[derive(Clone)]
pub struct SqliteSubscriptionRepository {
    pool: SqlitePool,
}

impl SqliteSubscriptionRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a browser subscription, replacing any row for the same endpoint.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the owner does not exist or the write fails.
    pub async fn upsert(&self, subscription: &PushSubscription) -> Result<(), KadernimError> {
        sqlx::query(UPSERT)
            .bind(subscription.id.as_uuid())
            .bind(subscription.user_id.as_str())
            .bind(&subscription.endpoint)
            .bind(&subscription.auth)
            .bind(&subscription.p256dh)
            .bind(subscription.active)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn active_targets(&self) -> Result<Vec<PushTarget>, KadernimError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn segment(&self, filter: &AudienceFilter) -> Result<Vec<PushTarget>, KadernimError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_TARGET);
        query.push(" JOIN users u ON u.id = s.user_id WHERE s.active = 1");
        push_criteria(&mut query, filter);
        query.push(" ORDER BY s.user_id, s.endpoint");

        let rows: Vec<Wrapper> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        tracing::debug!(matched = rows.len(), "audience segment queried");
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
