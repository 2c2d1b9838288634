//! `SQLite` implementation of [`CampaignRepository`].
//!
//! Status changes are conditional updates, so two runs racing on the same
//! campaign cannot both move it out of `DRAFT`.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use kadernim_app::ports::CampaignRepository;
use kadernim_domain::campaign::{CampaignStatus, PushCampaign};
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::CampaignId;
use kadernim_domain::time::Timestamp;

use crate::codec::{from_json, parse, parse_opt_ts, to_json, ts};
use crate::error::StorageError;

struct Wrapper(PushCampaign);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let audience: String = row.try_get("audience")?;
        let status: String = row.try_get("status")?;
        let total_sent: i64 = row.try_get("total_sent")?;
        Ok(Self(PushCampaign {
            id: CampaignId::from_uuid(row.try_get("id")?),
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            url: row.try_get("url")?,
            icon: row.try_get("icon")?,
            image_url: row.try_get("image_url")?,
            audience: from_json(&audience)?,
            status: parse::<CampaignStatus>(&status)?,
            scheduled_at: parse_opt_ts(row.try_get("scheduled_at")?)?,
            sent_at: parse_opt_ts(row.try_get("sent_at")?)?,
            total_sent: u64::try_from(total_sent).unwrap_or_default(),
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO push_campaigns
        (id, title, body, url, icon, image_url, audience, status, scheduled_at, sent_at, total_sent)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const BEGIN_SENDING: &str =
    "UPDATE push_campaigns SET status = 'SENDING' WHERE id = ? AND status = 'DRAFT'";

const MARK_SENT: &str = r"
    UPDATE push_campaigns SET status = 'SENT', sent_at = ?, total_sent = ?
    WHERE id = ? AND status = 'SENDING'
";

/// `SQLite`-backed campaign store.
#[derive(Clone)]
pub struct SqliteCampaignRepository {
    pool: SqlitePool,
}

impl SqliteCampaignRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a campaign as authored.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub async fn insert(&self, campaign: &PushCampaign) -> Result<(), KadernimError> {
        let audience = to_json(&campaign.audience).map_err(StorageError::from)?;
        sqlx::query(INSERT)
            .bind(campaign.id.as_uuid())
            .bind(&campaign.title)
            .bind(&campaign.body)
            .bind(&campaign.url)
            .bind(&campaign.icon)
            .bind(&campaign.image_url)
            .bind(&audience)
            .bind(campaign.status.as_str())
            .bind(campaign.scheduled_at.map(ts))
            .bind(campaign.sent_at.map(ts))
            .bind(i64::try_from(campaign.total_sent).unwrap_or(i64::MAX))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl CampaignRepository for SqliteCampaignRepository {
    async fn get(&self, id: CampaignId) -> Result<Option<PushCampaign>, KadernimError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM push_campaigns WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn begin_sending(&self, id: CampaignId) -> Result<bool, KadernimError> {
        let result = sqlx::query(BEGIN_SENDING)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_sent(
        &self,
        id: CampaignId,
        total_sent: u64,
        sent_at: Timestamp,
    ) -> Result<bool, KadernimError> {
        let result = sqlx::query(MARK_SENT)
            .bind(ts(sent_at))
            .bind(i64::try_from(total_sent).unwrap_or(i64::MAX))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
