//! `SQLite` implementation of [`TemplateRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use kadernim_app::ports::TemplateRepository;
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::TemplateId;
use kadernim_domain::template::{NotificationTemplate, TemplateChannel};

use crate::codec::parse;
use crate::error::StorageError;

struct Wrapper(NotificationTemplate);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<NotificationTemplate> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let channel: String = row.try_get("channel")?;
        Ok(Self(NotificationTemplate {
            id: TemplateId::from_uuid(row.try_get("id")?),
            channel: parse::<TemplateChannel>(&channel)?,
            event_type: row.try_get("event_type")?,
            name: row.try_get("name")?,
            subject: row.try_get("subject")?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            url: row.try_get("url")?,
            icon: row.try_get("icon")?,
            badge: row.try_get("badge")?,
            image: row.try_get("image")?,
            tag: row.try_get("tag")?,
            is_active: row.try_get("is_active")?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO notification_templates
        (id, channel, event_type, name, subject, title, body, url, icon, badge, image, tag, is_active)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM notification_templates WHERE id = ?";

const SELECT_ACTIVE: &str = r"
    SELECT * FROM notification_templates
    WHERE channel = ? AND event_type = ? AND is_active = 1
    ORDER BY name, id
    LIMIT 1
";

/// `SQLite`-backed template repository.
#[derive(Clone)]
pub struct SqliteTemplateRepository {
    pool: SqlitePool,
}

impl SqliteTemplateRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a template.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank body, a storage error if the
    /// insert fails.
    pub async fn insert(&self, template: &NotificationTemplate) -> Result<(), KadernimError> {
        template.validate()?;
        sqlx::query(INSERT)
            .bind(template.id.as_uuid())
            .bind(template.channel.as_str())
            .bind(&template.event_type)
            .bind(&template.name)
            .bind(&template.subject)
            .bind(&template.title)
            .bind(&template.body)
            .bind(&template.url)
            .bind(&template.icon)
            .bind(&template.badge)
            .bind(&template.image)
            .bind(&template.tag)
            .bind(template.is_active)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl TemplateRepository for SqliteTemplateRepository {
    async fn get_by_id(
        &self,
        id: TemplateId,
    ) -> Result<Option<NotificationTemplate>, KadernimError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn find_active(
        &self,
        channel: TemplateChannel,
        event_type: &str,
    ) -> Result<Option<NotificationTemplate>, KadernimError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_ACTIVE)
            .bind(channel.as_str())
            .bind(event_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }
}
