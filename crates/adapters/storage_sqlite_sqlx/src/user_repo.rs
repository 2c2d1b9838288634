//! `SQLite` implementation of [`UserDirectory`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use kadernim_app::ports::UserDirectory;
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::UserId;
use kadernim_domain::user::User;

use crate::codec::{parse_opt_ts, ts};
use crate::error::StorageError;

struct Wrapper(User);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        Ok(Self(User {
            id: UserId::new(id),
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            role: row.try_get("role")?,
            is_subscriber: row.try_get("is_subscriber")?,
            last_active_at: parse_opt_ts(row.try_get("last_active_at")?)?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO users (id, email, name, phone, role, is_subscriber, last_active_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        email = excluded.email,
        name = excluded.name,
        phone = excluded.phone,
        role = excluded.role,
        is_subscriber = excluded.is_subscriber,
        last_active_at = excluded.last_active_at
";

/// `SQLite`-backed read model of user accounts.
#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    /// Create a new directory backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh an account mirrored from the authentication system.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn upsert(&self, user: &User) -> Result<(), KadernimError> {
        sqlx::query(UPSERT)
            .bind(user.id.as_str())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.phone)
            .bind(&user.role)
            .bind(user.is_subscriber)
            .bind(user.last_active_at.map(ts))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl UserDirectory for SqliteUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, KadernimError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, KadernimError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }
}
