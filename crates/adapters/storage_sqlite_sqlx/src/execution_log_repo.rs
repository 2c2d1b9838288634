//! `SQLite` implementation of [`ExecutionLogRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use kadernim_app::ports::ExecutionLogRepository;
use kadernim_domain::error::KadernimError;
use kadernim_domain::execution_log::{ExecutionLog, ExecutionStatus};
use kadernim_domain::id::{ActionId, ExecutionLogId, RuleId};

use crate::codec::{from_json, parse, parse_ts, ts};
use crate::error::StorageError;

struct Wrapper(ExecutionLog);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let payload: String = row.try_get("payload")?;
        let created_at: String = row.try_get("created_at")?;
        Ok(Self(ExecutionLog {
            id: ExecutionLogId::from_uuid(row.try_get("id")?),
            rule_id: RuleId::from_uuid(row.try_get("rule_id")?),
            action_id: ActionId::from_uuid(row.try_get("action_id")?),
            status: parse::<ExecutionStatus>(&status)?,
            payload: from_json(&payload)?,
            error: row.try_get("error")?,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO execution_logs (id, rule_id, action_id, status, payload, error, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const SELECT_RECENT: &str =
    "SELECT * FROM execution_logs ORDER BY created_at DESC, rowid DESC LIMIT ?";

const SELECT_FOR_RULE: &str =
    "SELECT * FROM execution_logs WHERE rule_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?";

/// `SQLite`-backed, append-only execution log.
#[derive(Clone)]
pub struct SqliteExecutionLogRepository {
    pool: SqlitePool,
}

impl SqliteExecutionLogRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ExecutionLogRepository for SqliteExecutionLogRepository {
    async fn append(&self, log: ExecutionLog) -> Result<(), KadernimError> {
        let payload = serde_json::to_string(&log.payload).map_err(StorageError::from)?;
        sqlx::query(INSERT)
            .bind(log.id.as_uuid())
            .bind(log.rule_id.as_uuid())
            .bind(log.action_id.as_uuid())
            .bind(log.status.as_str())
            .bind(&payload)
            .bind(&log.error)
            .bind(ts(log.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ExecutionLog>, KadernimError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn for_rule(
        &self,
        rule_id: RuleId,
        limit: u32,
    ) -> Result<Vec<ExecutionLog>, KadernimError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_FOR_RULE)
            .bind(rule_id.as_uuid())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
