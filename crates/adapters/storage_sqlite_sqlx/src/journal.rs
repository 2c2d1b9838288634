//! `SQLite` implementation of the durable [`StepJournal`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use kadernim_app::ports::StepJournal;
use kadernim_domain::durable::{DurableFunction, RunRecord, RunStatus};
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::RunId;
use kadernim_domain::time::now;

use crate::codec::{from_json, parse, parse_opt_ts, parse_ts, to_json, ts};
use crate::error::StorageError;

struct Wrapper(RunRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let function: String = row.try_get("function")?;
        let event: String = row.try_get("event")?;
        let status: String = row.try_get("status")?;
        let attempts: i64 = row.try_get("attempts")?;
        let started_at: String = row.try_get("started_at")?;
        Ok(Self(RunRecord {
            id: RunId::from_uuid(row.try_get("id")?),
            function: parse::<DurableFunction>(&function)?,
            event: from_json(&event)?,
            status: parse::<RunStatus>(&status)?,
            attempts: u32::try_from(attempts).unwrap_or_default(),
            error: row.try_get("error")?,
            started_at: parse_ts(&started_at)?,
            finished_at: parse_opt_ts(row.try_get("finished_at")?)?,
        }))
    }
}

const INSERT_RUN: &str = r"
    INSERT INTO durable_runs (id, function, event, status, attempts, error, started_at, finished_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO NOTHING
";

const SELECT_RUN: &str = "SELECT * FROM durable_runs WHERE id = ?";

const SELECT_UNFINISHED: &str =
    "SELECT * FROM durable_runs WHERE status = 'running' ORDER BY started_at, rowid";

const SELECT_STEP: &str = "SELECT output FROM durable_steps WHERE run_id = ? AND name = ?";

const INSERT_STEP: &str = r"
    INSERT INTO durable_steps (run_id, name, output, completed_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (run_id, name) DO UPDATE SET
        output = excluded.output,
        completed_at = excluded.completed_at
";

const FINISH_RUN: &str = r"
    UPDATE durable_runs SET status = ?, attempts = ?, error = ?, finished_at = ?
    WHERE id = ?
";

/// `SQLite`-backed step journal.
#[derive(Clone)]
pub struct SqliteStepJournal {
    pool: SqlitePool,
}

impl SqliteStepJournal {
    /// Create a new journal backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up one run.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn get(&self, id: RunId) -> Result<Option<RunRecord>, KadernimError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_RUN)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }
}

impl StepJournal for SqliteStepJournal {
    async fn begin_run(&self, run: RunRecord) -> Result<RunRecord, KadernimError> {
        let event = to_json(&run.event).map_err(StorageError::from)?;
        sqlx::query(INSERT_RUN)
            .bind(run.id.as_uuid())
            .bind(run.function.as_str())
            .bind(&event)
            .bind(run.status.as_str())
            .bind(i64::from(run.attempts))
            .bind(&run.error)
            .bind(ts(run.started_at))
            .bind(run.finished_at.map(ts))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        // The stored row wins over `run` when the id already existed.
        Ok(self.get(run.id).await?.unwrap_or(run))
    }

    async fn load_step(
        &self,
        run_id: RunId,
        step: &str,
    ) -> Result<Option<serde_json::Value>, KadernimError> {
        let output: Option<String> = sqlx::query_scalar(SELECT_STEP)
            .bind(run_id.as_uuid())
            .bind(step)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        output
            .map(|raw| {
                serde_json::from_str::<serde_json::Value>(&raw)
                    .map_err(|e| KadernimError::from(StorageError::from(e)))
            })
            .transpose()
    }

    async fn save_step(
        &self,
        run_id: RunId,
        step: &str,
        output: serde_json::Value,
    ) -> Result<(), KadernimError> {
        let output = to_json(&output).map_err(StorageError::from)?;
        sqlx::query(INSERT_STEP)
            .bind(run_id.as_uuid())
            .bind(step)
            .bind(&output)
            .bind(ts(now()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn finish_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        attempts: u32,
        error: Option<String>,
    ) -> Result<(), KadernimError> {
        sqlx::query(FINISH_RUN)
            .bind(status.as_str())
            .bind(i64::from(attempts))
            .bind(&error)
            .bind(ts(now()))
            .bind(run_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn unfinished_runs(&self) -> Result<Vec<RunRecord>, KadernimError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_UNFINISHED)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
