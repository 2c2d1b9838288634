//! `SQLite` implementation of [`RuleRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use kadernim_app::ports::RuleRepository;
use kadernim_domain::automation::{Action, ActionKind, AutomationRule};
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::{ActionId, RuleId};

use crate::codec::from_json;
use crate::error::StorageError;

/// One rule joined with one of its actions.
struct JoinedRow {
    rule_id: RuleId,
    name: String,
    event_type: String,
    is_active: bool,
    priority: i32,
    action: Option<Action>,
}

impl<'r> FromRow<'r, SqliteRow> for JoinedRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let action_id: Option<uuid::Uuid> = row.try_get("action_id")?;
        let action = match action_id {
            Some(id) => {
                let kind: String = row.try_get("kind")?;
                let config: String = row.try_get("config")?;
                let position: i64 = row.try_get("position")?;
                Some(Action {
                    id: ActionId::from_uuid(id),
                    kind: ActionKind::from(kind),
                    config: from_json(&config)?,
                    position: u32::try_from(position).unwrap_or_default(),
                })
            }
            None => None,
        };
        Ok(Self {
            rule_id: RuleId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            event_type: row.try_get("event_type")?,
            is_active: row.try_get("is_active")?,
            priority: row.try_get("priority")?,
            action,
        })
    }
}

/// Fold joined rows (already ordered by rule, then position) into rules.
fn group(rows: Vec<JoinedRow>) -> Vec<AutomationRule> {
    let mut rules: Vec<AutomationRule> = Vec::new();
    for row in rows {
        let same_rule = rules.last().is_some_and(|r| r.id == row.rule_id);
        if !same_rule {
            rules.push(AutomationRule {
                id: row.rule_id,
                name: row.name,
                event_type: row.event_type,
                is_active: row.is_active,
                priority: row.priority,
                actions: Vec::new(),
            });
        }
        if let (Some(rule), Some(action)) = (rules.last_mut(), row.action) {
            rule.actions.push(action);
        }
    }
    rules
}

const SELECT_ACTIVE_BY_EVENT: &str = r"
    SELECT r.id, r.name, r.event_type, r.is_active, r.priority,
           a.id AS action_id, a.kind, a.config, a.position
    FROM automation_rules r
    LEFT JOIN automation_actions a ON a.rule_id = r.id
    WHERE r.event_type = ? AND r.is_active = 1
    ORDER BY r.priority, r.name, r.id, a.position, a.id
";

const INSERT_RULE: &str = r"
    INSERT INTO automation_rules (id, name, event_type, is_active, priority)
    VALUES (?, ?, ?, ?, ?)
";

const INSERT_ACTION: &str = r"
    INSERT INTO automation_actions (id, rule_id, kind, config, position)
    VALUES (?, ?, ?, ?, ?)
";

/// `SQLite`-backed rule repository.
#[derive(Clone)]
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a rule and its actions atomically.
    ///
    /// Rules are authored elsewhere; this exists for seeding and tests.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any insert fails.
    pub async fn insert(&self, rule: &AutomationRule) -> Result<(), KadernimError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        sqlx::query(INSERT_RULE)
            .bind(rule.id.as_uuid())
            .bind(&rule.name)
            .bind(&rule.event_type)
            .bind(rule.is_active)
            .bind(rule.priority)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        for action in &rule.actions {
            let config = serde_json::to_string(&action.config).map_err(StorageError::from)?;
            sqlx::query(INSERT_ACTION)
                .bind(action.id.as_uuid())
                .bind(rule.id.as_uuid())
                .bind(action.kind.as_str())
                .bind(&config)
                .bind(i64::from(action.position))
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }
        tx.commit().await.map_err(StorageError::from)?;
        Ok(())
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn find_active_by_event(
        &self,
        event_type: &str,
    ) -> Result<Vec<AutomationRule>, KadernimError> {
        let rows: Vec<JoinedRow> = sqlx::query_as(SELECT_ACTIVE_BY_EVENT)
            .bind(event_type)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(group(rows))
    }
}
