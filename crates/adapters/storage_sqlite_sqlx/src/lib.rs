//! # kadernim-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `kadernim-app::ports::storage`
//! - Implement the durable [`StepJournal`](kadernim_app::ports::StepJournal)
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `kadernim-app` (for port traits) and `kadernim-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;
pub mod error;
pub mod pool;

mod campaign_repo;
mod execution_log_repo;
mod journal;
mod rule_repo;
mod subscription_repo;
mod template_repo;
mod user_repo;

pub use campaign_repo::SqliteCampaignRepository;
pub use error::StorageError;
pub use execution_log_repo::SqliteExecutionLogRepository;
pub use journal::SqliteStepJournal;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
pub use subscription_repo::SqliteSubscriptionRepository;
pub use template_repo::SqliteTemplateRepository;
pub use user_repo::SqliteUserDirectory;
