//! # kadernim-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the driven ports adapters implement: repositories
//!   ([`ports::RuleRepository`], [`ports::TemplateRepository`], ...),
//!   delivery channels ([`ports::EmailSender`], [`ports::PushSender`], ...)
//!   and the durable [`ports::StepJournal`].
//! - Execute one action without ever failing ([`executor::ActionExecutor`]).
//! - Run every matching rule for an event ([`dispatcher::RuleDispatcher`]),
//!   deliver push campaigns ([`campaign_scheduler::CampaignScheduler`]) and
//!   one-time passwords ([`otp::OtpService`]).
//! - Make those runs durable: journaled steps, bounded retries and resume
//!   after restart ([`durable`], [`worker::Worker`]).
//!
//! ## Dependency rule
//! Depends on `kadernim-domain` only (plus `tokio` for time and channels).
//! Never imports adapter crates.

pub mod campaign_scheduler;
pub mod context;
pub mod dispatcher;
pub mod durable;
pub mod event_bus;
pub mod execution_log;
pub mod executor;
pub mod otp;
pub mod ports;
pub mod rules;
pub mod segmentation;
pub mod worker;

#[cfg(test)]
pub(crate) mod fakes;
