//! # kadernim-domain
//!
//! Pure domain model for the kadernim automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Events** (named occurrences that trigger automations)
//! - Define **Automation rules** and their ordered, typed **Actions**
//! - Define **Templates** and the `{{path}}` renderer
//! - Build rendering **contexts** and resolve **recipients** from payloads
//! - Define **Audience filters**, **Push campaigns** and their lifecycle
//! - Define **Execution logs** and durable **runs**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod audience;
pub mod automation;
pub mod campaign;
pub mod context;
pub mod durable;
pub mod event;
pub mod execution_log;
pub mod push;
pub mod recipient;
pub mod render;
pub mod template;
pub mod user;
